use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// A message submitted by the user.
    User,
    /// A message produced by a backend.
    Assistant,
}

/// A reference to a file attached to a message.
///
/// The relay never reads attachment bytes itself; saving the underlying file
/// is a capability of the host. Only the reference is part of conversation
/// history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment kind, currently always "image".
    #[serde(rename = "type")]
    pub kind: String,
    /// Path or URL of the saved file.
    pub src: String,
    /// Original file name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Attachment {
    /// Creates an image attachment reference.
    pub fn image(src: impl Into<String>, name: Option<String>) -> Self {
        Self {
            kind: "image".to_string(),
            src: src.into(),
            name,
        }
    }
}

/// One message in a conversation.
///
/// Content is append-only while an assistant message is streaming; the `done`
/// flag distinguishes a completed answer from one still in flight. `chips`
/// are short persisted labels (e.g. tools that ran during the turn), distinct
/// from ephemeral indicators which are transient UI state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier, used to key ephemeral indicators and feedback.
    pub id: String,
    /// Who authored the message.
    pub role: MessageRole,
    /// Message text. Grows incrementally while streaming.
    pub content: String,
    /// Attached file references, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Creation timestamp.
    #[serde(
        default,
        with = "crate::utils::time::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    /// Whether the message is complete. Only meaningful for assistant
    /// messages; `Some(false)` marks the one currently streaming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    /// Short persisted display labels attached to the message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chips: Vec<String>,
}

impl Message {
    /// Creates a complete user message.
    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: MessageRole::User,
            content: content.into(),
            attachments,
            created_at: Some(OffsetDateTime::now_utc()),
            done: None,
            chips: Vec::new(),
        }
    }

    /// Creates an empty assistant message that will be filled by streaming.
    pub fn assistant_placeholder() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: MessageRole::Assistant,
            content: String::new(),
            attachments: Vec::new(),
            created_at: Some(OffsetDateTime::now_utc()),
            done: Some(false),
            chips: Vec::new(),
        }
    }

    /// Creates a complete assistant message, for the non-streaming path.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            done: Some(true),
            content: content.into(),
            ..Self::assistant_placeholder()
        }
    }

    /// Returns true if this is an assistant message still being streamed.
    pub fn is_in_flight(&self) -> bool {
        self.role == MessageRole::Assistant && self.done == Some(false)
    }
}
