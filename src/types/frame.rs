use serde::{Deserialize, Serialize};

/// The outer envelope of one inbound channel frame.
///
/// The wire contract recognizes three shapes. Anything else, including
/// payloads that are not JSON at all, degrades to raw-text handling at the
/// classifier boundary; decoding here is allowed to fail but never to panic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEnvelope {
    /// The remote endpoint is ready to receive the queued input frame.
    #[serde(rename = "connection_established")]
    ConnectionEstablished,

    /// Agent output. The content may itself be a JSON-encoded
    /// [`InnerEnvelope`] describing an event, or plain text.
    #[serde(rename = "output")]
    Output {
        /// Payload, possibly a nested JSON envelope.
        content: String,
    },

    /// Plain text content.
    #[serde(rename = "text")]
    Text {
        /// Text to append to the in-flight message.
        content: String,
    },
}

/// The nested envelope sometimes carried inside an `output` frame's content.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum InnerEnvelope {
    /// An agent event wrapping typed data.
    #[serde(rename = "event")]
    Event {
        /// The event payload.
        data: EventData,
    },
}

/// Typed data inside an inner event envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum EventData {
    /// Incremental answer text.
    #[serde(rename = "text")]
    Text {
        /// Text to append to the in-flight message.
        content: String,
    },

    /// A progress status. Some backends put the status string in `status`,
    /// others in `content`; both are accepted.
    #[serde(rename = "status")]
    Status {
        /// The status string, when present.
        #[serde(default)]
        status: Option<String>,
        /// Alternate carrier for the status string.
        #[serde(default)]
        content: Option<String>,
    },
}

impl EventData {
    /// Returns the status string of a status event, preferring `status` over
    /// `content`.
    pub fn status_text(&self) -> Option<&str> {
        match self {
            EventData::Status { status, content } => {
                status.as_deref().or(content.as_deref())
            }
            EventData::Text { .. } => None,
        }
    }
}

/// One outbound channel frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundFrame {
    /// The user's input for this turn, sent exactly once per turn.
    #[serde(rename = "input")]
    Input {
        /// The latest user text.
        content: String,
    },
}

/// Body of the optional session-bootstrap request.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapRequest {
    /// Carried conversation context; only the latest user turn is sent.
    pub messages: Vec<BootstrapMessage>,
}

impl BootstrapRequest {
    /// Builds a bootstrap request carrying the latest user text.
    pub fn latest_user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![BootstrapMessage {
                role: "user".to_string(),
                content: content.into(),
            }],
        }
    }
}

/// One message in a bootstrap request body.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapMessage {
    /// Message role, always "user" for bootstrap.
    pub role: String,
    /// Message text.
    pub content: String,
}

/// Success response of the bootstrap request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapResponse {
    /// Server-assigned remote session identifier, if any.
    #[serde(default)]
    pub session_id: Option<String>,
    /// The channel URL to connect to, if the server provided one.
    #[serde(default)]
    pub websocket_url: Option<String>,
}

/// Cached result of a bootstrap call, reused across turns of the same chat
/// session so the remote session and socket are not re-provisioned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSessionHandle {
    /// Server-assigned session identifier.
    pub session_id: Option<String>,
    /// The channel URL the server directed us to.
    pub websocket_url: Option<String>,
}

impl From<BootstrapResponse> for RemoteSessionHandle {
    fn from(response: BootstrapResponse) -> Self {
        Self {
            session_id: response.session_id,
            websocket_url: response.websocket_url,
        }
    }
}
