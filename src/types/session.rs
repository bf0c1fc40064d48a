use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::message::Message;

/// Maximum length of a derived session title before truncation.
const TITLE_LIMIT: usize = 40;

/// Sidebar grouping for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Category {
    /// Local command shell sessions.
    #[default]
    #[serde(rename = "Command Line")]
    CommandLine,
    /// Data-warehouse CLI sessions.
    #[serde(rename = "Snowflake CLI")]
    WarehouseCli,
    /// Cloud LLM sessions.
    #[serde(rename = "Cortex")]
    Cortex,
    /// Streaming agent sessions.
    #[serde(rename = "IDE")]
    Ide,
}

impl Category {
    /// Short key used for the folder collapse-state map.
    pub fn key(&self) -> &'static str {
        match self {
            Category::CommandLine => "cli",
            Category::WarehouseCli => "snow",
            Category::Cortex => "cortex",
            Category::Ide => "ide",
        }
    }
}

/// One chat session: a titled, categorized, ordered message log.
///
/// Sessions are owned exclusively by the conversation store and mutated only
/// through its operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Stable identifier.
    pub id: String,
    /// Display title, derived from the first user message.
    pub title: String,
    /// Creation timestamp.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
    /// Last-mutation timestamp; sessions sort most-recent first.
    #[serde(with = "crate::utils::time")]
    pub updated_at: OffsetDateTime,
    /// Sidebar grouping.
    #[serde(default)]
    pub category: Category,
    /// Ordered message log.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Session {
    /// Creates an empty session with a fresh identifier.
    pub fn new(category: Category) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: "New chat".to_string(),
            created_at: now,
            updated_at: now,
            category,
            messages: Vec::new(),
        }
    }

    /// Returns the assistant message currently being streamed, if any.
    pub fn in_flight(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_in_flight())
    }

    /// Returns true if the session still carries the placeholder title.
    pub fn is_untitled(&self) -> bool {
        self.title.is_empty() || self.title == "New chat"
    }

    /// Derives a display title from message text, truncating long input.
    pub fn derive_title(text: &str) -> String {
        let mut title: String = text.chars().take(TITLE_LIMIT).collect();
        if text.chars().count() > TITLE_LIMIT {
            title.push('…');
        }
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_original_strings() {
        let json = serde_json::to_string(&Category::WarehouseCli).unwrap();
        assert_eq!(json, "\"Snowflake CLI\"");
        let back: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Category::WarehouseCli);
    }

    #[test]
    fn derive_title_truncates() {
        let long = "x".repeat(50);
        let title = Session::derive_title(&long);
        assert_eq!(title.chars().count(), 41);
        assert!(title.ends_with('…'));
        assert_eq!(Session::derive_title("short"), "short");
    }

    #[test]
    fn new_session_is_untitled_with_no_in_flight() {
        let session = Session::new(Category::CommandLine);
        assert!(session.is_untitled());
        assert!(session.in_flight().is_none());
    }
}
