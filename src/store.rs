//! The ordered message log for the active session.
//!
//! The store is the sole owner of session and message state. Streaming code
//! mutates messages only through handles obtained here, and a handle is only
//! valid while the session that issued it stays active: switching sessions
//! invalidates every outstanding handle, which is what lets an abandoned
//! stream die quietly instead of scribbling on the wrong conversation.

use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::storage::StateStore;
use crate::types::{Attachment, Category, Message, Session};

/// A reference to one message, bound to the session that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    session_id: String,
    message_id: String,
}

impl MessageHandle {
    /// The id of the referenced message.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}

/// Owns the session list and the active conversation.
#[derive(Debug)]
pub struct ConversationStore {
    sessions: Vec<Session>,
    active_id: Option<String>,
    state: Option<StateStore>,
    default_category: Category,
}

impl ConversationStore {
    /// Creates an in-memory store with one fresh session.
    pub fn new(default_category: Category) -> Self {
        let mut store = Self {
            sessions: Vec::new(),
            active_id: None,
            state: None,
            default_category,
        };
        store.ensure_session();
        store
    }

    /// Creates a store backed by persisted state, loading any prior sessions.
    pub fn with_state(state: StateStore, default_category: Category) -> Self {
        let sessions = state.load_sessions();
        let mut store = Self {
            sessions,
            active_id: None,
            state: Some(state),
            default_category,
        };
        store.ensure_session();
        store
    }

    /// Guarantees there is an active session: creates one when the list is
    /// empty, otherwise sorts by recency and selects the most recent.
    pub fn ensure_session(&mut self) {
        if self.sessions.is_empty() {
            self.create_session(None);
            return;
        }
        self.sort_by_recency();
        self.active_id = Some(self.sessions[0].id.clone());
    }

    /// Creates a new session, makes it active, and returns its id.
    pub fn create_session(&mut self, category: Option<Category>) -> String {
        let session = Session::new(category.unwrap_or(self.default_category));
        let id = session.id.clone();
        self.sessions.insert(0, session);
        self.active_id = Some(id.clone());
        self.persist();
        id
    }

    /// Makes an existing session active. Outstanding handles from the
    /// previous session become invalid.
    pub fn switch_session(&mut self, id: &str) -> Result<()> {
        if !self.sessions.iter().any(|s| s.id == id) {
            return Err(Error::validation(
                "no such session",
                Some("session_id".to_string()),
            ));
        }
        self.active_id = Some(id.to_string());
        Ok(())
    }

    /// Deletes a session. When the active session is deleted the most recent
    /// remaining one becomes active; when the list empties a fresh session
    /// is created.
    pub fn delete_session(&mut self, id: &str) {
        let Some(idx) = self.sessions.iter().position(|s| s.id == id) else {
            return;
        };
        let deleting_active = self.active_id.as_deref() == Some(id);
        self.sessions.remove(idx);
        if self.sessions.is_empty() {
            self.create_session(None);
            return;
        }
        if deleting_active {
            self.sort_by_recency();
            self.active_id = Some(self.sessions[0].id.clone());
        }
        self.persist();
    }

    /// Renames a session.
    pub fn rename_session(&mut self, id: &str, title: &str) -> Result<()> {
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::validation("no such session", Some("session_id".to_string())))?;
        session.title = title.to_string();
        session.updated_at = OffsetDateTime::now_utc();
        self.sort_by_recency();
        self.persist();
        Ok(())
    }

    /// All sessions, most recently updated first.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// The active session id.
    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    /// The active session.
    pub fn active_session(&self) -> Option<&Session> {
        let id = self.active_id.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Appends a user message to the active session.
    ///
    /// An empty submission with no attachments is silently ignored; returns
    /// whether a message was appended. The session title is derived from the
    /// first user text.
    pub fn append_user(&mut self, content: &str, attachments: Vec<Attachment>) -> Result<bool> {
        let content = content.trim();
        if content.is_empty() && attachments.is_empty() {
            return Ok(false);
        }
        let session = self.active_session_mut()?;
        if session.is_untitled() {
            let base = if content.is_empty() {
                attachments
                    .first()
                    .and_then(|a| a.name.clone())
                    .unwrap_or_else(|| "New chat".to_string())
            } else {
                content.to_string()
            };
            session.title = Session::derive_title(&base);
        }
        session.messages.push(Message::user(content, attachments));
        self.touch_active();
        Ok(true)
    }

    /// Appends an empty assistant message and returns a handle to it.
    ///
    /// Any previously in-flight assistant message is marked done first, so
    /// at most one message per session is ever streaming.
    pub fn append_assistant_placeholder(&mut self) -> Result<MessageHandle> {
        let session = self.active_session_mut()?;
        for message in session.messages.iter_mut() {
            if message.is_in_flight() {
                message.done = Some(true);
            }
        }
        let message = Message::assistant_placeholder();
        let handle = MessageHandle {
            session_id: session.id.clone(),
            message_id: message.id.clone(),
        };
        session.messages.push(message);
        self.touch_active();
        Ok(handle)
    }

    /// Appends a complete assistant message, for the non-streaming path.
    pub fn append_assistant(&mut self, content: &str) -> Result<()> {
        let session = self.active_session_mut()?;
        session.messages.push(Message::assistant(content));
        self.touch_active();
        Ok(())
    }

    /// Appends streamed text to the message behind a handle.
    pub fn append_text(&mut self, handle: &MessageHandle, delta: &str) -> Result<()> {
        self.message_mut(handle)?.content.push_str(delta);
        self.touch_active();
        Ok(())
    }

    /// Marks the message behind a handle as done. Idempotent.
    pub fn mark_done(&mut self, handle: &MessageHandle) -> Result<()> {
        let message = self.message_mut(handle)?;
        if message.done == Some(true) {
            return Ok(());
        }
        message.done = Some(true);
        self.touch_active();
        Ok(())
    }

    /// Adds a chip to the message behind a handle, skipping a label that is
    /// identical to the immediately preceding chip. Returns whether a chip
    /// was recorded.
    pub fn add_chip(&mut self, handle: &MessageHandle, label: &str) -> Result<bool> {
        let label = label.trim();
        if label.is_empty() {
            return Ok(false);
        }
        let message = self.message_mut(handle)?;
        if message.chips.last().is_some_and(|last| last == label) {
            return Ok(false);
        }
        message.chips.push(label.to_string());
        self.touch_active();
        Ok(true)
    }

    fn active_session_mut(&mut self) -> Result<&mut Session> {
        let id = self
            .active_id
            .clone()
            .ok_or_else(|| Error::validation("no active session", None))?;
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::validation("active session missing", None))
    }

    fn message_mut(&mut self, handle: &MessageHandle) -> Result<&mut Message> {
        if self.active_id.as_deref() != Some(handle.session_id.as_str()) {
            return Err(Error::validation(
                "handle does not belong to the active session",
                Some("session_id".to_string()),
            ));
        }
        let session = self.active_session_mut()?;
        session
            .messages
            .iter_mut()
            .find(|m| m.id == handle.message_id)
            .ok_or_else(|| {
                Error::validation("no such message", Some("message_id".to_string()))
            })
    }

    /// Bumps the active session's update timestamp, re-sorts the list, and
    /// persists it.
    fn touch_active(&mut self) {
        let active = self.active_id.clone();
        if let Some(id) = active
            && let Some(session) = self.sessions.iter_mut().find(|s| s.id == id)
        {
            session.updated_at = OffsetDateTime::now_utc();
        }
        self.sort_by_recency();
        self.persist();
    }

    fn sort_by_recency(&mut self) {
        self.sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }

    /// Best-effort persistence; a write failure is logged, never fatal.
    fn persist(&self) {
        if let Some(state) = &self.state
            && let Err(err) = state.save_sessions(&self.sessions)
        {
            tracing::warn!(error = %err, "failed to persist sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ConversationStore {
        ConversationStore::new(Category::Ide)
    }

    #[test]
    fn empty_submission_silently_ignored() {
        let mut store = store();
        assert!(!store.append_user("   ", Vec::new()).unwrap());
        assert!(store.active_session().unwrap().messages.is_empty());
    }

    #[test]
    fn attachment_only_submission_is_kept() {
        let mut store = store();
        let attachment = Attachment::image("/tmp/a.png", Some("a.png".to_string()));
        assert!(store.append_user("", vec![attachment]).unwrap());
        assert_eq!(store.active_session().unwrap().title, "a.png");
    }

    #[test]
    fn title_derived_from_first_user_text() {
        let mut store = store();
        store.append_user("show me the weather", Vec::new()).unwrap();
        assert_eq!(store.active_session().unwrap().title, "show me the weather");
        store.append_user("second message", Vec::new()).unwrap();
        assert_eq!(store.active_session().unwrap().title, "show me the weather");
    }

    #[test]
    fn streaming_append_and_done() {
        let mut store = store();
        store.append_user("hi", Vec::new()).unwrap();
        let handle = store.append_assistant_placeholder().unwrap();
        store.append_text(&handle, "Hel").unwrap();
        store.append_text(&handle, "lo").unwrap();
        let session = store.active_session().unwrap();
        assert_eq!(session.messages[1].content, "Hello");
        assert!(session.in_flight().is_some());

        store.mark_done(&handle).unwrap();
        store.mark_done(&handle).unwrap();
        assert!(store.active_session().unwrap().in_flight().is_none());
    }

    #[test]
    fn at_most_one_in_flight() {
        let mut store = store();
        let first = store.append_assistant_placeholder().unwrap();
        let _second = store.append_assistant_placeholder().unwrap();
        let session = store.active_session().unwrap();
        let in_flight: Vec<_> = session.messages.iter().filter(|m| m.is_in_flight()).collect();
        assert_eq!(in_flight.len(), 1);
        // The first placeholder was forcibly completed.
        let first_msg = session
            .messages
            .iter()
            .find(|m| m.id == first.message_id())
            .unwrap();
        assert_eq!(first_msg.done, Some(true));
    }

    #[test]
    fn handle_invalidated_by_session_switch() {
        let mut store = store();
        let handle = store.append_assistant_placeholder().unwrap();
        store.create_session(None);
        let err = store.append_text(&handle, "late delta").unwrap_err();
        assert!(err.is_validation());
        let err = store.mark_done(&handle).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn chip_dedup_against_preceding_only() {
        let mut store = store();
        let handle = store.append_assistant_placeholder().unwrap();
        assert!(store.add_chip(&handle, "grep: running").unwrap());
        assert!(!store.add_chip(&handle, "grep: running").unwrap());
        assert!(store.add_chip(&handle, "sed: running").unwrap());
        assert!(store.add_chip(&handle, "grep: running").unwrap());
        let session = store.active_session().unwrap();
        assert_eq!(session.messages[0].chips.len(), 3);
    }

    #[test]
    fn delete_active_falls_back_to_most_recent() {
        let mut store = store();
        let first = store.active_id().unwrap().to_string();
        store.append_user("old", Vec::new()).unwrap();
        let second = store.create_session(Some(Category::CommandLine));
        store.append_user("new", Vec::new()).unwrap();

        store.delete_session(&second);
        assert_eq!(store.active_id(), Some(first.as_str()));

        store.delete_session(&first);
        // List emptied, so a fresh session was created.
        assert_eq!(store.sessions().len(), 1);
        assert!(store.active_session().unwrap().messages.is_empty());
    }

    #[test]
    fn sessions_sorted_most_recent_first() {
        let mut store = store();
        let first = store.active_id().unwrap().to_string();
        store.create_session(None);
        store.switch_session(&first).unwrap();
        store.append_user("bump", Vec::new()).unwrap();
        assert_eq!(store.sessions()[0].id, first);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let state = StateStore::open(dir.path()).unwrap();
            let mut store = ConversationStore::with_state(state, Category::Ide);
            store.append_user("persist me", Vec::new()).unwrap();
        }
        let state = StateStore::open(dir.path()).unwrap();
        let store = ConversationStore::with_state(state, Category::Ide);
        let session = store.active_session().unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].content, "persist me");
    }
}
