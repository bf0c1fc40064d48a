//! Local persisted state.
//!
//! All durable state lives as JSON files under a single directory: the
//! session list, the sidebar folder collapse map, the theme preference, and
//! per-message feedback markers. Reads degrade to defaults when a file is
//! missing or corrupt; the relay favors availability over strictness for
//! local state.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};

use crate::error::{Error, Result};
use crate::types::Session;

const SESSIONS_FILE: &str = "sessions.json";
const FOLDERS_FILE: &str = "folders.json";
const THEME_FILE: &str = "theme.json";
const FEEDBACK_FILE: &str = "feedback.json";

/// A thumbs-up/down marker recorded for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    /// Thumbs up.
    Up,
    /// Thumbs down.
    Down,
}

/// File-backed store for all locally persisted state.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    /// Opens (creating if needed) a state store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|err| Error::io("failed to create state directory", err))?;
        Ok(Self { root })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let file = File::create(self.path(name))
            .map_err(|err| Error::io(format!("failed to create {name}"), err))?;
        let writer = BufWriter::new(file);
        to_writer_pretty(writer, value).map_err(|err| {
            Error::serialization(format!("failed to serialize {name}"), Some(Box::new(err)))
        })
    }

    fn read_json<T>(&self, name: &str) -> Option<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let path = self.path(name);
        if !Path::new(&path).exists() {
            return None;
        }
        let file = File::open(&path).ok()?;
        let reader = BufReader::new(file);
        match from_reader(reader) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(file = name, error = %err, "ignoring corrupt state file");
                None
            }
        }
    }

    /// Loads the session list; empty when absent or unreadable.
    pub fn load_sessions(&self) -> Vec<Session> {
        self.read_json(SESSIONS_FILE).unwrap_or_default()
    }

    /// Persists the session list.
    pub fn save_sessions(&self, sessions: &[Session]) -> Result<()> {
        self.write_json(SESSIONS_FILE, &sessions)
    }

    /// Loads the folder collapse map (category key -> collapsed).
    pub fn load_folders(&self) -> HashMap<String, bool> {
        self.read_json(FOLDERS_FILE).unwrap_or_default()
    }

    /// Persists the folder collapse map.
    pub fn save_folders(&self, folders: &HashMap<String, bool>) -> Result<()> {
        self.write_json(FOLDERS_FILE, folders)
    }

    /// Loads the theme preference, if one was saved.
    pub fn load_theme(&self) -> Option<String> {
        self.read_json(THEME_FILE)
    }

    /// Persists the theme preference.
    pub fn save_theme(&self, theme: &str) -> Result<()> {
        self.write_json(THEME_FILE, &theme)
    }

    /// Loads all recorded feedback markers (message id -> feedback).
    pub fn load_feedback(&self) -> HashMap<String, Feedback> {
        self.read_json(FEEDBACK_FILE).unwrap_or_default()
    }

    /// Records feedback for one message, overwriting any prior marker.
    pub fn record_feedback(&self, message_id: &str, feedback: Feedback) -> Result<()> {
        let mut all = self.load_feedback();
        all.insert(message_id.to_string(), feedback);
        self.write_json(FEEDBACK_FILE, &all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Message, Session};

    #[test]
    fn sessions_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();

        let mut session = Session::new(Category::Ide);
        session.messages.push(Message::user("hello", Vec::new()));
        session.messages.push(Message::assistant("world"));
        store.save_sessions(std::slice::from_ref(&session)).unwrap();

        let loaded = store.load_sessions();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], session);
    }

    #[test]
    fn missing_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        assert!(store.load_sessions().is_empty());
        assert!(store.load_folders().is_empty());
        assert!(store.load_theme().is_none());
        assert!(store.load_feedback().is_empty());
    }

    #[test]
    fn corrupt_file_degrades_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join(SESSIONS_FILE), "not json").unwrap();
        assert!(store.load_sessions().is_empty());
    }

    #[test]
    fn folders_theme_and_feedback_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();

        let mut folders = HashMap::new();
        folders.insert("cli".to_string(), true);
        folders.insert("ide".to_string(), false);
        store.save_folders(&folders).unwrap();
        assert_eq!(store.load_folders(), folders);

        store.save_theme("dark").unwrap();
        assert_eq!(store.load_theme().as_deref(), Some("dark"));

        store.record_feedback("m1", Feedback::Up).unwrap();
        store.record_feedback("m2", Feedback::Down).unwrap();
        store.record_feedback("m1", Feedback::Down).unwrap();
        let feedback = store.load_feedback();
        assert_eq!(feedback.get("m1"), Some(&Feedback::Down));
        assert_eq!(feedback.get("m2"), Some(&Feedback::Down));
    }
}
