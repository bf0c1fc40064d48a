//! Short-lived progress indicators keyed to the in-flight assistant message.
//!
//! Indicators are transient UI state, not conversation history: they live in
//! a side table keyed by message id rather than on the message itself, and
//! they expire after a fixed display window.

use std::collections::HashMap;

use tokio::time::{Duration, Instant};

/// How long an indicator stays visible.
pub const INDICATOR_TTL: Duration = Duration::from_millis(4200);

/// One live progress indicator.
#[derive(Debug, Clone)]
pub struct Indicator {
    /// Fresh identifier assigned at creation.
    pub id: String,
    /// Short display label.
    pub label: String,
    /// When the indicator was created.
    pub created_at: Instant,
}

/// Tracks ephemeral indicators per message.
#[derive(Debug, Default)]
pub struct IndicatorTracker {
    ttl: Duration,
    by_message: HashMap<String, Vec<Indicator>>,
}

impl IndicatorTracker {
    /// Creates a tracker with the standard display window.
    pub fn new() -> Self {
        Self::with_ttl(INDICATOR_TTL)
    }

    /// Creates a tracker with a custom display window.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            by_message: HashMap::new(),
        }
    }

    /// Adds an indicator for a message.
    ///
    /// Blank labels are ignored, and a label identical to the most recently
    /// added one for the same message is dropped as a duplicate. Returns
    /// whether the indicator was recorded.
    pub fn add(&mut self, message_id: &str, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() {
            return false;
        }
        let entries = self.by_message.entry(message_id.to_string()).or_default();
        if entries.last().is_some_and(|last| last.label == label) {
            return false;
        }
        entries.push(Indicator {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.to_string(),
            created_at: Instant::now(),
        });
        true
    }

    /// Returns the ordered live indicators for a message.
    pub fn active(&self, message_id: &str) -> Vec<&Indicator> {
        let Some(entries) = self.by_message.get(message_id) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|i| i.created_at.elapsed() < self.ttl)
            .collect()
    }

    /// Drops expired indicators and empty message entries.
    pub fn prune(&mut self) {
        let ttl = self.ttl;
        self.by_message
            .retain(|_, entries| {
                entries.retain(|i| i.created_at.elapsed() < ttl);
                !entries.is_empty()
            });
    }

    /// Drops all indicators, e.g. on session switch.
    pub fn clear(&mut self) {
        self.by_message.clear();
    }
}
