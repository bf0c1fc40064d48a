//! Classification of raw inbound channel frames into typed events.
//!
//! One frame in, one [`FrameEvent`] out. The classifier tolerates arbitrary
//! and malformed payloads: anything that does not decode as a recognized
//! envelope degrades to raw-text passthrough rather than an error. Text
//! payloads are additionally re-scanned for progress phrases that some
//! backends inline into the answer stream instead of sending structured
//! status frames.

use crate::types::{EventData, InboundEnvelope, InnerEnvelope};

/// Literal phrase some backends emit while the agent is thinking.
const THINKING_PHRASE: &str = "Agent is thinking...";

/// Literal phrase some backends emit when the answer is complete.
const COMPLETED_PHRASE: &str = "Agent response completed";

/// Internal marker token prefixing an inlined status string.
const STATUS_MARKER: &str = "[agent-status]";

/// A classified progress status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusKind {
    /// The agent is thinking; shown as an ephemeral indicator.
    Thinking,
    /// The answer is complete; marks the in-flight message done.
    Completed,
    /// A named tool is running; shown as an ephemeral indicator.
    Running(String),
    /// An unrecognized status. Consumed but never rendered as answer text.
    Other(String),
}

impl StatusKind {
    /// Classifies a raw status string.
    ///
    /// Matching is case-insensitive and substring-based: "thinking" wins
    /// first, then "completed"/"done", then the `<name>: running` pattern.
    pub fn classify(status: &str) -> StatusKind {
        let lower = status.to_lowercase();
        if lower.contains("thinking") {
            StatusKind::Thinking
        } else if lower.contains("completed") || lower.contains("done") {
            StatusKind::Completed
        } else if let Some((name, _)) = parse_running(status) {
            StatusKind::Running(name)
        } else {
            StatusKind::Other(status.to_string())
        }
    }

    /// Returns the indicator label for this status, or `None` for statuses
    /// that do not produce an indicator.
    pub fn indicator_label(&self) -> Option<String> {
        match self {
            StatusKind::Thinking => Some("thinking".to_string()),
            StatusKind::Running(name) => Some(format!("{name}: running")),
            StatusKind::Completed | StatusKind::Other(_) => None,
        }
    }
}

/// Text extracted from a frame, with any inlined progress phrases stripped
/// out and surfaced as markers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextPayload {
    /// The text to append to the in-flight message.
    pub content: String,
    /// Progress statuses that were embedded in the text.
    pub markers: Vec<StatusKind>,
}

impl TextPayload {
    fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            markers: Vec::new(),
        }
    }
}

/// One classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// Structured answer text to append to the in-flight message.
    TextDelta(TextPayload),
    /// A progress status; drives indicators, never appends content.
    Status(StatusKind),
    /// The channel is ready to receive the queued input frame.
    ConnectionEstablished,
    /// The payload was not a recognized envelope; treated verbatim as text.
    RawPassthrough(TextPayload),
}

/// Classifies one raw inbound frame. Never fails.
pub fn classify(raw: &str) -> FrameEvent {
    match serde_json::from_str::<InboundEnvelope>(raw) {
        Ok(InboundEnvelope::ConnectionEstablished) => FrameEvent::ConnectionEstablished,
        Ok(InboundEnvelope::Text { content }) => FrameEvent::TextDelta(scan_inline(&content)),
        Ok(InboundEnvelope::Output { content }) => classify_output(&content),
        Err(_) => FrameEvent::RawPassthrough(scan_inline(raw)),
    }
}

/// Classifies the content of an `output` frame, which may itself be a
/// JSON-encoded inner event envelope.
fn classify_output(content: &str) -> FrameEvent {
    match serde_json::from_str::<InnerEnvelope>(content) {
        Ok(InnerEnvelope::Event { data }) => match data {
            EventData::Text { content } => FrameEvent::TextDelta(scan_inline(&content)),
            status @ EventData::Status { .. } => {
                let text = status.status_text().unwrap_or_default();
                FrameEvent::Status(StatusKind::classify(text))
            }
        },
        // Not a nested envelope; the content is the text itself.
        Err(_) => FrameEvent::TextDelta(scan_inline(content)),
    }
}

/// Re-scans a text payload for inlined progress phrases.
///
/// Matched phrases are removed from the text and returned as markers; the
/// remainder is what gets appended as answer content.
pub fn scan_inline(text: &str) -> TextPayload {
    if text.is_empty() {
        return TextPayload::plain("");
    }

    // A whole-chunk status marker carries no answer text.
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix(STATUS_MARKER) {
        return TextPayload {
            content: String::new(),
            markers: vec![StatusKind::classify(rest.trim())],
        };
    }

    let mut content = text.to_string();
    let mut markers = Vec::new();
    while let Some(pos) = content.find(THINKING_PHRASE) {
        content.replace_range(pos..pos + THINKING_PHRASE.len(), "");
        markers.push(StatusKind::Thinking);
    }
    while let Some(pos) = content.find(COMPLETED_PHRASE) {
        content.replace_range(pos..pos + COMPLETED_PHRASE.len(), "");
        markers.push(StatusKind::Completed);
    }
    if let Some((name, remainder)) = parse_running(content.trim_start()) {
        markers.push(StatusKind::Running(name));
        content = remainder;
    }

    TextPayload { content, markers }
}

/// Parses the `<name>: running <remainder>` pattern.
///
/// The name must be a single non-empty token before the colon. Returns the
/// tool name and whatever text followed the "running" keyword.
fn parse_running(text: &str) -> Option<(String, String)> {
    let (name, rest) = text.split_once(':')?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let remainder = rest.strip_prefix("running")?;
    if !remainder.is_empty() && !remainder.starts_with(char::is_whitespace) {
        // "runningfoo" is not the running keyword.
        return None;
    }
    Some((name.to_string(), remainder.trim_start().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_output_text_yields_delta() {
        let raw = r#"{"type":"output","content":"{\"type\":\"event\",\"data\":{\"type\":\"text\",\"content\":\"Hello\"}}"}"#;
        assert_eq!(
            classify(raw),
            FrameEvent::TextDelta(TextPayload::plain("Hello"))
        );
    }

    #[test]
    fn nested_output_status_yields_status() {
        let raw = r#"{"type":"output","content":"{\"type\":\"event\",\"data\":{\"type\":\"status\",\"status\":\"Agent is thinking\"}}"}"#;
        assert_eq!(classify(raw), FrameEvent::Status(StatusKind::Thinking));
    }

    #[test]
    fn status_in_content_field_is_accepted() {
        let raw = r#"{"type":"output","content":"{\"type\":\"event\",\"data\":{\"type\":\"status\",\"content\":\"response completed\"}}"}"#;
        assert_eq!(classify(raw), FrameEvent::Status(StatusKind::Completed));
    }

    #[test]
    fn output_with_plain_content_is_text() {
        let raw = r#"{"type":"output","content":"just words"}"#;
        assert_eq!(
            classify(raw),
            FrameEvent::TextDelta(TextPayload::plain("just words"))
        );
    }

    #[test]
    fn top_level_text_frame() {
        let raw = r#"{"type":"text","content":"hi"}"#;
        assert_eq!(classify(raw), FrameEvent::TextDelta(TextPayload::plain("hi")));
    }

    #[test]
    fn connection_established_frame() {
        assert_eq!(
            classify(r#"{"type":"connection_established"}"#),
            FrameEvent::ConnectionEstablished
        );
    }

    #[test]
    fn non_json_payload_is_passthrough() {
        assert_eq!(
            classify("plain chunk"),
            FrameEvent::RawPassthrough(TextPayload::plain("plain chunk"))
        );
    }

    #[test]
    fn unrecognized_envelope_is_passthrough() {
        let raw = r#"{"type":"mystery","content":"x"}"#;
        let FrameEvent::RawPassthrough(payload) = classify(raw) else {
            panic!("expected passthrough");
        };
        assert_eq!(payload.content, raw);
    }

    #[test]
    fn inline_thinking_phrase_strips_to_empty() {
        let payload = scan_inline("Agent is thinking...");
        assert_eq!(payload.content, "");
        assert_eq!(payload.markers, vec![StatusKind::Thinking]);
    }

    #[test]
    fn inline_running_keeps_remainder() {
        let payload = scan_inline("tool_x: running more text");
        assert_eq!(payload.content, "more text");
        assert_eq!(payload.markers, vec![StatusKind::Running("tool_x".to_string())]);
    }

    #[test]
    fn inline_completed_phrase() {
        let payload = scan_inline("Agent response completed");
        assert_eq!(payload.content, "");
        assert_eq!(payload.markers, vec![StatusKind::Completed]);
    }

    #[test]
    fn embedded_phrase_mid_text_is_removed() {
        let payload = scan_inline("fooAgent is thinking...bar");
        assert_eq!(payload.content, "foobar");
        assert_eq!(payload.markers, vec![StatusKind::Thinking]);
    }

    #[test]
    fn status_marker_token_consumes_whole_chunk() {
        let payload = scan_inline("[agent-status] web_search: running");
        assert_eq!(payload.content, "");
        assert_eq!(
            payload.markers,
            vec![StatusKind::Running("web_search".to_string())]
        );
    }

    #[test]
    fn status_classification_is_case_insensitive() {
        assert_eq!(StatusKind::classify("THINKING hard"), StatusKind::Thinking);
        assert_eq!(StatusKind::classify("All Done"), StatusKind::Completed);
        assert_eq!(
            StatusKind::classify("grep: running"),
            StatusKind::Running("grep".to_string())
        );
        assert_eq!(
            StatusKind::classify("warming up"),
            StatusKind::Other("warming up".to_string())
        );
    }

    #[test]
    fn running_pattern_rejects_spaced_names() {
        assert!(parse_running("not a tool: running").is_none());
        assert!(parse_running(": running").is_none());
        assert!(parse_running("tool: runningwild").is_none());
    }

    #[test]
    fn indicator_labels() {
        assert_eq!(
            StatusKind::Thinking.indicator_label().as_deref(),
            Some("thinking")
        );
        assert_eq!(
            StatusKind::Running("grep".to_string())
                .indicator_label()
                .as_deref(),
            Some("grep: running")
        );
        assert!(StatusKind::Completed.indicator_label().is_none());
        assert!(StatusKind::Other("x".to_string()).indicator_label().is_none());
    }
}
