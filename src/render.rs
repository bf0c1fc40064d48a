//! The render/dispatch boundary.
//!
//! Building a [`TranscriptView`] is a pure function of conversation state,
//! the streaming flag, and the indicator side-table; the protocol's
//! correctness is observable only through it. A [`Renderer`] receives view
//! updates and inline errors; the relay calls it after every observable
//! mutation.

use std::io::{self, Stdout, Write};

use time::OffsetDateTime;

use crate::indicators::IndicatorTracker;
use crate::types::{Attachment, MessageRole, Session};
use crate::utils::time::relative_label;

/// What the per-message action row offers once a message settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRow {
    /// Copy the message text.
    pub copy: bool,
    /// Edit the originating user turn and resend it.
    pub edit_resend: bool,
    /// Regenerate from the previous user turn.
    pub regenerate: bool,
    /// Relative completion-time label.
    pub done_label: Option<String>,
}

/// One rendered message bubble.
#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    /// Who authored the message.
    pub role: MessageRole,
    /// The message text as accumulated so far.
    pub content: String,
    /// Attached file references.
    pub attachments: Vec<Attachment>,
    /// Whether to show a typing indicator (empty in-flight answer).
    pub typing: bool,
    /// Live ephemeral indicator labels for this message.
    pub indicators: Vec<String>,
    /// Persisted chips for this message.
    pub chips: Vec<String>,
    /// Action row, present only once the message is done or streaming
    /// has stopped.
    pub actions: Option<ActionRow>,
}

/// The full visual representation of the active conversation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranscriptView {
    /// Ordered message bubbles.
    pub bubbles: Vec<Bubble>,
    /// Whether the input row accepts a new submission.
    pub input_enabled: bool,
}

/// Builds the view for a session.
pub fn build_view(
    session: &Session,
    streaming: bool,
    indicators: &IndicatorTracker,
) -> TranscriptView {
    let now = OffsetDateTime::now_utc();
    let mut bubbles = Vec::with_capacity(session.messages.len());
    let mut last_user_seen = false;
    for message in &session.messages {
        let in_flight = message.is_in_flight();
        let typing = streaming && in_flight && message.content.is_empty();
        let settled = message.done == Some(true) || !streaming;
        let actions = if message.role == MessageRole::Assistant && settled {
            Some(ActionRow {
                copy: !message.content.is_empty(),
                edit_resend: last_user_seen,
                regenerate: last_user_seen,
                done_label: message.created_at.map(|ts| relative_label(ts, now)),
            })
        } else {
            None
        };
        if message.role == MessageRole::User {
            last_user_seen = true;
        }
        bubbles.push(Bubble {
            role: message.role,
            content: message.content.clone(),
            attachments: message.attachments.clone(),
            typing,
            indicators: indicators
                .active(&message.id)
                .into_iter()
                .map(|i| i.label.clone())
                .collect(),
            chips: message.chips.clone(),
            actions,
        });
    }
    TranscriptView {
        bubbles,
        input_enabled: !streaming,
    }
}

/// Receives view updates and inline errors from the relay.
pub trait Renderer {
    /// Called after every observable mutation with the rebuilt view.
    fn render(&mut self, view: &TranscriptView);

    /// Called with a single inline error message for a failed turn.
    fn render_error(&mut self, message: &str);
}

/// A renderer that writes a plain-text transcript to a writer.
pub struct PlainTextRenderer<W: Write> {
    writer: W,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a renderer writing to stdout.
    pub fn stdout() -> Self {
        Self {
            writer: io::stdout(),
        }
    }
}

impl<W: Write> PlainTextRenderer<W> {
    /// Creates a renderer writing to the given writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> Renderer for PlainTextRenderer<W> {
    fn render(&mut self, view: &TranscriptView) {
        for bubble in &view.bubbles {
            let who = match bubble.role {
                MessageRole::User => "you",
                MessageRole::Assistant => "agent",
            };
            if bubble.typing {
                let _ = writeln!(self.writer, "{who}: …");
                continue;
            }
            let _ = writeln!(self.writer, "{who}: {}", bubble.content);
            for label in &bubble.indicators {
                let _ = writeln!(self.writer, "  [{label}]");
            }
        }
        let _ = self.writer.flush();
    }

    fn render_error(&mut self, message: &str) {
        let _ = writeln!(self.writer, "error: {message}");
        let _ = self.writer.flush();
    }
}
