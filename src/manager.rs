//! The streaming session relay.
//!
//! [`StreamRelay`] owns the duplex channel lifecycle and drives one turn at
//! a time: append the user message, resolve a channel (reusing a ready one,
//! or bootstrapping and connecting a fresh one), queue the input until the
//! remote signals readiness or the wait times out, then pump inbound frames
//! through the classifier into the store and indicator table until the turn
//! ends. A turn ends on a completed status or on channel close; either way
//! the input row comes back enabled.
//!
//! Turns cannot overlap: `send_streaming` takes the relay, store, and
//! tracker by `&mut` and runs the whole turn before returning.

use std::collections::HashMap;

use url::Url;

use crate::bootstrap::{HttpBootstrap, SessionBootstrap};
use crate::channel::{AgentChannel, ChannelConnector, ChannelEvent, WsConnector};
use crate::classifier::{FrameEvent, StatusKind, classify};
use crate::config::{DEFAULT_CHANNEL_URL, RelayConfig};
use crate::error::{Error, Result};
use crate::indicators::IndicatorTracker;
use crate::providers::Provider;
use crate::render::{Renderer, build_view};
use crate::store::{ConversationStore, MessageHandle};
use crate::types::{Attachment, OutboundFrame, RemoteSessionHandle};

/// A live channel bound to the local session it serves.
struct OpenChannel {
    inner: Box<dyn AgentChannel>,
    url: Url,
    session_id: String,
    /// Set once `connection_established` arrives. Only a ready channel is
    /// reused for the next turn.
    ready: bool,
}

/// How a turn's frame loop ended.
enum TurnEnd {
    /// A completed status arrived; the channel stays open for reuse.
    Completed,
    /// The channel closed or failed; it must be dropped.
    ChannelLost,
}

/// Owns the streaming channel and drives turns against the store.
pub struct StreamRelay {
    config: RelayConfig,
    connector: Box<dyn ChannelConnector>,
    bootstrap: Box<dyn SessionBootstrap>,
    channel: Option<OpenChannel>,
    /// Bootstrap results cached per local session id.
    remote: HashMap<String, RemoteSessionHandle>,
}

impl StreamRelay {
    /// Creates a relay with the production websocket and HTTP plumbing.
    pub fn new(config: RelayConfig) -> Self {
        Self::with_parts(config, Box::new(WsConnector), Box::new(HttpBootstrap::new()))
    }

    /// Creates a relay with caller-supplied transport seams.
    pub fn with_parts(
        config: RelayConfig,
        connector: Box<dyn ChannelConnector>,
        bootstrap: Box<dyn SessionBootstrap>,
    ) -> Self {
        Self {
            config,
            connector,
            bootstrap,
            channel: None,
            remote: HashMap::new(),
        }
    }

    /// The relay's configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Whether a channel is currently open.
    pub fn channel_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Closes and drops any open channel.
    pub async fn reset_channel(&mut self) {
        if let Some(mut open) = self.channel.take() {
            open.inner.close().await;
            tracing::debug!(url = %open.url, "channel closed");
        }
    }

    /// Switches the active session, closing the channel first so no frame
    /// from the old turn can land in the new conversation.
    pub async fn switch_session(
        &mut self,
        store: &mut ConversationStore,
        indicators: &mut IndicatorTracker,
        id: &str,
    ) -> Result<()> {
        self.reset_channel().await;
        indicators.clear();
        store.switch_session(id)
    }

    /// Starts a fresh conversation, closing the channel first.
    pub async fn new_chat(
        &mut self,
        store: &mut ConversationStore,
        indicators: &mut IndicatorTracker,
    ) -> String {
        self.reset_channel().await;
        indicators.clear();
        store.create_session(Some(self.config.provider.default_category()))
    }

    /// Runs one streaming turn end to end.
    ///
    /// An empty submission with no attachments is silently ignored. Turn
    /// failures are rendered inline through the renderer and never returned
    /// as errors; the returned `Err` is reserved for store-level invariant
    /// violations.
    pub async fn send_streaming(
        &mut self,
        store: &mut ConversationStore,
        indicators: &mut IndicatorTracker,
        input: &str,
        attachments: Vec<Attachment>,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        let content = input.trim().to_string();
        if !store.append_user(&content, attachments)? {
            return Ok(());
        }
        let session_id = store
            .active_id()
            .ok_or_else(|| Error::validation("no active session", None))?
            .to_string();
        render_view(store, indicators, true, renderer);

        // A channel left over from another session, or one that never became
        // ready, is not reusable.
        let reusable = self
            .channel
            .as_ref()
            .is_some_and(|c| c.ready && c.session_id == session_id);
        if !reusable {
            self.reset_channel().await;
        }

        let (mut open, pending) = if let Some(open) = self.channel.take() {
            (open, Some(content))
        } else {
            let url = match self.resolve_channel_url(&session_id, &content, renderer).await {
                Some(url) => url,
                None => {
                    // Bootstrap failed with no fallback; error already rendered.
                    render_view(store, indicators, false, renderer);
                    return Ok(());
                }
            };
            match self.connector.connect(&url).await {
                Ok(inner) => (
                    OpenChannel {
                        inner,
                        url,
                        session_id: session_id.clone(),
                        ready: false,
                    },
                    Some(content),
                ),
                Err(err) => {
                    tracing::warn!(error = %err, "channel connect failed");
                    renderer.render_error(&err.to_string());
                    render_view(store, indicators, false, renderer);
                    return Ok(());
                }
            }
        };

        let handle = store.append_assistant_placeholder()?;
        render_view(store, indicators, true, renderer);

        let pending = if open.ready {
            // Reused channel: the remote is known-ready, send immediately.
            if let Some(content) = pending
                && let Err(err) = open.inner.send(&OutboundFrame::Input { content }).await
            {
                renderer.render_error(&err.to_string());
                store.mark_done(&handle)?;
                open.inner.close().await;
                render_view(store, indicators, false, renderer);
                return Ok(());
            }
            None
        } else {
            pending
        };

        let end = self
            .run_turn(&mut open, store, indicators, renderer, &handle, pending)
            .await?;
        match end {
            TurnEnd::Completed => self.channel = Some(open),
            TurnEnd::ChannelLost => {}
        }
        render_view(store, indicators, false, renderer);
        Ok(())
    }

    /// Runs one non-streaming turn against a provider.
    ///
    /// Provider failures are rendered inline; the turn still settles.
    pub async fn send_oneshot(
        &mut self,
        store: &mut ConversationStore,
        indicators: &IndicatorTracker,
        provider: &dyn Provider,
        input: &str,
        attachments: Vec<Attachment>,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        if !store.append_user(input, attachments)? {
            return Ok(());
        }
        render_view(store, indicators, true, renderer);
        let messages = store
            .active_session()
            .map(|s| s.messages.clone())
            .unwrap_or_default();
        match provider.send(&messages, self.config.model.as_deref()).await {
            Ok(reply) => store.append_assistant(&reply.content)?,
            Err(err) => {
                tracing::warn!(error = %err, "provider turn failed");
                renderer.render_error(&err.to_string());
            }
        }
        render_view(store, indicators, false, renderer);
        Ok(())
    }

    /// Resolves the channel URL for a fresh connect.
    ///
    /// Precedence: a cached bootstrap result for this session, then a fresh
    /// bootstrap call when an endpoint is configured, then the static
    /// channel URL, then the built-in default. A bootstrap failure renders
    /// inline and falls back to the static URL; with no static URL the turn
    /// is abandoned (`None`).
    async fn resolve_channel_url(
        &mut self,
        session_id: &str,
        latest_user_text: &str,
        renderer: &mut dyn Renderer,
    ) -> Option<Url> {
        if let Some(cached) = self
            .remote
            .get(session_id)
            .and_then(|h| h.websocket_url.as_deref())
        {
            match Url::parse(cached) {
                Ok(url) => return Some(url),
                Err(err) => {
                    tracing::warn!(error = %err, url = cached, "ignoring cached channel URL");
                }
            }
        }
        let Some(endpoint) = self.config.session_url.clone() else {
            return self.fallback_url();
        };
        match self.bootstrap.bootstrap(&endpoint, latest_user_text).await {
            Ok(remote) => {
                let ws = remote.websocket_url.clone();
                self.remote.insert(session_id.to_string(), remote);
                match ws.as_deref().map(Url::parse) {
                    Some(Ok(url)) => Some(url),
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "bootstrap returned a bad channel URL");
                        self.fallback_url()
                    }
                    None => self.fallback_url(),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "bootstrap failed");
                renderer.render_error(&err.to_string());
                self.config.channel_url.clone()
            }
        }
    }

    fn fallback_url(&self) -> Option<Url> {
        if let Some(url) = &self.config.channel_url {
            return Some(url.clone());
        }
        match Url::parse(DEFAULT_CHANNEL_URL) {
            Ok(url) => Some(url),
            Err(_) => None,
        }
    }

    /// Pumps inbound frames until the turn ends.
    ///
    /// While `pending` holds unsent input, a ready-wait timer runs alongside
    /// the receive loop: the input goes out on `connection_established` or
    /// when the timer fires, whichever comes first, and exactly once.
    async fn run_turn(
        &mut self,
        open: &mut OpenChannel,
        store: &mut ConversationStore,
        indicators: &mut IndicatorTracker,
        renderer: &mut dyn Renderer,
        handle: &MessageHandle,
        mut pending: Option<String>,
    ) -> Result<TurnEnd> {
        let ready_wait = tokio::time::sleep(self.config.ready_timeout);
        tokio::pin!(ready_wait);
        loop {
            tokio::select! {
                _ = &mut ready_wait, if pending.is_some() => {
                    tracing::debug!(url = %open.url, "ready wait elapsed, sending input anyway");
                    let content = pending.take().unwrap_or_default();
                    if let Err(err) = open.inner.send(&OutboundFrame::Input { content }).await {
                        renderer.render_error(&err.to_string());
                        store.mark_done(handle)?;
                        open.inner.close().await;
                        return Ok(TurnEnd::ChannelLost);
                    }
                }
                event = open.inner.recv() => match event {
                    ChannelEvent::Frame(raw) => match classify(&raw) {
                        FrameEvent::ConnectionEstablished => {
                            open.ready = true;
                            // The single-send guard: a late establishment
                            // after the timeout fired must not resend.
                            if let Some(content) = pending.take()
                                && let Err(err) =
                                    open.inner.send(&OutboundFrame::Input { content }).await
                            {
                                renderer.render_error(&err.to_string());
                                store.mark_done(handle)?;
                                open.inner.close().await;
                                return Ok(TurnEnd::ChannelLost);
                            }
                        }
                        FrameEvent::TextDelta(payload)
                        | FrameEvent::RawPassthrough(payload) => {
                            let mut completed = false;
                            for marker in &payload.markers {
                                completed |= apply_status(marker, store, indicators, handle)?;
                            }
                            if !payload.content.is_empty() {
                                store.append_text(handle, &payload.content)?;
                            }
                            render_view(store, indicators, true, renderer);
                            if completed {
                                store.mark_done(handle)?;
                                return Ok(TurnEnd::Completed);
                            }
                        }
                        FrameEvent::Status(status) => {
                            let completed =
                                apply_status(&status, store, indicators, handle)?;
                            render_view(store, indicators, true, renderer);
                            if completed {
                                store.mark_done(handle)?;
                                return Ok(TurnEnd::Completed);
                            }
                        }
                    },
                    ChannelEvent::Closed(close) => {
                        // Close is the done fallback for backends that never
                        // send a completed status.
                        store.mark_done(handle)?;
                        if !close.is_normal() {
                            let code = close
                                .code
                                .map(|c| c.to_string())
                                .unwrap_or_else(|| "unknown".to_string());
                            renderer.render_error(&format!(
                                "channel to {} closed: code {code}, {}",
                                open.url,
                                close.reason_or_default(),
                            ));
                        }
                        return Ok(TurnEnd::ChannelLost);
                    }
                },
            }
        }
    }
}

/// Applies one classified status to the indicator table and chips.
///
/// Returns true when the status completes the turn.
fn apply_status(
    status: &StatusKind,
    store: &mut ConversationStore,
    indicators: &mut IndicatorTracker,
    handle: &MessageHandle,
) -> Result<bool> {
    match status {
        StatusKind::Completed => Ok(true),
        StatusKind::Thinking => {
            if let Some(label) = status.indicator_label() {
                indicators.add(handle.message_id(), &label);
            }
            Ok(false)
        }
        StatusKind::Running(_) => {
            if let Some(label) = status.indicator_label() {
                indicators.add(handle.message_id(), &label);
                // Running statuses also leave a persistent chip on the
                // message, surviving indicator expiry.
                store.add_chip(handle, &label)?;
            }
            Ok(false)
        }
        StatusKind::Other(text) => {
            tracing::debug!(status = %text, "ignoring unrecognized status");
            Ok(false)
        }
    }
}

/// Rebuilds and pushes the active session's view.
fn render_view(
    store: &ConversationStore,
    indicators: &IndicatorTracker,
    streaming: bool,
    renderer: &mut dyn Renderer,
) {
    if let Some(session) = store.active_session() {
        renderer.render(&build_view(session, streaming, indicators));
    }
}
