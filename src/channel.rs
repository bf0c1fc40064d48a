//! The duplex streaming channel.
//!
//! [`AgentChannel`] and [`ChannelConnector`] are the seams between the relay
//! and the wire: production code speaks websockets through
//! [`WsChannel`]/[`WsConnector`], tests script frames through their own
//! implementations. A channel, once closed, is never reused.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::error::{Error, Result};
use crate::types::OutboundFrame;

/// Websocket close code for an abnormal closure.
const CLOSE_ABNORMAL: u16 = 1006;

/// Details of a channel close.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelClose {
    /// Close code, when the remote supplied one.
    pub code: Option<u16>,
    /// Close reason, when the remote supplied one.
    pub reason: Option<String>,
}

impl ChannelClose {
    /// Returns true for a normal close (no code, or code 1000).
    pub fn is_normal(&self) -> bool {
        self.code.is_none_or(|code| code == 1000)
    }

    /// The reason string, or a generic fallback.
    pub fn reason_or_default(&self) -> &str {
        self.reason.as_deref().unwrap_or("connection closed")
    }
}

/// One event received from a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A raw inbound frame payload.
    Frame(String),
    /// The channel closed. Terminal; no further frames will arrive.
    Closed(ChannelClose),
}

/// A live duplex channel to a streaming agent.
#[async_trait]
pub trait AgentChannel: Send {
    /// Sends one outbound frame.
    async fn send(&mut self, frame: &OutboundFrame) -> Result<()>;

    /// Receives the next event, in strict arrival order.
    async fn recv(&mut self) -> ChannelEvent;

    /// Closes the channel. Best-effort; failures are ignored.
    async fn close(&mut self);
}

/// Opens channels to a target endpoint.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Opens a channel to `url`.
    async fn connect(&self, url: &Url) -> Result<Box<dyn AgentChannel>>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A websocket-backed channel.
pub struct WsChannel {
    stream: WsStream,
}

#[async_trait]
impl AgentChannel for WsChannel {
    async fn send(&mut self, frame: &OutboundFrame) -> Result<()> {
        let payload = serde_json::to_string(frame)?;
        self.stream
            .send(WsMessage::Text(payload))
            .await
            .map_err(|e| {
                Error::transport("failed to send frame", None, Some(Box::new(e)))
            })
    }

    async fn recv(&mut self) -> ChannelEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => return ChannelEvent::Frame(text),
                Some(Ok(WsMessage::Binary(bytes))) => {
                    return ChannelEvent::Frame(String::from_utf8_lossy(&bytes).into_owned());
                }
                // Keepalive traffic is not part of the protocol stream.
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Ok(WsMessage::Close(close))) => {
                    return ChannelEvent::Closed(match close {
                        Some(close) => ChannelClose {
                            code: Some(u16::from(close.code)),
                            reason: if close.reason.is_empty() {
                                None
                            } else {
                                Some(close.reason.into_owned())
                            },
                        },
                        None => ChannelClose::default(),
                    });
                }
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "websocket read error");
                    return ChannelEvent::Closed(ChannelClose {
                        code: Some(CLOSE_ABNORMAL),
                        reason: Some(err.to_string()),
                    });
                }
                None => return ChannelEvent::Closed(ChannelClose::default()),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            tracing::debug!(error = %err, "ignoring websocket close failure");
        }
    }
}

/// Connector producing [`WsChannel`]s.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl ChannelConnector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn AgentChannel>> {
        let (stream, _response) = connect_async(url.as_str()).await.map_err(|e| {
            Error::transport(
                "channel failed to open",
                Some(url.to_string()),
                Some(Box::new(e)),
            )
        })?;
        tracing::debug!(url = %url, "channel opened");
        Ok(Box::new(WsChannel { stream }))
    }
}
