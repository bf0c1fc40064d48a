//! The optional session-bootstrap request.
//!
//! Before a fresh connect, the relay may POST the latest user text to a
//! configured endpoint to provision a remote session; the response carries
//! the remote session id and the channel URL to use. The result is cached
//! per chat session so later turns reuse it.

use async_trait::async_trait;
use url::Url;

use crate::error::{Error, Result};
use crate::types::{BootstrapRequest, BootstrapResponse, RemoteSessionHandle};

/// Provisions remote sessions ahead of a fresh connect.
#[async_trait]
pub trait SessionBootstrap: Send + Sync {
    /// Issues one bootstrap request carrying the latest user text.
    async fn bootstrap(&self, endpoint: &Url, latest_user_text: &str)
    -> Result<RemoteSessionHandle>;
}

/// HTTP-backed bootstrap.
#[derive(Debug, Clone)]
pub struct HttpBootstrap {
    client: reqwest::Client,
}

impl HttpBootstrap {
    /// Creates a bootstrap client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpBootstrap {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionBootstrap for HttpBootstrap {
    async fn bootstrap(
        &self,
        endpoint: &Url,
        latest_user_text: &str,
    ) -> Result<RemoteSessionHandle> {
        let body = BootstrapRequest::latest_user(latest_user_text);
        let response = self
            .client
            .post(endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::transport(
                    "bootstrap request failed",
                    Some(endpoint.to_string()),
                    Some(Box::new(e)),
                )
            })?;
        if !response.status().is_success() {
            return Err(Error::transport(
                format!("bootstrap request returned {}", response.status()),
                Some(endpoint.to_string()),
                None,
            ));
        }
        let parsed: BootstrapResponse = response.json().await.map_err(|e| {
            Error::serialization(
                "failed to parse bootstrap response",
                Some(Box::new(e)),
            )
        })?;
        tracing::debug!(
            session_id = ?parsed.session_id,
            websocket_url = ?parsed.websocket_url,
            "bootstrap succeeded"
        );
        Ok(RemoteSessionHandle::from(parsed))
    }
}
