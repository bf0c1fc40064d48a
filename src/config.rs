//! Configuration for the relay and its providers.
//!
//! Values resolve from the environment the way the original desktop app did
//! (PROVIDER, OPENAI_API_KEY, ...), with builder methods for overriding in
//! code and tests.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::types::Category;

/// Fallback channel endpoint when neither bootstrap nor configuration
/// provides one.
pub const DEFAULT_CHANNEL_URL: &str = "ws://127.0.0.1:8765/ws";

/// How long to wait for `connection_established` before sending anyway.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default shell command timeout.
const DEFAULT_SHELL_TIMEOUT: Duration = Duration::from_millis(120_000);

/// Which backend answers a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// Local command shell.
    #[default]
    Shell,
    /// Cloud LLM chat-completion API.
    Http,
    /// Data-warehouse CLI.
    Warehouse,
    /// Streaming agent over a duplex channel.
    Agent,
}

impl ProviderKind {
    /// Parses the PROVIDER environment value. Unknown values fall back to
    /// the shell provider.
    pub fn from_env_value(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "openai" | "http" => ProviderKind::Http,
            "snow" | "snowflake" => ProviderKind::Warehouse,
            "agent" => ProviderKind::Agent,
            _ => ProviderKind::Shell,
        }
    }

    /// The sidebar category new sessions default to for this provider.
    pub fn default_category(&self) -> Category {
        match self {
            ProviderKind::Shell => Category::CommandLine,
            ProviderKind::Http => Category::Cortex,
            ProviderKind::Warehouse => Category::WarehouseCli,
            ProviderKind::Agent => Category::Ide,
        }
    }
}

/// Resolved configuration for a relay instance.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Which backend answers turns.
    pub provider: ProviderKind,

    /// Optional session-bootstrap endpoint for the streaming agent.
    pub session_url: Option<Url>,

    /// Statically configured channel URL, used when bootstrap is absent
    /// or fails.
    pub channel_url: Option<Url>,

    /// How long to wait for `connection_established` before sending the
    /// queued input anyway.
    pub ready_timeout: Duration,

    /// API key for the HTTP chat provider.
    pub api_key: Option<String>,

    /// Default model for the HTTP chat provider.
    pub model: Option<String>,

    /// Shell binary for the shell provider.
    pub shell_path: Option<String>,

    /// Shell command timeout.
    pub shell_timeout: Duration,

    /// Named connection for the warehouse CLI provider.
    pub warehouse_connection: Option<String>,

    /// Directory for persisted local state; `None` keeps everything
    /// in memory.
    pub state_dir: Option<PathBuf>,
}

impl RelayConfig {
    /// Creates a configuration with defaults and nothing resolved from the
    /// environment.
    pub fn new() -> Self {
        Self {
            provider: ProviderKind::Shell,
            session_url: None,
            channel_url: None,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            api_key: None,
            model: None,
            shell_path: None,
            shell_timeout: DEFAULT_SHELL_TIMEOUT,
            warehouse_connection: None,
            state_dir: None,
        }
    }

    /// Resolves configuration from the environment.
    pub fn from_env() -> Self {
        let provider = env::var("PROVIDER")
            .map(|v| ProviderKind::from_env_value(&v))
            .unwrap_or_default();
        let shell_timeout = env::var("SHELL_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SHELL_TIMEOUT);
        Self {
            provider,
            session_url: env::var("AGENT_SESSION_URL")
                .ok()
                .and_then(|v| Url::parse(&v).ok()),
            channel_url: env::var("AGENT_CHANNEL_URL")
                .ok()
                .and_then(|v| Url::parse(&v).ok()),
            api_key: env::var("OPENAI_API_KEY").ok(),
            model: env::var("OPENAI_MODEL").ok(),
            shell_path: env::var("SHELL_PATH").ok().or_else(|| env::var("SHELL").ok()),
            shell_timeout,
            warehouse_connection: env::var("SNOW_CONNECTION").ok(),
            state_dir: env::var("AGENTCHAT_STATE_DIR").ok().map(PathBuf::from),
            ..Self::new()
        }
    }

    /// Sets the provider kind.
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    /// Sets the bootstrap endpoint.
    pub fn with_session_url(mut self, url: Option<Url>) -> Self {
        self.session_url = url;
        self
    }

    /// Sets the static channel URL.
    pub fn with_channel_url(mut self, url: Option<Url>) -> Self {
        self.channel_url = url;
        self
    }

    /// Sets the connection-ready timeout.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Sets the API key for the HTTP chat provider.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Sets the default model for the HTTP chat provider.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Sets the state directory.
    pub fn with_state_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.state_dir = dir;
        self
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new()
    }
}
