// Public modules
pub mod bootstrap;
pub mod channel;
pub mod classifier;
pub mod config;
pub mod error;
pub mod indicators;
pub mod manager;
pub mod providers;
pub mod render;
pub mod storage;
pub mod store;
pub mod types;
pub mod utils;

// Re-exports
pub use config::{ProviderKind, RelayConfig};
pub use error::{Error, Result};
pub use indicators::IndicatorTracker;
pub use manager::StreamRelay;
pub use render::{Renderer, TranscriptView, build_view};
pub use store::ConversationStore;
pub use types::*;
