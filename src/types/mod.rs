// Public modules
pub mod frame;
pub mod message;
pub mod session;

// Re-exports
pub use frame::{
    BootstrapMessage, BootstrapRequest, BootstrapResponse, EventData, InboundEnvelope,
    InnerEnvelope, OutboundFrame, RemoteSessionHandle,
};
pub use message::{Attachment, Message, MessageRole};
pub use session::{Category, Session};
