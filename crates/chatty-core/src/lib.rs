pub mod channel;
pub mod credentials;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod message;
pub mod source;

// Re-export key types
pub use channel::Channel;
pub use credentials::{RelayCredentials, Webhooks};
pub use dedup::DedupSet;
pub use engine::{ChannelStatus, RelayEngine, RelayOptions, StatusUpdate};
pub use error::RelayError;
pub use message::{format_message, format_message_in, most_recent, ChatMessage};
pub use source::{ChatSource, WebhookSink};
