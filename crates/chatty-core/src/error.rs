use thiserror::Error;

use crate::Channel;

/// Reasons `RelayEngine::start` refuses to touch a channel.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("API key must be provided")]
    MissingApiKey,

    #[error("webhook URL for {0} must be provided")]
    MissingWebhook(Channel),
}
