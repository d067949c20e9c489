use std::time::Duration;
use thiserror::Error;

/// A message could not be handed to the chat platform
///
/// Delivery errors are logged and swallowed by the dispatcher; they are never
/// retried within the same tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The platform answered and refused the message (blocked bot, bad chat id, ...)
    #[error("Message rejected ({status}): {description}")]
    Rejected { status: u16, description: String },

    /// The request never got a usable answer
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),
}

impl DeliveryError {
    /// True when retrying the same message can never succeed
    /// (the user blocked the bot or the chat no longer exists)
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::Rejected { status: 400 | 403, .. })
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL carries the bot token
        DeliveryError::Transport(err.without_url().to_string())
    }
}
