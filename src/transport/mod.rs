/// Chat transport port and adapters
///
/// The dispatcher only ever sees `ChatTransport::send_message`; which platform
/// sits behind it is decided at startup.

pub mod errors;
pub mod log;
pub mod telegram;

pub use errors::DeliveryError;
pub use log::LogTransport;
pub use telegram::TelegramTransport;

/// How the platform should interpret message text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Plain,
    Html,
}

impl MessageFormat {
    /// Telegram `parse_mode` value
    pub fn parse_mode(self) -> Option<&'static str> {
        match self {
            MessageFormat::Plain => None,
            MessageFormat::Html => Some("HTML"),
        }
    }
}

/// Outbound message capability
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(
        &self,
        recipient: &str,
        text: &str,
        format: MessageFormat,
    ) -> Result<(), DeliveryError>;
}
