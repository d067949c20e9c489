use super::errors::DeliveryError;
use super::{ChatTransport, MessageFormat};

/// Transport that only writes messages to the log
///
/// Used when no bot token is configured, so the scheduler can be exercised
/// locally without a chat platform.
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait::async_trait]
impl ChatTransport for LogTransport {
    async fn send_message(
        &self,
        recipient: &str,
        text: &str,
        format: MessageFormat,
    ) -> Result<(), DeliveryError> {
        tracing::info!("✉️  [{:?}] to {}:\n{}", format, recipient, text);
        Ok(())
    }
}
