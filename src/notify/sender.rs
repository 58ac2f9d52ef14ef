use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("provider rejected message: {0}")]
    Rejected(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Outbound messaging capability. Either channel may fail independently.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_sms(&self, phone: &str, text: &str, country: &str) -> Result<(), TransportError>;

    async fn send_whatsapp(
        &self,
        phone: &str,
        text: &str,
        country: &str,
    ) -> Result<(), TransportError>;
}

/// Writes messages to the log instead of a provider. Used when no SMS or
/// WhatsApp provider is configured.
#[derive(Debug, Default, Clone)]
pub struct LogSender;

#[async_trait]
impl MessageSender for LogSender {
    async fn send_sms(&self, phone: &str, text: &str, country: &str) -> Result<(), TransportError> {
        info!(channel = "sms", phone, country, chars = text.chars().count(), "message sent");
        Ok(())
    }

    async fn send_whatsapp(
        &self,
        phone: &str,
        text: &str,
        country: &str,
    ) -> Result<(), TransportError> {
        info!(channel = "whatsapp", phone, country, chars = text.chars().count(), "message sent");
        Ok(())
    }
}
