mod redpanda;

use async_trait::async_trait;

pub use redpanda::{RedpandaSmsGateway, SMS_TOPIC};

/// Outbound text messages to a phone number. Delivery is best effort;
/// callers log failures and carry on.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> anyhow::Result<()>;
}

/// Writes the message to the log instead of sending it
#[derive(Default)]
pub struct LoggingGateway;

#[async_trait]
impl MessagingGateway for LoggingGateway {
    async fn send_sms(&self, to: &str, body: &str) -> anyhow::Result<()> {
        if to.trim().is_empty() {
            anyhow::bail!("recipient has no phone number");
        }
        tracing::info!(to = %to, body = %body, "SMS (logged, not sent)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_gateway_needs_a_number() {
        let gateway = LoggingGateway;
        assert!(gateway.send_sms("+91-9000000000", "hello").await.is_ok());
        assert!(gateway.send_sms(" ", "hello").await.is_err());
    }
}
