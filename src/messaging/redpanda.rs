use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::MessagingGateway;
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

pub const SMS_TOPIC: &str = "sms-outbound";
const BREAKER_NAME: &str = "redpanda_sms";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SmsRequest<'a> {
    to: &'a str,
    body: &'a str,
}

/// Hands SMS requests to the downstream sender through a Redpanda topic
pub struct RedpandaSmsGateway {
    producer: FutureProducer,
    topic: String,
    circuit_breaker: CircuitBreaker,
    metrics: Option<Arc<Metrics>>,
}

impl RedpandaSmsGateway {
    pub fn new(brokers: &str, topic: impl Into<String>) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            open_for: Duration::from_secs(30),
            success_threshold: 3,
        };

        Ok(Self {
            producer,
            topic: topic.into(),
            circuit_breaker: CircuitBreaker::new(BREAKER_NAME, cb_config),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn publish_state(&self) {
        if let Some(metrics) = &self.metrics {
            metrics
                .circuit_breaker_state
                .with_label_values(&[BREAKER_NAME])
                .set(self.circuit_breaker.state().await.as_gauge());
        }
    }
}

#[async_trait]
impl MessagingGateway for RedpandaSmsGateway {
    async fn send_sms(&self, to: &str, body: &str) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&SmsRequest { to, body })?;

        // Keyed by phone number so one recipient's messages stay ordered
        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(&self.topic).key(to).payload(&payload);

                self.producer
                    .send(record, Timeout::After(Duration::from_secs(5)))
                    .await
                    .map_err(|(e, _)| anyhow::anyhow!("Kafka send error: {}", e))?;

                Ok::<(), anyhow::Error>(())
            })
            .await;
        self.publish_state().await;

        match result {
            Ok(()) => {
                tracing::debug!(topic = %self.topic, to = %to, "SMS request published");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen(name)) => {
                tracing::error!(topic = %self.topic, breaker = name, "Circuit breaker open - Redpanda unavailable");
                Err(anyhow::anyhow!("Circuit breaker open for Redpanda"))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(error = %e, topic = %self.topic, "Failed to publish SMS request");
                Err(e)
            }
        }
    }
}
