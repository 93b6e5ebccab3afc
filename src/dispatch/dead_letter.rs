use actix::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::store::DeadLetterRepository;

// ============================================================================
// Dead Letter Queue Actor
// ============================================================================
//
// Holds notification writes that failed after all retry attempts.
// - persisted under dead_letters/{id} for manual replay
// - queryable, with per-claim counts
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub id: String,
    pub claim_id: String,
    pub recipient_id: String,
    /// The notification that could not be written
    pub payload: serde_json::Value,
    pub error: String,
    pub attempts: u32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(
        claim_id: impl Into<String>,
        recipient_id: impl Into<String>,
        payload: serde_json::Value,
        error: impl Into<String>,
        attempts: u32,
        first_failed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            claim_id: claim_id.into(),
            recipient_id: recipient_id.into(),
            payload,
            error: error.into(),
            attempts,
            first_failed_at,
            last_failed_at: Utc::now(),
        }
    }
}

pub struct DeadLetterActor {
    repository: DeadLetterRepository,
    metrics: Option<Arc<Metrics>>,
}

impl DeadLetterActor {
    pub fn new(repository: DeadLetterRepository, metrics: Option<Arc<Metrics>>) -> Self {
        Self { repository, metrics }
    }
}

impl Actor for DeadLetterActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("DeadLetterActor started - Dead Letter Queue ready");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), String>")]
pub struct AddToDlq(pub DeadLetter);

#[derive(Message)]
#[rtype(result = "Result<Vec<DeadLetter>, String>")]
pub struct GetDeadLetters {
    pub limit: usize,
}

#[derive(Message)]
#[rtype(result = "Result<DlqStats, String>")]
pub struct GetDlqStats;

#[derive(Debug, Clone, Default)]
pub struct DlqStats {
    pub total_messages: usize,
    pub by_claim: HashMap<String, usize>,
}

// ============================================================================
// Handlers
// ============================================================================

impl Handler<AddToDlq> for DeadLetterActor {
    type Result = ResponseFuture<Result<(), String>>;

    fn handle(&mut self, msg: AddToDlq, _: &mut Self::Context) -> Self::Result {
        let repository = self.repository.clone();
        let metrics = self.metrics.clone();
        let letter = msg.0;

        tracing::error!(
            letter_id = %letter.id,
            claim_id = %letter.claim_id,
            recipient_id = %letter.recipient_id,
            error = %letter.error,
            attempts = letter.attempts,
            "💀 Adding notification to Dead Letter Queue"
        );

        Box::pin(async move {
            repository
                .put(&letter)
                .await
                .map_err(|e| format!("Failed to store dead letter: {}", e))?;

            if let Some(metrics) = metrics {
                metrics.dead_letters.inc();
            }

            tracing::info!(letter_id = %letter.id, "Dead letter stored");
            Ok(())
        })
    }
}

impl Handler<GetDeadLetters> for DeadLetterActor {
    type Result = ResponseFuture<Result<Vec<DeadLetter>, String>>;

    fn handle(&mut self, msg: GetDeadLetters, _: &mut Self::Context) -> Self::Result {
        let repository = self.repository.clone();

        Box::pin(async move {
            let mut letters = repository
                .list()
                .await
                .map_err(|e| format!("Failed to query DLQ: {}", e))?;
            letters.truncate(msg.limit);
            Ok(letters)
        })
    }
}

impl Handler<GetDlqStats> for DeadLetterActor {
    type Result = ResponseFuture<Result<DlqStats, String>>;

    fn handle(&mut self, _msg: GetDlqStats, _: &mut Self::Context) -> Self::Result {
        let repository = self.repository.clone();

        Box::pin(async move {
            let letters = repository
                .list()
                .await
                .map_err(|e| format!("Failed to count DLQ messages: {}", e))?;

            let mut by_claim = HashMap::new();
            for letter in &letters {
                *by_claim.entry(letter.claim_id.clone()).or_insert(0) += 1;
            }

            Ok(DlqStats {
                total_messages: letters.len(),
                by_claim,
            })
        })
    }
}
