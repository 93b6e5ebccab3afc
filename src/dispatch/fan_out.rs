use actix::Addr;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::dead_letter::{AddToDlq, DeadLetter, DeadLetterActor};
use super::worker::{run_pool, NotifyTask, TaskOutcome, WorkerContext};
use crate::config::DispatchConfig;
use crate::domain::delivery::{DeliveryClaim, DeliveryOpportunity};
use crate::domain::notification::{ActivityLogEntry, Notification};
use crate::domain::user::{ActingWholesaler, Role};
use crate::messaging::MessagingGateway;
use crate::metrics::Metrics;
use crate::store::{
    ActivityLogRepository, ClaimRepository, DeadLetterRepository, DocumentStore, NotificationRepository,
    StoreError, UserDirectory,
};
use crate::utils::RetryConfig;

// ============================================================================
// Notification Fan-out Service
// ============================================================================
//
// A: publish the DeliveryClaim (create-if-absent on the deterministic id)
// B: snapshot the vehicle owner registry
// C: one notify task per owner through the worker pool; exhausted tasks are
//    dead-lettered
// D: best-effort SMS per delivered notification
//
// Writes for different owners are independent; nothing is rolled back.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to publish delivery claim {claim_id}: {source}")]
    ClaimWrite {
        claim_id: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to append activity log entry: {0}")]
    ActivityLog(#[source] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimPublication {
    /// This call wrote the claim
    Created,
    /// An earlier call wrote it and it is still open
    AlreadyAvailable,
    /// An earlier call wrote it and a vehicle owner has taken it
    AlreadyClaimed,
}

impl ClaimPublication {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimPublication::Created => "created",
            ClaimPublication::AlreadyAvailable => "already_available",
            ClaimPublication::AlreadyClaimed => "already_claimed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub recipients: usize,
    pub delivered: usize,
    pub already_notified: usize,
    /// Writes that exhausted their retries
    pub failed: usize,
    /// Of the failed writes, those recorded in the dead letter queue
    pub dead_lettered: usize,
    pub sms_sent: usize,
    pub registry_unavailable: bool,
}

impl BroadcastReport {
    /// Every owner either holds the notification or has a dead letter
    pub fn is_settled(&self) -> bool {
        !self.registry_unavailable && self.failed == self.dead_lettered
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub claim: ClaimPublication,
    /// `None` when the claim already existed and nobody was notified
    pub broadcast: Option<BroadcastReport>,
}

#[derive(Clone)]
pub struct DispatchService {
    claims: ClaimRepository,
    users: UserDirectory,
    notifications: NotificationRepository,
    activity: ActivityLogRepository,
    dead_letter_repository: DeadLetterRepository,
    dead_letters: Option<Addr<DeadLetterActor>>,
    gateway: Arc<dyn MessagingGateway>,
    workers: usize,
    retry: RetryConfig,
    assumed_speed_kmh: f64,
    metrics: Option<Arc<Metrics>>,
}

impl DispatchService {
    pub fn new(store: Arc<dyn DocumentStore>, gateway: Arc<dyn MessagingGateway>, config: &DispatchConfig) -> Self {
        Self {
            claims: ClaimRepository::new(store.clone()),
            users: UserDirectory::new(store.clone()),
            notifications: NotificationRepository::new(store.clone()),
            activity: ActivityLogRepository::new(store.clone()),
            dead_letter_repository: DeadLetterRepository::new(store),
            dead_letters: None,
            gateway,
            workers: config.fan_out_workers,
            retry: config.notification_retry.clone(),
            assumed_speed_kmh: config.assumed_speed_kmh,
            metrics: None,
        }
    }

    /// Route dead letters through the actor. Without one they are written
    /// straight to the repository.
    pub fn with_dead_letter_actor(mut self, addr: Addr<DeadLetterActor>) -> Self {
        self.dead_letters = Some(addr);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Step A, then B-D only if this call created the claim
    pub async fn notify_vehicle_owners(&self, opportunity: &DeliveryOpportunity) -> Result<DispatchReport, DispatchError> {
        let claim = self.publish_claim(opportunity).await?;

        let broadcast = match claim {
            ClaimPublication::Created => Some(self.broadcast(opportunity).await),
            other => {
                tracing::info!(
                    claim_id = %opportunity.claim_id,
                    publication = other.as_str(),
                    "Claim already published, not rebroadcasting"
                );
                None
            }
        };

        Ok(DispatchReport { claim, broadcast })
    }

    pub async fn publish_claim(&self, opportunity: &DeliveryOpportunity) -> Result<ClaimPublication, DispatchError> {
        let claim = DeliveryClaim::available(opportunity);

        let publication = match self.claims.create(&claim).await {
            Ok(true) => ClaimPublication::Created,
            Ok(false) => match self.claims.get(&claim.id).await {
                Ok(Some(existing)) if !existing.is_available() => ClaimPublication::AlreadyClaimed,
                Ok(_) => ClaimPublication::AlreadyAvailable,
                Err(e) => {
                    // It exists; its status is only informational
                    tracing::warn!(claim_id = %claim.id, error = %e, "Could not read existing claim");
                    ClaimPublication::AlreadyAvailable
                }
            },
            Err(e) => {
                self.count_claim("failed");
                return Err(DispatchError::ClaimWrite {
                    claim_id: claim.id.clone(),
                    source: e,
                });
            }
        };

        self.count_claim(publication.as_str());
        tracing::info!(
            claim_id = %claim.id,
            order_id = %claim.order_id,
            publication = publication.as_str(),
            delivery_cost = claim.delivery_cost,
            "Delivery claim published"
        );

        Ok(publication)
    }

    /// Steps B-D. Never fails; problems are counted in the report.
    pub async fn broadcast(&self, opportunity: &DeliveryOpportunity) -> BroadcastReport {
        let owners = match self.users.vehicle_owners().await {
            Ok(owners) => owners,
            Err(e) => {
                tracing::warn!(
                    claim_id = %opportunity.claim_id,
                    error = %e,
                    "Vehicle owner registry unavailable, nobody notified"
                );
                return BroadcastReport {
                    registry_unavailable: true,
                    ..BroadcastReport::default()
                };
            }
        };

        if owners.is_empty() {
            tracing::info!(claim_id = %opportunity.claim_id, "No vehicle owners registered");
            return BroadcastReport::default();
        }

        let tasks: Vec<NotifyTask> = owners
            .into_iter()
            .map(|owner| NotifyTask {
                notification: Notification::delivery_opportunity(&owner.id, opportunity, self.assumed_speed_kmh),
                phone: owner.phone,
            })
            .collect();

        let mut report = BroadcastReport {
            recipients: tasks.len(),
            ..BroadcastReport::default()
        };

        let context = WorkerContext {
            notifications: self.notifications.clone(),
            gateway: self.gateway.clone(),
            retry: self.retry.clone(),
            metrics: self.metrics.clone(),
        };

        for outcome in run_pool(tasks, self.workers, context).await {
            match outcome {
                TaskOutcome::Delivered { recipient_id, sms_sent } => {
                    tracing::trace!(recipient_id = %recipient_id, sms_sent = sms_sent, "Owner notified");
                    report.delivered += 1;
                    if sms_sent {
                        report.sms_sent += 1;
                    }
                }
                TaskOutcome::AlreadyNotified { recipient_id } => {
                    tracing::trace!(recipient_id = %recipient_id, "Owner already held the notification");
                    report.already_notified += 1;
                }
                TaskOutcome::Failed {
                    task,
                    error,
                    attempts,
                    first_failed_at,
                } => {
                    report.failed += 1;
                    if self
                        .dead_letter(&opportunity.claim_id, task.notification, error, attempts, first_failed_at)
                        .await
                    {
                        report.dead_lettered += 1;
                    }
                }
            }
        }

        tracing::info!(
            claim_id = %opportunity.claim_id,
            recipients = report.recipients,
            delivered = report.delivered,
            already_notified = report.already_notified,
            failed = report.failed,
            dead_lettered = report.dead_lettered,
            "Vehicle owners notified"
        );

        report
    }

    async fn dead_letter(
        &self,
        claim_id: &str,
        notification: Notification,
        error: String,
        attempts: u32,
        first_failed_at: DateTime<Utc>,
    ) -> bool {
        let payload = match serde_json::to_value(&notification) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(recipient_id = %notification.recipient_id, error = %e, "Could not encode dead letter");
                return false;
            }
        };
        let letter = DeadLetter::new(
            claim_id,
            notification.recipient_id.as_str(),
            payload,
            error,
            attempts,
            first_failed_at,
        );
        let letter_id = letter.id.clone();

        let stored = match &self.dead_letters {
            Some(addr) => match addr.send(AddToDlq(letter)).await {
                Ok(result) => result,
                Err(e) => Err(format!("dead letter actor unreachable: {}", e)),
            },
            None => match self.dead_letter_repository.put(&letter).await {
                Ok(()) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.dead_letters.inc();
                    }
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            },
        };

        match stored {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(letter_id = %letter_id, error = %e, "Dead letter lost");
                false
            }
        }
    }

    /// Record `action` on `subject_id` once. Returns false when the entry
    /// was already logged by an earlier attempt.
    pub async fn log_activity(
        &self,
        wholesaler: &ActingWholesaler,
        action: &str,
        subject_id: &str,
        details: String,
    ) -> Result<bool, DispatchError> {
        let entry = ActivityLogEntry::new(
            wholesaler.id.as_str(),
            Role::Wholesaler,
            wholesaler.name.as_str(),
            action,
            subject_id,
            details,
        );

        let written = self
            .activity
            .append(&wholesaler.id, &entry)
            .await
            .map_err(DispatchError::ActivityLog)?;

        tracing::debug!(
            wholesaler_id = %wholesaler.id,
            subject_id = %subject_id,
            action = action,
            written = written,
            "Activity logged"
        );
        Ok(written)
    }

    fn count_claim(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.claims_published.with_label_values(&[outcome]).inc();
        }
    }
}
