use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, Mutex};

use crate::domain::notification::Notification;
use crate::messaging::MessagingGateway;
use crate::metrics::Metrics;
use crate::store::NotificationRepository;
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

// ============================================================================
// Notify Worker Pool
// ============================================================================
//
// One task per vehicle owner goes onto a bounded channel; `workers` tasks
// drain it concurrently. A task's notification write is retried on
// transient store errors; the SMS that follows a successful write is best
// effort. Tasks never affect one another.
//
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct NotifyTask {
    pub notification: Notification,
    pub phone: Option<String>,
}

#[derive(Debug)]
pub(crate) enum TaskOutcome {
    Delivered { recipient_id: String, sms_sent: bool },
    /// This owner already held the notification from an earlier attempt
    AlreadyNotified { recipient_id: String },
    Failed {
        task: NotifyTask,
        error: String,
        attempts: u32,
        first_failed_at: DateTime<Utc>,
    },
}

#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub notifications: NotificationRepository,
    pub gateway: Arc<dyn MessagingGateway>,
    pub retry: RetryConfig,
    pub metrics: Option<Arc<Metrics>>,
}

impl WorkerContext {
    fn count(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.notifications.with_label_values(&[outcome]).inc();
        }
    }

    fn count_sms(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.sms_messages.with_label_values(&[outcome]).inc();
        }
    }
}

/// Process every task and return one outcome per task, in completion order
pub(crate) async fn run_pool(tasks: Vec<NotifyTask>, workers: usize, context: WorkerContext) -> Vec<TaskOutcome> {
    if tasks.is_empty() {
        return Vec::new();
    }

    let workers = workers.clamp(1, tasks.len());
    let (task_tx, task_rx) = mpsc::channel::<NotifyTask>(workers * 2);
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<TaskOutcome>();
    let task_rx = Arc::new(Mutex::new(task_rx));

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let task_rx = task_rx.clone();
        let result_tx = result_tx.clone();
        let context = context.clone();

        handles.push(tokio::spawn(async move {
            loop {
                // Hold the lock only while taking the next task
                let next = task_rx.lock().await.recv().await;
                let Some(task) = next else { break };

                let outcome = process(&context, task).await;
                if result_tx.send(outcome).is_err() {
                    break;
                }
            }
            tracing::trace!(worker_id = worker_id, "Notify worker finished");
        }));
    }
    drop(result_tx);

    let total = tasks.len();
    for task in tasks {
        if task_tx.send(task).await.is_err() {
            tracing::error!("Notify workers stopped before all tasks were queued");
            break;
        }
    }
    drop(task_tx);

    let mut outcomes = Vec::with_capacity(total);
    while let Some(outcome) = result_rx.recv().await {
        outcomes.push(outcome);
    }

    for joined in join_all(handles).await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Notify worker panicked");
        }
    }

    outcomes
}

async fn process(context: &WorkerContext, task: NotifyTask) -> TaskOutcome {
    let recipient_id = task.notification.recipient_id.clone();
    let first_failure = OnceLock::new();

    let written = retry_on_transient(&context.retry, "write_notification", |_attempt| {
        let notifications = context.notifications.clone();
        let notification = task.notification.clone();
        let first_failure = &first_failure;
        async move {
            let result = notifications.create(&notification).await;
            if result.is_err() {
                first_failure.get_or_init(Utc::now);
            }
            result
        }
    })
    .await;

    match written {
        RetryResult::Success(true) => {
            context.count("delivered");
            let sms_sent = send_sms(context, &task).await;
            TaskOutcome::Delivered { recipient_id, sms_sent }
        }
        RetryResult::Success(false) => {
            context.count("already_notified");
            tracing::debug!(recipient_id = %recipient_id, "Owner already notified, skipping");
            TaskOutcome::AlreadyNotified { recipient_id }
        }
        RetryResult::Exhausted { error, attempts } | RetryResult::Permanent { error, attempts } => {
            context.count("failed");
            tracing::warn!(
                recipient_id = %recipient_id,
                attempts = attempts,
                error = %error,
                "Notification write failed"
            );
            TaskOutcome::Failed {
                task,
                error: error.to_string(),
                attempts,
                first_failed_at: first_failure.get().copied().unwrap_or_else(Utc::now),
            }
        }
    }
}

async fn send_sms(context: &WorkerContext, task: &NotifyTask) -> bool {
    let Some(phone) = task.phone.as_deref().filter(|p| !p.trim().is_empty()) else {
        context.count_sms("skipped");
        return false;
    };

    match context.gateway.send_sms(phone, &task.notification.sms_text()).await {
        Ok(()) => {
            context.count_sms("sent");
            true
        }
        Err(e) => {
            context.count_sms("failed");
            tracing::warn!(
                recipient_id = %task.notification.recipient_id,
                error = %e,
                "SMS failed, notification kept"
            );
            false
        }
    }
}
