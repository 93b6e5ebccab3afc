use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Exponential Backoff Retry
// ============================================================================
//
// Used by the fan-out workers for notification writes. Only errors that
// report themselves as transient are retried. Each attempt is numbered from 1; the delay doubles (by `multiplier`) up to
// `max_delay` between attempts.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied after every failed attempt
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Policy for per-recipient notification writes
    pub fn fan_out() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let scaled = (current.as_millis() as f64 * self.multiplier) as u64;
        Duration::from_millis(scaled).min(self.max_delay)
    }
}

/// Final result of a retried operation
#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    /// Still failing after `attempts` tries
    Exhausted { error: E, attempts: u32 },
    /// Failed with an error that is not worth retrying
    Permanent { error: E, attempts: u32 },
}

/// Errors that know whether another attempt could succeed
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Retry errors that report themselves as transient, up to `max_attempts`
pub async fn retry_on_transient<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return RetryResult::Success(value);
            }
            Err(error) if !error.is_transient() => {
                tracing::error!(
                    operation = operation_name,
                    error = %error,
                    "Permanent failure, not retrying"
                );
                return RetryResult::Permanent { error, attempts: attempt };
            }
            Err(error) if attempt >= max_attempts => {
                tracing::error!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %error,
                    "Operation failed after all retries"
                );
                return RetryResult::Exhausted { error, attempts: attempt };
            }
            Err(error) => {
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying after delay"
                );
                sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}
