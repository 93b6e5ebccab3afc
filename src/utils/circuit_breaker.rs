use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Guards calls to an external dependency (distance-matrix API, Kafka).
// After `failure_threshold` consecutive failures the breaker opens and calls
// are refused without touching the dependency. Once `open_for` has elapsed a
// trial call is let through (HalfOpen); `success_threshold` trial successes
// close it again, a single trial failure reopens it.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding for the metrics gauge
    pub fn as_gauge(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_for: Duration,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_for: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    trial_successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    inner: Arc<Mutex<BreakerState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                trial_successes: 0,
                opened_at: None,
            })),
            config,
        }
    }

    /// Run `operation` unless the breaker is open
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        self.admit().await?;

        match operation.await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                self.on_failure().await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    async fn admit<E>(&self) -> Result<(), CircuitBreakerError<E>> {
        let mut inner = self.inner.lock().await;

        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let cooled_down = inner
            .opened_at
            .map(|at| at.elapsed() >= self.config.open_for)
            .unwrap_or(true);

        if cooled_down {
            tracing::info!(breaker = self.name, "Circuit breaker half-open, letting a trial call through");
            inner.state = CircuitState::HalfOpen;
            inner.trial_successes = 0;
            Ok(())
        } else {
            Err(CircuitBreakerError::CircuitOpen(self.name))
        }
    }

    async fn on_success(&self) {
        let mut inner = self.inner.lock().await;

        match inner.state {
            CircuitState::HalfOpen => {
                inner.trial_successes += 1;
                if inner.trial_successes >= self.config.success_threshold {
                    tracing::info!(breaker = self.name, "Circuit breaker closed");
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.trial_successes = 0;
                    inner.opened_at = None;
                }
            }
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures += 1;

        match inner.state {
            CircuitState::Closed if inner.consecutive_failures >= self.config.failure_threshold => {
                tracing::warn!(
                    breaker = self.name,
                    failures = inner.consecutive_failures,
                    "Circuit breaker opened"
                );
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::HalfOpen => {
                tracing::warn!(breaker = self.name, "Trial call failed, circuit breaker reopened");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.trial_successes = 0;
            }
            _ => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }
}

#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    CircuitOpen(&'static str),
    OperationFailed(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerError::CircuitOpen(name) => write!(f, "circuit breaker '{}' is open", name),
            CircuitBreakerError::OperationFailed(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error> std::error::Error for CircuitBreakerError<E> {}
