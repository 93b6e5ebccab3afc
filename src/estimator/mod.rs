// ============================================================================
// Distance / Cost Estimator
// ============================================================================
//
// `DistanceProvider` is the capability; there are two implementations:
// - DistanceMatrixClient - HTTP distance-matrix API behind a circuit breaker
// - RandomDistance       - uniform sample in a configured range, never fails
//
// `Estimator` is assembled once from config. `estimate` tries the provider
// (if any) and falls back to the random distance on any failure, so packing
// never waits on a third party being healthy.
//
// ============================================================================

mod distance_matrix;
mod fallback;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::metrics::Metrics;

pub use distance_matrix::DistanceMatrixClient;
pub use fallback::RandomDistance;

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub distance_km: f64,
    pub duration_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Provider,
    Fallback,
}

impl EstimateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateSource::Provider => "provider",
            EstimateSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub duration_label: String,
    pub cost: f64,
    pub source: EstimateSource,
}

#[derive(Debug, thiserror::Error)]
pub enum EstimateError {
    #[error("distance request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("distance provider returned status {0}")]
    ProviderStatus(String),

    #[error("no route between origin and destination: {0}")]
    NoRoute(String),

    #[error("malformed distance response: {0}")]
    Malformed(String),

    #[error("provider returned an unusable distance: {0}")]
    InvalidDistance(f64),

    #[error("circuit breaker '{0}' is open")]
    CircuitOpen(&'static str),
}

#[async_trait]
pub trait DistanceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn measure(&self, origin: &str, destination: &str) -> Result<Route, EstimateError>;
}

pub struct Estimator {
    primary: Option<Arc<dyn DistanceProvider>>,
    fallback: RandomDistance,
    rate_per_km: f64,
    metrics: Option<Arc<Metrics>>,
}

impl Estimator {
    pub fn new(primary: Option<Arc<dyn DistanceProvider>>, fallback: RandomDistance, rate_per_km: f64) -> Self {
        Self {
            primary,
            fallback,
            rate_per_km,
            metrics: None,
        }
    }

    /// Provider only when a distance-matrix key is configured
    pub fn from_config(config: &DispatchConfig, metrics: Option<Arc<Metrics>>) -> Self {
        let fallback = RandomDistance::new(
            config.fallback_min_km,
            config.fallback_max_km,
            config.assumed_speed_kmh,
        );

        let primary: Option<Arc<dyn DistanceProvider>> = match &config.distance_matrix {
            Some(dm) => match DistanceMatrixClient::new(dm.clone(), config.assumed_speed_kmh, metrics.clone()) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::warn!(error = %e, "Distance matrix client unavailable, using fallback estimates");
                    None
                }
            },
            None => {
                tracing::info!("No distance matrix key configured, using fallback estimates");
                None
            }
        };

        let mut estimator = Self::new(primary, fallback, config.rate_per_km);
        estimator.metrics = metrics;
        estimator
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn rate_per_km(&self) -> f64 {
        self.rate_per_km
    }

    /// Always answers; provider failures are logged and replaced by a fallback
    pub async fn estimate(&self, origin: &str, destination: &str) -> RouteEstimate {
        let (route, source) = match &self.primary {
            Some(provider) => match provider.measure(origin, destination).await {
                Ok(route) if route.distance_km.is_finite() && route.distance_km >= 0.0 => {
                    (route, EstimateSource::Provider)
                }
                Ok(route) => {
                    tracing::warn!(
                        provider = provider.name(),
                        distance_km = route.distance_km,
                        "Provider returned unusable distance, using fallback"
                    );
                    (self.fallback.sample(), EstimateSource::Fallback)
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "Distance lookup failed, using fallback"
                    );
                    (self.fallback.sample(), EstimateSource::Fallback)
                }
            },
            None => (self.fallback.sample(), EstimateSource::Fallback),
        };

        if let Some(metrics) = &self.metrics {
            metrics.estimates.with_label_values(&[source.as_str()]).inc();
        }

        let estimate = RouteEstimate {
            cost: route.distance_km * self.rate_per_km,
            distance_km: route.distance_km,
            duration_label: route.duration_label,
            source,
        };

        tracing::debug!(
            origin = origin,
            destination = destination,
            distance_km = estimate.distance_km,
            cost = estimate.cost,
            source = source.as_str(),
            "Route estimated"
        );

        estimate
    }
}
