use std::time::Duration;

use crate::utils::{CircuitBreakerConfig, RetryConfig};

// ============================================================================
// Dispatch Configuration
// ============================================================================

pub const DEFAULT_RATE_PER_KM: f64 = 10.0;

#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// Delivery cost per kilometre
    pub rate_per_km: f64,
    /// Bounds for the fallback distance when no provider answers
    pub fallback_min_km: f64,
    pub fallback_max_km: f64,
    /// Used for duration estimates when the provider gives none
    pub assumed_speed_kmh: f64,
    /// Concurrent notification writers per broadcast
    pub fan_out_workers: usize,
    pub notification_retry: RetryConfig,
    /// How long one packing attempt keeps other callers off the same order
    pub packing_lease: Duration,
    pub placeholders: ContactPlaceholders,
    /// Absent means "fallback estimates only"
    pub distance_matrix: Option<DistanceMatrixConfig>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rate_per_km: DEFAULT_RATE_PER_KM,
            fallback_min_km: 5.0,
            fallback_max_km: 55.0,
            assumed_speed_kmh: 30.0,
            fan_out_workers: 4,
            notification_retry: RetryConfig::fan_out(),
            packing_lease: Duration::from_secs(120),
            placeholders: ContactPlaceholders::default(),
            distance_matrix: None,
        }
    }
}

impl DispatchConfig {
    pub fn with_distance_matrix(mut self, api_key: Option<String>) -> Self {
        self.distance_matrix = api_key
            .filter(|key| !key.trim().is_empty())
            .map(DistanceMatrixConfig::new);
        self
    }
}

/// Stand-in retailer contact values used when the profile lookup fails
#[derive(Clone, Debug)]
pub struct ContactPlaceholders {
    pub name: String,
    pub shop_name: String,
    pub address: String,
    pub phone: String,
}

impl Default for ContactPlaceholders {
    fn default() -> Self {
        Self {
            name: "Retailer".to_string(),
            shop_name: "Unknown shop".to_string(),
            address: "Address unavailable".to_string(),
            phone: "N/A".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DistanceMatrixConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub breaker: CircuitBreakerConfig,
}

impl DistanceMatrixConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://maps.googleapis.com".to_string(),
            timeout: Duration::from_secs(5),
            breaker: CircuitBreakerConfig {
                failure_threshold: 3,
                open_for: Duration::from_secs(30),
                success_threshold: 1,
            },
        }
    }
}
