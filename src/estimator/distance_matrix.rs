use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::fallback::duration_label;
use super::{DistanceProvider, EstimateError, Route};
use crate::config::DistanceMatrixConfig;
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerError};

const BREAKER_NAME: &str = "distance_matrix";

/// Distance-matrix HTTP API; one origin, one destination per request
pub struct DistanceMatrixClient {
    http: reqwest::Client,
    config: DistanceMatrixConfig,
    /// For the duration label when the response carries none
    assumed_speed_kmh: f64,
    breaker: CircuitBreaker,
    metrics: Option<Arc<Metrics>>,
}

impl DistanceMatrixClient {
    pub fn new(
        config: DistanceMatrixConfig,
        assumed_speed_kmh: f64,
        metrics: Option<Arc<Metrics>>,
    ) -> Result<Self, EstimateError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        let breaker = CircuitBreaker::new(BREAKER_NAME, config.breaker.clone());

        Ok(Self {
            http,
            config,
            assumed_speed_kmh,
            breaker,
            metrics,
        })
    }

    async fn request(&self, origin: &str, destination: &str) -> Result<Route, EstimateError> {
        let url = format!(
            "{}/maps/api/distancematrix/json",
            self.config.base_url.trim_end_matches('/')
        );

        let response: MatrixResponse = self
            .http
            .get(url)
            .query(&[
                ("origins", origin),
                ("destinations", destination),
                ("units", "metric"),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_route(response, self.assumed_speed_kmh)
    }

    async fn publish_state(&self) {
        if let Some(metrics) = &self.metrics {
            metrics
                .circuit_breaker_state
                .with_label_values(&[BREAKER_NAME])
                .set(self.breaker.state().await.as_gauge());
        }
    }
}

#[async_trait]
impl DistanceProvider for DistanceMatrixClient {
    fn name(&self) -> &'static str {
        BREAKER_NAME
    }

    async fn measure(&self, origin: &str, destination: &str) -> Result<Route, EstimateError> {
        let result = self.breaker.call(self.request(origin, destination)).await;
        self.publish_state().await;

        match result {
            Ok(route) => Ok(route),
            Err(CircuitBreakerError::CircuitOpen(name)) => Err(EstimateError::CircuitOpen(name)),
            Err(CircuitBreakerError::OperationFailed(e)) => Err(e),
        }
    }
}

// ============================================================================
// Response format
// ============================================================================

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<TextValue>,
    duration: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
    /// metres for distance, seconds for duration
    value: f64,
}

fn parse_route(response: MatrixResponse, assumed_speed_kmh: f64) -> Result<Route, EstimateError> {
    if response.status != "OK" {
        return Err(EstimateError::ProviderStatus(response.status));
    }

    let element = response
        .rows
        .into_iter()
        .next()
        .and_then(|row| row.elements.into_iter().next())
        .ok_or_else(|| EstimateError::Malformed("no elements in response".to_string()))?;

    if element.status != "OK" {
        return Err(EstimateError::NoRoute(element.status));
    }

    let distance = element
        .distance
        .ok_or_else(|| EstimateError::Malformed("element has no distance".to_string()))?;

    let distance_km = distance.value / 1000.0;
    if !distance_km.is_finite() || distance_km < 0.0 {
        return Err(EstimateError::InvalidDistance(distance_km));
    }

    let duration_label = match element.duration {
        Some(duration) => duration.text,
        None => duration_label(distance_km, assumed_speed_kmh),
    };

    Ok(Route {
        distance_km: (distance_km * 10.0).round() / 10.0,
        duration_label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(json: &str) -> Result<Route, EstimateError> {
        parse_route(serde_json::from_str(json).unwrap(), 30.0)
    }

    #[test]
    fn test_parses_first_element() {
        let route = parse(
            r#"{
                "status": "OK",
                "rows": [{ "elements": [{
                    "status": "OK",
                    "distance": { "text": "25.0 km", "value": 25000 },
                    "duration": { "text": "48 mins", "value": 2880 }
                }]}]
            }"#,
        )
        .unwrap();

        assert_eq!(route.distance_km, 25.0);
        assert_eq!(route.duration_label, "48 mins");
    }

    #[test]
    fn test_rejected_request() {
        let err = parse(r#"{ "status": "REQUEST_DENIED", "rows": [] }"#).unwrap_err();
        assert!(matches!(err, EstimateError::ProviderStatus(s) if s == "REQUEST_DENIED"));
    }

    #[test]
    fn test_no_route() {
        let err = parse(r#"{ "status": "OK", "rows": [{ "elements": [{ "status": "ZERO_RESULTS" }] }] }"#)
            .unwrap_err();
        assert!(matches!(err, EstimateError::NoRoute(_)));
    }

    #[test]
    fn test_empty_rows_are_malformed() {
        let err = parse(r#"{ "status": "OK", "rows": [] }"#).unwrap_err();
        assert!(matches!(err, EstimateError::Malformed(_)));
    }

    #[test]
    fn test_missing_duration_is_derived() {
        let route = parse(
            r#"{ "status": "OK", "rows": [{ "elements": [{
                "status": "OK", "distance": { "text": "15 km", "value": 15000 }
            }]}]}"#,
        )
        .unwrap();
        assert_eq!(route.duration_label, "30 mins");
    }

    #[test]
    fn test_derived_duration_uses_configured_speed() {
        let json = r#"{ "status": "OK", "rows": [{ "elements": [{
            "status": "OK", "distance": { "text": "15 km", "value": 15000 }
        }]}]}"#;

        let route = parse_route(serde_json::from_str(json).unwrap(), 45.0).unwrap();

        assert_eq!(route.duration_label, "20 mins");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let mut config = DistanceMatrixConfig::new("test-key".to_string());
        config.base_url = "http://127.0.0.1:9".to_string();
        config.timeout = Duration::from_millis(500);

        let client = DistanceMatrixClient::new(config, 30.0, None).unwrap();
        assert!(client.measure("Delhi", "Gurgaon").await.is_err());
    }
}
