mod server;

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
};

pub use server::start_metrics_server;

// ============================================================================
// Metrics - Prometheus instruments for the packing workflow
// ============================================================================
//
// - packing requests by outcome and their duration
// - estimator answers by source (provider / fallback)
// - claim publications, notification writes, SMS sends by outcome
// - dead letters and circuit breaker state
//
// Served on /metrics by `start_metrics_server`.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub packing_requests: IntCounterVec,
    pub packing_duration: Histogram,

    pub estimates: IntCounterVec,

    pub claims_published: IntCounterVec,
    pub notifications: IntCounterVec,
    pub sms_messages: IntCounterVec,
    pub dead_letters: IntCounter,

    pub circuit_breaker_state: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let packing_requests = IntCounterVec::new(
            Opts::new("packing_requests_total", "mark_packed calls by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(packing_requests.clone()))?;

        let packing_duration = Histogram::with_opts(
            HistogramOpts::new("packing_duration_seconds", "End-to-end mark_packed duration")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(packing_duration.clone()))?;

        let estimates = IntCounterVec::new(
            Opts::new("distance_estimates_total", "Distance estimates by source"),
            &["source"],
        )?;
        registry.register(Box::new(estimates.clone()))?;

        let claims_published = IntCounterVec::new(
            Opts::new("delivery_claims_total", "Delivery claim publications by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(claims_published.clone()))?;

        let notifications = IntCounterVec::new(
            Opts::new("notifications_total", "Vehicle owner notification writes by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(notifications.clone()))?;

        let sms_messages = IntCounterVec::new(
            Opts::new("sms_messages_total", "Outbound SMS attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(sms_messages.clone()))?;

        let dead_letters = IntCounter::new(
            "dead_letters_total",
            "Notification tasks moved to the dead letter queue",
        )?;
        registry.register(Box::new(dead_letters.clone()))?;

        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new(
                "circuit_breaker_state",
                "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
            ),
            &["breaker"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            packing_requests,
            packing_duration,
            estimates,
            claims_published,
            notifications,
            sms_messages,
            dead_letters,
            circuit_breaker_state,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
