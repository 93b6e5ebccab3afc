use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use actix::Actor;
use packing_dispatch::config::DispatchConfig;
use packing_dispatch::dispatch::{DeadLetterActor, DispatchService};
use packing_dispatch::domain::delivery::{claim_id_for, ClaimStatus, DeliveryClaim, DeliveryOpportunity};
use packing_dispatch::domain::order::{ContactSnapshot, DeliveryMetadata, Order, OrderItem, OrderStatus};
use packing_dispatch::domain::user::{ActingWholesaler, Role, UserProfile};
use packing_dispatch::estimator::{DistanceProvider, EstimateError, EstimateSource, Estimator, RandomDistance, Route};
use packing_dispatch::messaging::LoggingGateway;
use packing_dispatch::store::{
    ActivityLogRepository, ClaimRepository, DeadLetterRepository, DocumentStore, InMemoryDocumentStore,
    NotificationRepository, OrderRepository, PackingStateRepository, UserDirectory,
};
use packing_dispatch::utils::RetryConfig;
use packing_dispatch::workflow::{BroadcastStep, ClaimStep, PackingError, PackingOrchestrator, PackingState};

// ============================================================================
// Fixtures
// ============================================================================

struct FixedDistance(f64);

#[async_trait]
impl DistanceProvider for FixedDistance {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn measure(&self, _origin: &str, _destination: &str) -> Result<Route, EstimateError> {
        Ok(Route {
            distance_km: self.0,
            duration_label: "50 mins".to_string(),
        })
    }
}

/// Behaves like a provider whose network is down
struct Unreachable;

#[async_trait]
impl DistanceProvider for Unreachable {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn measure(&self, _origin: &str, _destination: &str) -> Result<Route, EstimateError> {
        Err(EstimateError::ProviderStatus("connection refused".to_string()))
    }
}

/// Answers slowly, then fails, so every caller ends up on the random fallback
struct SlowUnreachable(Duration);

#[async_trait]
impl DistanceProvider for SlowUnreachable {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn measure(&self, _origin: &str, _destination: &str) -> Result<Route, EstimateError> {
        tokio::time::sleep(self.0).await;
        Err(EstimateError::ProviderStatus("timed out".to_string()))
    }
}

struct Harness {
    store: Arc<InMemoryDocumentStore>,
    orchestrator: PackingOrchestrator,
}

impl Harness {
    fn new(provider: Option<Arc<dyn DistanceProvider>>) -> Self {
        Self::build(provider, None)
    }

    fn build(provider: Option<Arc<dyn DistanceProvider>>, dlq: Option<actix::Addr<DeadLetterActor>>) -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        Self::with_store(store, provider, dlq)
    }

    fn with_store(
        store: Arc<InMemoryDocumentStore>,
        provider: Option<Arc<dyn DistanceProvider>>,
        dlq: Option<actix::Addr<DeadLetterActor>>,
    ) -> Self {
        let config = DispatchConfig {
            notification_retry: RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                multiplier: 2.0,
            },
            ..DispatchConfig::default()
        };
        let dyn_store: Arc<dyn DocumentStore> = store.clone();

        let estimator = Arc::new(Estimator::new(
            provider,
            RandomDistance::seeded(config.fallback_min_km, config.fallback_max_km, config.assumed_speed_kmh, 11),
            config.rate_per_km,
        ));
        let mut dispatch = DispatchService::new(dyn_store.clone(), Arc::new(LoggingGateway), &config);
        if let Some(addr) = dlq {
            dispatch = dispatch.with_dead_letter_actor(addr);
        }

        Self {
            orchestrator: PackingOrchestrator::new(dyn_store, estimator, dispatch, &config),
            store,
        }
    }

    fn dyn_store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    async fn register_owners(&self, ids: &[&str]) {
        let users = UserDirectory::new(self.dyn_store());
        for id in ids {
            users
                .put(&UserProfile::new(*id, format!("Driver {}", id), Role::VehicleOwner).with_phone("+91-9899000000"))
                .await
                .unwrap();
        }
    }

    async fn stored_claim(&self, wholesaler_id: &str, order_id: &str) -> DeliveryClaim {
        ClaimRepository::new(self.dyn_store())
            .get(&claim_id_for(wholesaler_id, order_id))
            .await
            .unwrap()
            .unwrap()
    }

    async fn stored_order(&self, order_id: &str) -> Order {
        OrderRepository::new(self.dyn_store())
            .get("W1", order_id)
            .await
            .unwrap()
            .unwrap()
    }
}

fn wholesaler() -> ActingWholesaler {
    ActingWholesaler {
        id: "W1".to_string(),
        name: "Asha Verma".to_string(),
        shop_name: "Verma Wholesale".to_string(),
        address: "Delhi".to_string(),
        phone: "+91-9810000001".to_string(),
    }
}

fn confirmed_order(id: &str) -> Order {
    let mut order = Order::new(
        id,
        "R1",
        "W1",
        vec![
            OrderItem::new("Rice", 5.0, "kg", 40.0),
            OrderItem::new("Wheat", 2.0, "bag", 900.0),
        ],
    )
    .unwrap()
    .with_retailer_snapshot(ContactSnapshot {
        name: "Ravi Kumar".to_string(),
        shop_name: "Ravi Kirana".to_string(),
        address: "Gurgaon".to_string(),
        phone: "+91-9810000002".to_string(),
        captured_at: Utc::now(),
    });
    order.confirm().unwrap();
    order
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_delhi_to_gurgaon_at_25_km_costs_250() {
    let h = Harness::new(Some(Arc::new(FixedDistance(25.0))));
    let before = Utc::now();

    let outcome = h.orchestrator.mark_packed(&confirmed_order("O1"), &wholesaler()).await.unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.estimate_source, Some(EstimateSource::Provider));

    let order = h.stored_order("O1").await;
    assert_eq!(order.status, OrderStatus::Packed);
    let delivery = order.delivery.as_ref().unwrap();
    assert_eq!(delivery.distance_km, 25.0);
    assert_eq!(delivery.delivery_cost, 250.0);
    assert!(delivery.packed_at >= before);
    order.check_invariants().unwrap();

    let claim = ClaimRepository::new(h.dyn_store())
        .get(&claim_id_for("W1", "O1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claim.status, ClaimStatus::Available);
    assert_eq!(claim.distance_km, 25.0);
    assert_eq!(claim.delivery_cost, 250.0);
    assert_eq!(claim.wholesaler.address, "Delhi");
    assert_eq!(claim.retailer.address, "Gurgaon");
    assert_eq!(claim.items_description, "Rice x 5 kg, Wheat x 2 bag");
}

#[tokio::test]
async fn test_three_owners_get_three_notifications() {
    let h = Harness::new(Some(Arc::new(FixedDistance(40.0))));
    h.register_owners(&["V1", "V2", "V3"]).await;

    let outcome = h.orchestrator.mark_packed(&confirmed_order("O2"), &wholesaler()).await.unwrap();

    assert_eq!(outcome.notified(), 3);
    let notifications = NotificationRepository::new(h.dyn_store());
    for owner in ["V1", "V2", "V3"] {
        let inbox = notifications.list_for(owner).await.unwrap();
        assert_eq!(inbox.len(), 1, "owner {}", owner);
        let payload = &inbox[0].payload;
        assert_eq!(payload.order_id, "O2");
        assert_eq!(payload.distance_km, 40.0);
        assert_eq!(payload.delivery_cost, 400.0);
        // ceil(40 / 30)
        assert_eq!(payload.estimated_hours, 2);
        assert!(!inbox[0].read);
    }
    assert_eq!(h.store.count_prefixed("notifications/").await, 3);
}

#[tokio::test]
async fn test_provider_network_error_falls_back() {
    let h = Harness::new(Some(Arc::new(Unreachable)));

    let outcome = h.orchestrator.mark_packed(&confirmed_order("O3"), &wholesaler()).await.unwrap();

    assert_eq!(outcome.estimate_source, Some(EstimateSource::Fallback));
    let delivery = outcome.order.delivery.unwrap();
    assert!((5.0..=55.0).contains(&delivery.distance_km));
    assert_eq!(delivery.delivery_cost, delivery.distance_km * 10.0);
    assert!(outcome.state.is_complete());
}

#[tokio::test]
async fn test_order_write_failure_writes_nothing_else() {
    let h = Harness::new(Some(Arc::new(FixedDistance(25.0))));
    h.register_owners(&["V1", "V2"]).await;
    let order = confirmed_order("O4");
    OrderRepository::new(h.dyn_store()).put(&order).await.unwrap();
    h.store.inject_write_fault("orders/").await;

    let err = h.orchestrator.mark_packed(&order, &wholesaler()).await.unwrap_err();

    assert!(matches!(err, PackingError::Persistence { .. }));
    assert_eq!(h.store.count("available_deliveries").await, 0);
    assert_eq!(h.store.count_prefixed("notifications/").await, 0);
    assert_eq!(h.store.count_prefixed("activity_logs/").await, 0);
    assert_eq!(h.stored_order("O4").await.status, OrderStatus::Confirmed);

    // the failed attempt released its lease, so a retry goes through
    h.store.clear_faults().await;
    let retried = h.orchestrator.mark_packed(&order, &wholesaler()).await.unwrap();
    assert!(retried.is_complete());
    assert_eq!(retried.claim, ClaimStep::Created);
    assert_eq!(retried.state.attempts, 2);
}

#[tokio::test]
async fn test_packing_twice_keeps_one_available_claim() {
    let h = Harness::new(Some(Arc::new(FixedDistance(25.0))));
    h.register_owners(&["V1", "V2"]).await;
    let order = confirmed_order("O5");

    let first = h.orchestrator.mark_packed(&order, &wholesaler()).await.unwrap();
    let second = h.orchestrator.mark_packed(&order, &wholesaler()).await.unwrap();

    assert_eq!(first.claim, ClaimStep::Created);
    assert_eq!(second.claim, ClaimStep::AlreadyPresent);
    assert_eq!(second.broadcast, BroadcastStep::AlreadySent);
    assert!(second.resumed);
    // values from the first packing are kept
    assert_eq!(second.order.delivery, first.order.delivery);

    let available = ClaimRepository::new(h.dyn_store()).available_for_order("O5").await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(h.store.count("notifications/V1").await, 1);
    assert_eq!(h.store.count("activity_logs/W1").await, 1);
}

#[tokio::test]
async fn test_concurrent_packers_publish_one_claim() {
    let h = Harness::new(Some(Arc::new(FixedDistance(25.0))));
    h.register_owners(&["V1", "V2", "V3"]).await;
    let order = confirmed_order("O6");
    let acting = wholesaler();

    let (a, b) = tokio::join!(
        h.orchestrator.mark_packed(&order, &acting),
        h.orchestrator.mark_packed(&order, &acting),
    );

    let results = [a, b];
    for result in &results {
        assert!(
            matches!(result, Ok(_) | Err(PackingError::InProgress { .. })),
            "unexpected result {:?}",
            result.as_ref().err()
        );
    }
    let created = results
        .iter()
        .filter(|r| matches!(r, Ok(o) if o.claim == ClaimStep::Created))
        .count();
    assert_eq!(created, 1);
    assert_eq!(h.store.count("available_deliveries").await, 1);
    for owner in ["V1", "V2", "V3"] {
        assert_eq!(h.store.count(&format!("notifications/{}", owner)).await, 1);
    }
    assert_eq!(h.store.count("activity_logs/W1").await, 1);
}

#[tokio::test]
async fn test_racing_packers_leave_order_and_claim_in_agreement() {
    let h = Harness::new(Some(Arc::new(SlowUnreachable(Duration::from_millis(20)))));
    h.register_owners(&["V1", "V2", "V3"]).await;
    let order = confirmed_order("O14");
    let acting = wholesaler();

    let (a, b) = tokio::join!(
        h.orchestrator.mark_packed(&order, &acting),
        h.orchestrator.mark_packed(&order, &acting),
    );

    let results = [a, b];
    let packed = results.iter().filter(|r| r.is_ok()).count();
    let turned_away = results
        .iter()
        .filter(|r| matches!(r, Err(PackingError::InProgress { .. })))
        .count();
    assert!(packed >= 1);
    assert_eq!(packed + turned_away, 2);

    let stored = h.stored_order("O14").await.delivery.unwrap();
    let claim = h.stored_claim("W1", "O14").await;
    assert_eq!(stored.distance_km, claim.distance_km);
    assert_eq!(stored.delivery_cost, claim.delivery_cost);
    assert_eq!(stored.packed_at, claim.packed_at);

    let notifications = NotificationRepository::new(h.dyn_store());
    for owner in ["V1", "V2", "V3"] {
        let inbox = notifications.list_for(owner).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].payload.distance_km, claim.distance_km);
        assert_eq!(inbox[0].payload.delivery_cost, claim.delivery_cost);
    }

    let entries = ActivityLogRepository::new(h.dyn_store()).list_for("W1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].subject_id, "O14");
}

#[tokio::test]
async fn test_order_is_aligned_with_claim_left_by_an_interrupted_attempt() {
    let h = Harness::new(Some(Arc::new(FixedDistance(25.0))));
    h.register_owners(&["V1", "V2"]).await;
    let order = confirmed_order("O15");

    // An earlier attempt published a 12 km claim and died holding the lease
    let earlier = order
        .packed(
            order.retailer_snapshot.clone().unwrap(),
            DeliveryMetadata {
                distance_km: 12.0,
                delivery_cost: 120.0,
                duration_label: "24 mins".to_string(),
                packed_at: Utc::now() - chrono::Duration::minutes(10),
            },
        )
        .unwrap();
    let opportunity = DeliveryOpportunity::from_packed_order(&earlier, &wholesaler()).unwrap();
    ClaimRepository::new(h.dyn_store())
        .create(&DeliveryClaim::available(&opportunity))
        .await
        .unwrap();
    let mut stale = PackingState::new("W1", "O15");
    stale.attempts = 1;
    stale.in_flight_since = Some(Utc::now() - chrono::Duration::minutes(10));
    PackingStateRepository::new(h.dyn_store()).put(&stale).await.unwrap();

    let outcome = h.orchestrator.mark_packed(&order, &wholesaler()).await.unwrap();

    assert_eq!(outcome.claim, ClaimStep::AlreadyPresent);
    assert_eq!(outcome.state.attempts, 2);
    assert!(outcome.is_complete());
    assert_eq!(outcome.order.delivery, earlier.delivery);
    assert_eq!(h.stored_order("O15").await.delivery, earlier.delivery);

    // the earlier attempt never notified anyone, so this one does
    assert_eq!(outcome.notified(), 2);
    let notifications = NotificationRepository::new(h.dyn_store());
    for owner in ["V1", "V2"] {
        let inbox = notifications.list_for(owner).await.unwrap();
        assert_eq!(inbox[0].payload.distance_km, 12.0);
        assert_eq!(inbox[0].payload.delivery_cost, 120.0);
    }
}

#[tokio::test]
async fn test_underscored_ids_publish_separate_claims() {
    let h = Harness::new(Some(Arc::new(FixedDistance(25.0))));
    h.register_owners(&["V1"]).await;

    let mut first_wholesaler = wholesaler();
    first_wholesaler.id = "W_A".to_string();
    let mut first = confirmed_order("X");
    first.wholesaler_id = "W_A".to_string();

    let mut second_wholesaler = wholesaler();
    second_wholesaler.id = "W".to_string();
    let mut second = confirmed_order("A_X");
    second.wholesaler_id = "W".to_string();

    let a = h.orchestrator.mark_packed(&first, &first_wholesaler).await.unwrap();
    let b = h.orchestrator.mark_packed(&second, &second_wholesaler).await.unwrap();

    assert_eq!(a.claim, ClaimStep::Created);
    assert_eq!(b.claim, ClaimStep::Created);
    assert_eq!(b.notified(), 1);
    assert_eq!(h.store.count("available_deliveries").await, 2);
    assert_eq!(h.store.count("notifications/V1").await, 2);
    assert_eq!(h.stored_claim("W", "A_X").await.order_id, "A_X");
}

#[tokio::test]
async fn test_no_vehicle_owners_still_completes() {
    let h = Harness::new(Some(Arc::new(FixedDistance(10.0))));

    let outcome = h.orchestrator.mark_packed(&confirmed_order("O7"), &wholesaler()).await.unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.notified(), 0);
    assert_eq!(h.store.count("available_deliveries").await, 1);
}

#[tokio::test]
async fn test_missing_retailer_profile_uses_placeholders() {
    let h = Harness::new(None);
    let mut order = confirmed_order("O8");
    order.retailer_snapshot = None;

    let outcome = h.orchestrator.mark_packed(&order, &wholesaler()).await.unwrap();

    let snapshot = outcome.order.retailer_snapshot.unwrap();
    assert_eq!(snapshot.shop_name, "Unknown shop");
    assert_eq!(snapshot.address, "Address unavailable");
    assert_eq!(outcome.order.status, OrderStatus::Packed);
}

#[tokio::test]
async fn test_claim_failure_is_reported_then_resumed() {
    let h = Harness::new(Some(Arc::new(FixedDistance(25.0))));
    h.register_owners(&["V1", "V2"]).await;
    h.store.inject_write_fault("available_deliveries").await;

    let outcome = h.orchestrator.mark_packed(&confirmed_order("O9"), &wholesaler()).await.unwrap();

    assert!(matches!(outcome.claim, ClaimStep::Failed(_)));
    assert_eq!(outcome.broadcast, BroadcastStep::Skipped);
    assert!(!outcome.is_complete());
    assert_eq!(h.stored_order("O9").await.status, OrderStatus::Packed);
    assert_eq!(h.store.count_prefixed("notifications/").await, 0);

    let state = PackingStateRepository::new(h.dyn_store())
        .get("W1", "O9")
        .await
        .unwrap()
        .unwrap();
    assert!(state.order_updated && !state.claim_created);
    assert!(state.last_error.is_some());

    h.store.clear_faults().await;
    let resumed = h.orchestrator.resume_packing(&wholesaler(), "O9").await.unwrap();

    assert!(resumed.is_complete());
    assert_eq!(resumed.claim, ClaimStep::Created);
    assert_eq!(resumed.notified(), 2);
    assert_eq!(resumed.state.attempts, 2);
    // distance and cost were not recomputed
    assert_eq!(resumed.order.delivery, outcome.order.delivery);
    // logged once, by the first attempt
    assert_eq!(h.store.count("activity_logs/W1").await, 1);
}

#[tokio::test]
async fn test_resume_after_partial_broadcast_only_fills_gaps() {
    let h = Harness::new(Some(Arc::new(FixedDistance(25.0))));
    h.register_owners(&["V1", "V2", "V3"]).await;
    h.store.inject_write_fault("notifications/V2").await;
    h.store.inject_write_fault("dead_letters").await;

    let outcome = h.orchestrator.mark_packed(&confirmed_order("O10"), &wholesaler()).await.unwrap();
    assert!(!outcome.is_complete());
    match &outcome.broadcast {
        BroadcastStep::Sent(report) => {
            assert_eq!(report.delivered, 2);
            assert_eq!(report.failed, 1);
            assert_eq!(report.dead_lettered, 0);
        }
        other => panic!("expected a broadcast, got {:?}", other),
    }

    h.store.clear_faults().await;
    let resumed = h.orchestrator.resume_packing(&wholesaler(), "O10").await.unwrap();

    match &resumed.broadcast {
        BroadcastStep::Sent(report) => {
            assert_eq!(report.delivered, 1);
            assert_eq!(report.already_notified, 2);
        }
        other => panic!("expected a broadcast, got {:?}", other),
    }
    assert!(resumed.is_complete());
    for owner in ["V1", "V2", "V3"] {
        assert_eq!(h.store.count(&format!("notifications/{}", owner)).await, 1);
    }
}

#[actix::test]
async fn test_exhausted_notifications_reach_the_dead_letter_actor() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let dyn_store: Arc<dyn DocumentStore> = store.clone();
    let dlq = DeadLetterActor::new(DeadLetterRepository::new(dyn_store.clone()), None).start();
    let h = Harness::with_store(store, Some(Arc::new(FixedDistance(25.0))), Some(dlq));
    h.register_owners(&["V1", "V2"]).await;
    h.store.inject_write_fault("notifications/V1").await;

    let outcome = h.orchestrator.mark_packed(&confirmed_order("O11"), &wholesaler()).await.unwrap();

    // the failed owner is parked, so the broadcast is settled
    assert!(outcome.is_complete());
    let letters = DeadLetterRepository::new(dyn_store).list().await.unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].recipient_id, "V1");
    assert_eq!(letters[0].claim_id, claim_id_for("W1", "O11"));
    assert_eq!(letters[0].attempts, 2);
}

#[tokio::test]
async fn test_delivered_order_cannot_be_packed() {
    let h = Harness::new(None);
    let mut order = confirmed_order("O12");
    order.status = OrderStatus::Delivered;
    OrderRepository::new(h.dyn_store()).put(&order).await.unwrap();

    let err = h.orchestrator.mark_packed(&order, &wholesaler()).await.unwrap_err();

    assert!(matches!(err, PackingError::InvalidTransition(_)));
    assert_eq!(h.store.count("available_deliveries").await, 0);
}
