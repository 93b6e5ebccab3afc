use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use super::errors::PackingError;
use super::outcome::{BroadcastStep, ClaimStep, PackingOutcome};
use super::state::PackingState;
use crate::config::{ContactPlaceholders, DispatchConfig};
use crate::dispatch::{ClaimPublication, DispatchService};
use crate::domain::delivery::DeliveryOpportunity;
use crate::domain::order::{ContactSnapshot, DeliveryMetadata, Order, OrderError, OrderStatus};
use crate::domain::user::ActingWholesaler;
use crate::estimator::{EstimateSource, Estimator};
use crate::metrics::Metrics;
use crate::store::{ClaimRepository, DocumentStore, OrderRepository, PackingStateRepository, UserDirectory};

// ============================================================================
// Packing Orchestrator
// ============================================================================
//
// mark_packed:
//   validate -> (already packed? resume) -> take the packing lease ->
//   resolve retailer contact -> estimate -> overwrite order as Packed ->
//   publish claim -> broadcast -> activity log -> release the lease
//
// The lease is the PackingState document, created if absent. While one
// attempt holds it other calls get `PackingError::InProgress` instead of
// estimating and writing the order a second time. An expired lease is
// taken over.
//
// Only the order write is fatal. Every later step records its result in the
// PackingOutcome and the persisted PackingState; resume_packing picks up the
// steps that did not land. Once a claim exists its figures win: an order
// that disagrees with it is rewritten to match.
//
// ============================================================================

pub struct PackingOrchestrator {
    orders: OrderRepository,
    users: UserDirectory,
    states: PackingStateRepository,
    claims: ClaimRepository,
    estimator: Arc<Estimator>,
    dispatch: DispatchService,
    placeholders: ContactPlaceholders,
    lease: Duration,
    metrics: Option<Arc<Metrics>>,
}

/// Result of trying to take the lease for a fresh packing
enum Lease {
    Acquired(PackingState),
    /// An earlier attempt already wrote the order
    AlreadyPacked,
}

impl PackingOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        estimator: Arc<Estimator>,
        dispatch: DispatchService,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            orders: OrderRepository::new(store.clone()),
            users: UserDirectory::new(store.clone()),
            states: PackingStateRepository::new(store.clone()),
            claims: ClaimRepository::new(store),
            estimator,
            dispatch,
            placeholders: config.placeholders.clone(),
            lease: config.packing_lease,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Mark `order` as packed on behalf of `wholesaler` and dispatch it
    pub async fn mark_packed(
        &self,
        order: &Order,
        wholesaler: &ActingWholesaler,
    ) -> Result<PackingOutcome, PackingError> {
        let _timer = self.metrics.as_ref().map(|m| m.packing_duration.start_timer());

        let result = self.pack(order, wholesaler).await;
        self.count(&result);
        result
    }

    /// Rerun the outstanding steps of an order that is already Packed
    pub async fn resume_packing(
        &self,
        wholesaler: &ActingWholesaler,
        order_id: &str,
    ) -> Result<PackingOutcome, PackingError> {
        let result = self.resume(wholesaler, order_id).await;
        self.count(&result);
        result
    }

    async fn pack(&self, order: &Order, wholesaler: &ActingWholesaler) -> Result<PackingOutcome, PackingError> {
        validate(order, wholesaler)?;

        let current = match self.orders.get(&wholesaler.id, &order.id).await {
            Ok(Some(persisted)) => persisted,
            Ok(None) => order.clone(),
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Could not read stored order, using caller's copy");
                order.clone()
            }
        };

        match current.status {
            OrderStatus::Pending | OrderStatus::Confirmed => {}
            OrderStatus::Packed => {
                tracing::info!(order_id = %current.id, "Order already packed, resuming outstanding steps");
                return self.resume_order(current, wholesaler).await;
            }
            from => {
                return Err(OrderError::InvalidStatusTransition {
                    from,
                    to: OrderStatus::Packed,
                }
                .into())
            }
        }

        let mut state = match self.acquire(&current).await? {
            Lease::Acquired(state) => state,
            Lease::AlreadyPacked => {
                tracing::info!(order_id = %current.id, "Order written by an earlier attempt, resuming");
                return self.resume(wholesaler, &current.id).await;
            }
        };

        let snapshot = self.resolve_retailer_contact(&current).await;
        let estimate = self.estimator.estimate(&wholesaler.address, &snapshot.address).await;

        let packed = match current.packed(
            snapshot,
            DeliveryMetadata {
                distance_km: estimate.distance_km,
                delivery_cost: estimate.cost,
                duration_label: estimate.duration_label.clone(),
                packed_at: Utc::now(),
            },
        ) {
            Ok(packed) => packed,
            Err(e) => {
                state.record_error(&e);
                state.finish_attempt();
                self.save_state(&state).await;
                return Err(e.into());
            }
        };

        if let Err(source) = self.orders.put(&packed).await {
            tracing::error!(order_id = %packed.id, error = %source, "Failed to persist packed order");
            state.record_error(&source);
            state.finish_attempt();
            self.save_state(&state).await;
            return Err(PackingError::Persistence {
                order_id: packed.id.clone(),
                source,
            });
        }
        state.order_updated = true;
        self.save_state(&state).await;

        tracing::info!(
            order_id = %packed.id,
            wholesaler_id = %wholesaler.id,
            distance_km = estimate.distance_km,
            delivery_cost = estimate.cost,
            source = estimate.source.as_str(),
            "Order packed"
        );

        Ok(self
            .continue_from(packed, wholesaler, state, Some(estimate.source), false)
            .await)
    }

    /// Take the lease for a fresh packing of `order`
    async fn acquire(&self, order: &Order) -> Result<Lease, PackingError> {
        let mut fresh = PackingState::new(&order.wholesaler_id, &order.id);
        fresh.begin_attempt();

        match self.states.create(&fresh).await {
            Ok(true) => return Ok(Lease::Acquired(fresh)),
            Ok(false) => {}
            Err(e) => {
                // The claim's conditional create still keeps racing calls apart
                tracing::warn!(order_id = %order.id, error = %e, "Packing lease not recorded, continuing");
                return Ok(Lease::Acquired(fresh));
            }
        }

        let existing = match self.states.get(&order.wholesaler_id, &order.id).await {
            Ok(Some(existing)) => existing,
            Ok(None) => {
                self.save_state(&fresh).await;
                return Ok(Lease::Acquired(fresh));
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Packing state unreadable, continuing");
                return Ok(Lease::Acquired(fresh));
            }
        };

        if existing.is_in_flight(self.lease) {
            tracing::info!(order_id = %order.id, "Order is being packed by another call");
            return Err(PackingError::InProgress {
                order_id: order.id.clone(),
            });
        }
        if existing.order_updated {
            return Ok(Lease::AlreadyPacked);
        }

        // An earlier attempt stopped before the order write; take over
        let mut state = existing;
        state.begin_attempt();
        self.save_state(&state).await;
        Ok(Lease::Acquired(state))
    }

    async fn resume(&self, wholesaler: &ActingWholesaler, order_id: &str) -> Result<PackingOutcome, PackingError> {
        if wholesaler.id.trim().is_empty() {
            return Err(PackingError::MissingIdentifier("wholesaler id"));
        }
        if order_id.trim().is_empty() {
            return Err(PackingError::MissingIdentifier("order id"));
        }

        let order = self
            .orders
            .get(&wholesaler.id, order_id)
            .await
            .map_err(|source| PackingError::Persistence {
                order_id: order_id.to_string(),
                source,
            })?
            .ok_or_else(|| PackingError::OrderNotFound(order_id.to_string()))?;

        if order.status != OrderStatus::Packed {
            return Err(PackingError::NotPacked {
                order_id: order.id,
                status: order.status,
            });
        }

        self.resume_order(order, wholesaler).await
    }

    async fn resume_order(&self, order: Order, wholesaler: &ActingWholesaler) -> Result<PackingOutcome, PackingError> {
        let mut state = self.load_state(&order).await;
        if state.is_in_flight(self.lease) {
            return Err(PackingError::InProgress { order_id: order.id });
        }

        state.begin_attempt();
        self.save_state(&state).await;
        Ok(self.continue_from(order, wholesaler, state, None, true).await)
    }

    /// Steps after the order write. Never fails; each result lands in the
    /// outcome and the saved state, and the lease is released at the end.
    async fn continue_from(
        &self,
        mut order: Order,
        wholesaler: &ActingWholesaler,
        mut state: PackingState,
        estimate_source: Option<EstimateSource>,
        resumed: bool,
    ) -> PackingOutcome {
        let mut opportunity = match DeliveryOpportunity::from_packed_order(&order, wholesaler) {
            Ok(opportunity) => opportunity,
            Err(e) => {
                // A Packed order without delivery metadata; nothing can be dispatched
                tracing::error!(order_id = %order.id, error = %e, "Packed order is missing delivery details");
                state.record_error(&e);
                state.finish_attempt();
                self.save_state(&state).await;
                return PackingOutcome {
                    order,
                    resumed,
                    estimate_source,
                    claim: ClaimStep::Failed(e.to_string()),
                    broadcast: BroadcastStep::Skipped,
                    activity_logged: state.activity_logged,
                    state,
                };
            }
        };

        // Claim, and whether this call still owes the broadcast
        let (claim, should_broadcast) = if state.claim_created {
            (ClaimStep::AlreadyPresent, !state.notifications_sent)
        } else {
            match self.dispatch.publish_claim(&opportunity).await {
                Ok(publication) => {
                    state.claim_created = true;
                    if publication != ClaimPublication::Created {
                        self.align_with_claim(&mut order, &mut opportunity, &mut state).await;
                    }
                    let should_broadcast = match publication {
                        ClaimPublication::Created | ClaimPublication::AlreadyAvailable => !state.notifications_sent,
                        ClaimPublication::AlreadyClaimed => {
                            state.notifications_sent = true;
                            false
                        }
                    };
                    (ClaimStep::from(publication), should_broadcast)
                }
                Err(e) => {
                    tracing::error!(order_id = %order.id, error = %e, "Order packed but claim not published");
                    state.record_error(&e);
                    (ClaimStep::Failed(e.to_string()), false)
                }
            }
        };
        self.save_state(&state).await;

        let broadcast = if should_broadcast {
            let report = self.dispatch.broadcast(&opportunity).await;
            state.notifications_sent = report.is_settled();
            if !state.notifications_sent {
                state.record_error("broadcast incomplete");
            }
            BroadcastStep::Sent(report)
        } else if state.notifications_sent {
            BroadcastStep::AlreadySent
        } else {
            BroadcastStep::Skipped
        };

        if !state.activity_logged {
            let details = format!(
                "Packed order {} for retailer {}: {:.1} km, delivery cost {:.2}",
                order.id, order.retailer_id, opportunity.distance_km, opportunity.delivery_cost
            );
            match self
                .dispatch
                .log_activity(wholesaler, "order_packed", &order.id, details)
                .await
            {
                Ok(_) => state.activity_logged = true,
                Err(e) => {
                    tracing::warn!(order_id = %order.id, error = %e, "Activity log entry not written");
                    state.record_error(&e);
                }
            }
        }

        state.finish_attempt();
        self.save_state(&state).await;

        if state.is_complete() {
            tracing::info!(order_id = %order.id, attempts = state.attempts, "Packing complete");
        } else {
            tracing::warn!(
                order_id = %order.id,
                pending = ?state.pending_steps(),
                "Packing incomplete, resume later"
            );
        }

        PackingOutcome {
            order,
            resumed,
            estimate_source,
            claim,
            broadcast,
            activity_logged: state.activity_logged,
            state,
        }
    }

    /// Make the order and the opportunity carry the figures of the claim an
    /// earlier attempt published
    async fn align_with_claim(&self, order: &mut Order, opportunity: &mut DeliveryOpportunity, state: &mut PackingState) {
        let published = match self.claims.get(&opportunity.claim_id).await {
            Ok(Some(claim)) => claim.delivery_metadata(),
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(claim_id = %opportunity.claim_id, error = %e, "Could not read published claim");
                state.claim_created = false;
                state.record_error(&e);
                return;
            }
        };

        opportunity.distance_km = published.distance_km;
        opportunity.delivery_cost = published.delivery_cost;
        opportunity.duration_label = published.duration_label.clone();
        opportunity.packed_at = published.packed_at;

        if order.delivery.as_ref() == Some(&published) {
            return;
        }

        tracing::info!(
            order_id = %order.id,
            distance_km = published.distance_km,
            delivery_cost = published.delivery_cost,
            "Order disagrees with its published claim, rewriting"
        );
        let mut aligned = order.clone();
        aligned.delivery = Some(published);
        match self.orders.put(&aligned).await {
            Ok(()) => *order = aligned,
            Err(e) => {
                // Publishing again on resume repeats the alignment
                tracing::error!(order_id = %order.id, error = %e, "Order not aligned with its claim");
                state.claim_created = false;
                state.record_error(&e);
            }
        }
    }

    /// Snapshot on the order when it has an address, else the retailer's
    /// profile, else placeholders
    async fn resolve_retailer_contact(&self, order: &Order) -> ContactSnapshot {
        if let Some(snapshot) = order.retailer_snapshot.as_ref().filter(|s| s.has_address()) {
            return ContactSnapshot {
                captured_at: Utc::now(),
                ..snapshot.clone()
            };
        }

        let placeholders = &self.placeholders;
        let profile = match self.users.get(&order.retailer_id).await {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                tracing::warn!(retailer_id = %order.retailer_id, "Retailer profile not found, using placeholders");
                None
            }
            Err(e) => {
                tracing::warn!(retailer_id = %order.retailer_id, error = %e, "Retailer profile fetch failed, using placeholders");
                None
            }
        };

        let field = |value: Option<String>, fallback: &str| {
            value
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };

        match profile {
            Some(profile) => ContactSnapshot {
                name: field(Some(profile.name), placeholders.name.as_str()),
                shop_name: field(profile.shop_name, placeholders.shop_name.as_str()),
                address: field(profile.address, placeholders.address.as_str()),
                phone: field(profile.phone, placeholders.phone.as_str()),
                captured_at: Utc::now(),
            },
            None => ContactSnapshot {
                name: placeholders.name.clone(),
                shop_name: placeholders.shop_name.clone(),
                address: placeholders.address.clone(),
                phone: placeholders.phone.clone(),
                captured_at: Utc::now(),
            },
        }
    }

    async fn load_state(&self, order: &Order) -> PackingState {
        match self.states.get(&order.wholesaler_id, &order.id).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                // Packed without a saved state: only the order write is known
                let mut state = PackingState::new(&order.wholesaler_id, &order.id);
                state.order_updated = true;
                state
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Packing state unreadable, rerunning every step");
                let mut state = PackingState::new(&order.wholesaler_id, &order.id);
                state.order_updated = true;
                state
            }
        }
    }

    async fn save_state(&self, state: &PackingState) {
        if let Err(e) = self.states.put(state).await {
            tracing::warn!(order_id = %state.order_id, error = %e, "Packing state not saved");
        }
    }

    fn count(&self, result: &Result<PackingOutcome, PackingError>) {
        let Some(metrics) = &self.metrics else { return };
        let outcome = match result {
            Ok(outcome) if outcome.is_complete() => "complete",
            Ok(_) => "incomplete",
            Err(e) => e.kind(),
        };
        metrics.packing_requests.with_label_values(&[outcome]).inc();
    }
}

fn validate(order: &Order, wholesaler: &ActingWholesaler) -> Result<(), PackingError> {
    if order.id.trim().is_empty() {
        return Err(PackingError::MissingIdentifier("order id"));
    }
    if wholesaler.id.trim().is_empty() {
        return Err(PackingError::MissingIdentifier("wholesaler id"));
    }
    if wholesaler.address.trim().is_empty() {
        return Err(PackingError::MissingAddress(wholesaler.id.clone()));
    }
    if order.wholesaler_id != wholesaler.id {
        return Err(PackingError::WholesalerMismatch {
            order_id: order.id.clone(),
            owner: order.wholesaler_id.clone(),
            acting: wholesaler.id.clone(),
        });
    }
    Ok(())
}
