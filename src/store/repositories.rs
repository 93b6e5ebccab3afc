use std::sync::Arc;

use crate::dispatch::DeadLetter;
use crate::domain::delivery::DeliveryClaim;
use crate::domain::notification::{ActivityLogEntry, Notification};
use crate::domain::order::Order;
use crate::domain::user::{Role, UserProfile};
use crate::workflow::PackingState;

use super::{DocPath, DocumentStore, StoreError};

// ============================================================================
// Typed Repositories
// ============================================================================
//
// Collection layout:
//   orders/{wholesalerId}/{orderId}
//   users/{userId}
//   available_deliveries/{claimId}
//   notifications/{vehicleOwnerId}/{notificationId}
//   activity_logs/{wholesalerId}/{entryId}
//   packing_states/{wholesalerId}/{orderId}
//   dead_letters/{id}
//
// ============================================================================

pub const USERS: &str = "users";
pub const AVAILABLE_DELIVERIES: &str = "available_deliveries";
pub const DEAD_LETTERS: &str = "dead_letters";

fn decode_all<T: serde::de::DeserializeOwned>(
    collection: &str,
    documents: Vec<(String, serde_json::Value)>,
) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::debug!(collection = collection, key = %key, error = %e, "Skipping malformed document");
                None
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct OrderRepository {
    store: Arc<dyn DocumentStore>,
}

impl OrderRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn path(wholesaler_id: &str, order_id: &str) -> DocPath {
        DocPath::new(format!("orders/{}", wholesaler_id), order_id)
    }

    pub async fn get(&self, wholesaler_id: &str, order_id: &str) -> Result<Option<Order>, StoreError> {
        self.store.read(&Self::path(wholesaler_id, order_id)).await
    }

    /// Replaces the stored order entirely
    pub async fn put(&self, order: &Order) -> Result<(), StoreError> {
        self.store.write(&Self::path(&order.wholesaler_id, &order.id), order).await
    }

    pub async fn list_for(&self, wholesaler_id: &str) -> Result<Vec<Order>, StoreError> {
        let collection = format!("orders/{}", wholesaler_id);
        let documents = self.store.list(&collection).await?;
        Ok(decode_all(&collection, documents))
    }
}

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        self.store.read(&DocPath::new(USERS, user_id)).await
    }

    pub async fn put(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.store.write(&DocPath::new(USERS, &profile.id), profile).await
    }

    /// Point-in-time snapshot of every registered vehicle owner
    pub async fn vehicle_owners(&self) -> Result<Vec<UserProfile>, StoreError> {
        let documents = self.store.list(USERS).await?;
        Ok(decode_all::<UserProfile>(USERS, documents)
            .into_iter()
            .filter(|user| user.role == Role::VehicleOwner)
            .collect())
    }
}

#[derive(Clone)]
pub struct ClaimRepository {
    store: Arc<dyn DocumentStore>,
}

impl ClaimRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, claim_id: &str) -> Result<Option<DeliveryClaim>, StoreError> {
        self.store.read(&DocPath::new(AVAILABLE_DELIVERIES, claim_id)).await
    }

    /// Returns false when a claim with this id already exists
    pub async fn create(&self, claim: &DeliveryClaim) -> Result<bool, StoreError> {
        self.store.create(&DocPath::new(AVAILABLE_DELIVERIES, &claim.id), claim).await
    }

    pub async fn list(&self) -> Result<Vec<DeliveryClaim>, StoreError> {
        let documents = self.store.list(AVAILABLE_DELIVERIES).await?;
        Ok(decode_all(AVAILABLE_DELIVERIES, documents))
    }

    pub async fn available_for_order(&self, order_id: &str) -> Result<Vec<DeliveryClaim>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|claim| claim.order_id == order_id && claim.is_available())
            .collect())
    }
}

#[derive(Clone)]
pub struct NotificationRepository {
    store: Arc<dyn DocumentStore>,
}

impl NotificationRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn collection(recipient_id: &str) -> String {
        format!("notifications/{}", recipient_id)
    }

    /// Returns false when this recipient already holds this notification
    pub async fn create(&self, notification: &Notification) -> Result<bool, StoreError> {
        let path = DocPath::new(Self::collection(&notification.recipient_id), &notification.id);
        self.store.create(&path, notification).await
    }

    pub async fn list_for(&self, recipient_id: &str) -> Result<Vec<Notification>, StoreError> {
        let collection = Self::collection(recipient_id);
        let documents = self.store.list(&collection).await?;
        Ok(decode_all(&collection, documents))
    }
}

#[derive(Clone)]
pub struct ActivityLogRepository {
    store: Arc<dyn DocumentStore>,
}

impl ActivityLogRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Returns false when an entry with this id is already logged
    pub async fn append(&self, wholesaler_id: &str, entry: &ActivityLogEntry) -> Result<bool, StoreError> {
        let path = DocPath::new(format!("activity_logs/{}", wholesaler_id), &entry.id);
        self.store.create(&path, entry).await
    }

    pub async fn list_for(&self, wholesaler_id: &str) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let collection = format!("activity_logs/{}", wholesaler_id);
        let documents = self.store.list(&collection).await?;
        Ok(decode_all(&collection, documents))
    }
}

#[derive(Clone)]
pub struct PackingStateRepository {
    store: Arc<dyn DocumentStore>,
}

impl PackingStateRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn path(wholesaler_id: &str, order_id: &str) -> DocPath {
        DocPath::new(format!("packing_states/{}", wholesaler_id), order_id)
    }

    pub async fn get(&self, wholesaler_id: &str, order_id: &str) -> Result<Option<PackingState>, StoreError> {
        self.store.read(&Self::path(wholesaler_id, order_id)).await
    }

    /// Returns false when a state for this order already exists
    pub async fn create(&self, state: &PackingState) -> Result<bool, StoreError> {
        self.store
            .create(&Self::path(&state.wholesaler_id, &state.order_id), state)
            .await
    }

    pub async fn put(&self, state: &PackingState) -> Result<(), StoreError> {
        self.store
            .write(&Self::path(&state.wholesaler_id, &state.order_id), state)
            .await
    }
}

#[derive(Clone)]
pub struct DeadLetterRepository {
    store: Arc<dyn DocumentStore>,
}

impl DeadLetterRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn put(&self, letter: &DeadLetter) -> Result<(), StoreError> {
        self.store.write(&DocPath::new(DEAD_LETTERS, &letter.id), letter).await
    }

    pub async fn list(&self) -> Result<Vec<DeadLetter>, StoreError> {
        let documents = self.store.list(DEAD_LETTERS).await?;
        Ok(decode_all(DEAD_LETTERS, documents))
    }
}
