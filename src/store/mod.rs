// ============================================================================
// Document Store
// ============================================================================
//
// Path-addressed JSON documents. A path is a collection (itself a
// slash-separated path such as `orders/W1`) plus a key. There are no
// transactions: `set` overwrites, and `create_if_absent` is the only
// conditional write. Implementations:
// - memory  - in-process map, with injectable faults
// - scylla_store - one `documents` table, LWT for create_if_absent
//
// Typed access for each collection lives in `repositories`.
//
// ============================================================================

mod memory;
mod repositories;
mod scylla_store;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::utils::IsTransient;

pub use memory::InMemoryDocumentStore;
pub use repositories::{
    ActivityLogRepository, ClaimRepository, DeadLetterRepository, NotificationRepository,
    OrderRepository, PackingStateRepository, UserDirectory,
};
pub use scylla_store::ScyllaDocumentStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    collection: String,
    key: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Keys are single path segments
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.key.is_empty() || self.key.contains('/') || self.collection.is_empty() {
            return Err(StoreError::InvalidPath(self.to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid document path: {0}")]
    InvalidPath(String),

    #[error("failed to encode document for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed document at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>, StoreError>;

    /// Full overwrite of whatever is at `path`
    async fn set(&self, path: &DocPath, value: Value) -> Result<(), StoreError>;

    /// Write only if nothing exists at `path`; returns whether it wrote
    async fn create_if_absent(&self, path: &DocPath, value: Value) -> Result<bool, StoreError>;

    /// Every document directly under `collection`, as (key, value)
    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError>;
}

impl dyn DocumentStore {
    pub async fn read<T: DeserializeOwned>(&self, path: &DocPath) -> Result<Option<T>, StoreError> {
        match self.get(path).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| StoreError::Decode {
                    path: path.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub async fn write<T: Serialize + Sync>(&self, path: &DocPath, value: &T) -> Result<(), StoreError> {
        let json = encode(path, value)?;
        self.set(path, json).await
    }

    pub async fn create<T: Serialize + Sync>(&self, path: &DocPath, value: &T) -> Result<bool, StoreError> {
        let json = encode(path, value)?;
        self.create_if_absent(path, json).await
    }
}

fn encode<T: Serialize>(path: &DocPath, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Encode {
        path: path.to_string(),
        source,
    })
}
