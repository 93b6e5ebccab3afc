use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{DocPath, DocumentStore, StoreError};

// ============================================================================
// In-Memory Document Store
// ============================================================================
//
// Backs the demo binary and the test suite. Faults can be injected per
// collection prefix to reproduce an unreachable store for one family of
// documents while the rest keeps working.
//
// ============================================================================

#[derive(Debug, Clone)]
struct Fault {
    prefix: String,
    /// `None` fails forever, `Some(n)` fails the next n operations
    remaining: Option<u32>,
}

#[derive(Default)]
struct MemoryState {
    collections: BTreeMap<String, BTreeMap<String, Value>>,
    write_faults: Vec<Fault>,
    read_faults: Vec<Fault>,
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    state: RwLock<MemoryState>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write under `prefix` fails until faults are cleared
    pub async fn inject_write_fault(&self, prefix: impl Into<String>) {
        self.state.write().await.write_faults.push(Fault {
            prefix: prefix.into(),
            remaining: None,
        });
    }

    /// The next `times` writes under `prefix` fail, then writes succeed again
    pub async fn inject_transient_write_fault(&self, prefix: impl Into<String>, times: u32) {
        self.state.write().await.write_faults.push(Fault {
            prefix: prefix.into(),
            remaining: Some(times),
        });
    }

    pub async fn inject_read_fault(&self, prefix: impl Into<String>) {
        self.state.write().await.read_faults.push(Fault {
            prefix: prefix.into(),
            remaining: None,
        });
    }

    pub async fn clear_faults(&self) {
        let mut state = self.state.write().await;
        state.write_faults.clear();
        state.read_faults.clear();
    }

    /// Number of documents directly under `collection`
    pub async fn count(&self, collection: &str) -> usize {
        self.state
            .read()
            .await
            .collections
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub async fn count_prefixed(&self, prefix: &str) -> usize {
        self.state
            .read()
            .await
            .collections
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(_, docs)| docs.len())
            .sum()
    }
}

fn trip(faults: &mut Vec<Fault>, collection: &str, op: &str) -> Result<(), StoreError> {
    let Some(index) = faults.iter().position(|f| collection.starts_with(&f.prefix)) else {
        return Ok(());
    };

    let exhausted = match faults[index].remaining.as_mut() {
        Some(remaining) => {
            *remaining = remaining.saturating_sub(1);
            *remaining == 0
        }
        None => false,
    };
    if exhausted {
        faults.remove(index);
    }

    Err(StoreError::Unavailable(format!("injected {} fault on {}", op, collection)))
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        path.validate()?;
        let mut state = self.state.write().await;
        trip(&mut state.read_faults, path.collection(), "read")?;

        Ok(state
            .collections
            .get(path.collection())
            .and_then(|docs| docs.get(path.key()))
            .cloned())
    }

    async fn set(&self, path: &DocPath, value: Value) -> Result<(), StoreError> {
        path.validate()?;
        let mut state = self.state.write().await;
        trip(&mut state.write_faults, path.collection(), "write")?;

        state
            .collections
            .entry(path.collection().to_string())
            .or_default()
            .insert(path.key().to_string(), value);
        Ok(())
    }

    async fn create_if_absent(&self, path: &DocPath, value: Value) -> Result<bool, StoreError> {
        path.validate()?;
        let mut state = self.state.write().await;
        trip(&mut state.write_faults, path.collection(), "write")?;

        let docs = state.collections.entry(path.collection().to_string()).or_default();
        if docs.contains_key(path.key()) {
            return Ok(false);
        }
        docs.insert(path.key().to_string(), value);
        Ok(true)
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let mut state = self.state.write().await;
        trip(&mut state.read_faults, collection, "read")?;

        Ok(state
            .collections
            .get(collection)
            .map(|docs| docs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}
