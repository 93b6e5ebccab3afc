use async_trait::async_trait;
use chrono::Utc;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::value::{CqlValue, Row};
use serde_json::Value;
use std::sync::Arc;

use super::{DocPath, DocumentStore, StoreError};

// ============================================================================
// ScyllaDB Document Store
// ============================================================================
//
// All collections share one table partitioned by collection path, so listing
// a collection (e.g. every user, or one wholesaler's orders) is a single
// partition read. Bodies are stored as JSON text.
//
// create_if_absent uses a lightweight transaction (INSERT ... IF NOT EXISTS),
// which is what makes claim creation safe against racing packers.
//
// ============================================================================

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS documents (
    collection text,
    doc_key text,
    body text,
    updated_at timestamp,
    PRIMARY KEY ((collection), doc_key)
)";

pub struct ScyllaDocumentStore {
    session: Arc<Session>,
}

impl ScyllaDocumentStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Connect, create the keyspace and table if needed
    pub async fn connect(node: &str, keyspace: &str) -> anyhow::Result<Self> {
        tracing::info!(node = node, keyspace = keyspace, "Connecting to ScyllaDB");

        let session: Session = SessionBuilder::new().known_node(node).build().await?;

        session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                    keyspace
                ),
                &[],
            )
            .await?;
        session.use_keyspace(keyspace, false).await?;
        session.query_unpaged(CREATE_TABLE, &[]).await?;

        Ok(Self::new(Arc::new(session)))
    }
}

fn unavailable(err: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn parse_body(path: &str, body: &str) -> Result<Value, StoreError> {
    serde_json::from_str(body).map_err(|source| StoreError::Decode {
        path: path.to_string(),
        source,
    })
}

#[async_trait]
impl DocumentStore for ScyllaDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        path.validate()?;

        let result = self
            .session
            .query_unpaged(
                "SELECT body FROM documents WHERE collection = ? AND doc_key = ?",
                (path.collection(), path.key()),
            )
            .await
            .map_err(unavailable)?;

        let rows = result.into_rows_result().map_err(unavailable)?;
        match rows.maybe_first_row::<(String,)>().map_err(unavailable)? {
            Some((body,)) => parse_body(&path.to_string(), &body).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, path: &DocPath, value: Value) -> Result<(), StoreError> {
        path.validate()?;
        let body = value.to_string();

        self.session
            .query_unpaged(
                "INSERT INTO documents (collection, doc_key, body, updated_at) VALUES (?, ?, ?, ?)",
                (path.collection(), path.key(), body, Utc::now()),
            )
            .await
            .map_err(unavailable)?;

        tracing::debug!(path = %path, "Document written");
        Ok(())
    }

    async fn create_if_absent(&self, path: &DocPath, value: Value) -> Result<bool, StoreError> {
        path.validate()?;
        let body = value.to_string();

        let result = self
            .session
            .query_unpaged(
                "INSERT INTO documents (collection, doc_key, body, updated_at) \
                 VALUES (?, ?, ?, ?) IF NOT EXISTS",
                (path.collection(), path.key(), body, Utc::now()),
            )
            .await
            .map_err(unavailable)?;

        // First column of an LWT result is [applied]; the existing row's
        // columns follow it when the insert was not applied.
        let rows = result.into_rows_result().map_err(unavailable)?;
        let applied = match rows.maybe_first_row::<Row>().map_err(unavailable)? {
            Some(row) => matches!(row.columns.first(), Some(Some(CqlValue::Boolean(true)))),
            None => false,
        };

        tracing::debug!(path = %path, applied = applied, "Conditional document create");
        Ok(applied)
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT doc_key, body FROM documents WHERE collection = ?",
                (collection,),
            )
            .await
            .map_err(unavailable)?;

        let rows_result = result.into_rows_result().map_err(unavailable)?;
        let rows = rows_result.rows::<(String, String)>().map_err(unavailable)?;

        let mut documents = Vec::new();
        for row in rows {
            let (key, body) = row.map_err(unavailable)?;
            let value = parse_body(&format!("{}/{}", collection, key), &body)?;
            documents.push((key, value));
        }

        Ok(documents)
    }
}
