use thiserror::Error;

use crate::domain::order::{OrderError, OrderStatus};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PackingError {
    #[error("missing {0}")]
    MissingIdentifier(&'static str),

    #[error("wholesaler {0} has no address to pick up from")]
    MissingAddress(String),

    #[error("order {order_id} belongs to wholesaler {owner}, not {acting}")]
    WholesalerMismatch {
        order_id: String,
        owner: String,
        acting: String,
    },

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("order {order_id} is being packed by another call")]
    InProgress { order_id: String },

    #[error("order {order_id} is {status}, not packed")]
    NotPacked { order_id: String, status: OrderStatus },

    #[error(transparent)]
    InvalidTransition(#[from] OrderError),

    #[error("failed to persist order {order_id}: {source}")]
    Persistence {
        order_id: String,
        #[source]
        source: StoreError,
    },
}

impl PackingError {
    /// Metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            PackingError::MissingIdentifier(_)
            | PackingError::MissingAddress(_)
            | PackingError::WholesalerMismatch { .. } => "invalid",
            PackingError::OrderNotFound(_) => "not_found",
            PackingError::InProgress { .. } => "in_progress",
            PackingError::NotPacked { .. } | PackingError::InvalidTransition(_) => "rejected",
            PackingError::Persistence { .. } => "failed",
        }
    }
}
