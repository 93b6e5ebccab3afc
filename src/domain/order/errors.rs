use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Order is already packed")]
    AlreadyPacked,

    #[error("Cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order in status {0} must carry delivery metadata")]
    MissingDeliveryMetadata(OrderStatus),

    #[error("Order in status {0} must not carry delivery metadata yet")]
    UnexpectedDeliveryMetadata(OrderStatus),

    #[error("Delivery figures must be non-negative (distance {distance_km}, cost {cost})")]
    NegativeDeliveryFigures { distance_km: f64, cost: f64 },

    #[error("Order items cannot be empty")]
    EmptyItems,
}
