// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (OrderItem, OrderStatus, PaymentStatus, ContactSnapshot)
// - Errors (OrderError)
// - Order record with its status transitions
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod record;

pub use value_objects::*;
pub use errors::*;
pub use record::*;
