// ============================================================================
// Delivery Domain - claimable jobs derived from packed orders
// ============================================================================

pub mod claim;
pub mod opportunity;

pub use claim::*;
pub use opportunity::*;
