// ============================================================================
// Domain Layer
// ============================================================================
//
// Plain records and their business rules. Nothing in here touches the
// document store or the network:
// - order/        - Order record, status machine, contact snapshot
// - delivery/     - DeliveryClaim and the DeliveryOpportunity it is built from
// - notification/ - vehicle owner notifications and activity log entries
// - user          - user profiles and the acting wholesaler
// - ids           - deterministic document ids
//
// ============================================================================

pub mod delivery;
pub mod ids;
pub mod notification;
pub mod order;
pub mod user;
