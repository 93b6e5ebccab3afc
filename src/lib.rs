//! Order packing and delivery dispatch for a wholesaler/retailer marketplace.
//!
//! A wholesaler marks an order packed; the crate prices the delivery,
//! publishes a claimable delivery job and notifies every vehicle owner.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod estimator;
pub mod messaging;
pub mod metrics;
pub mod store;
pub mod utils;
pub mod workflow;

pub use config::DispatchConfig;
pub use workflow::{PackingError, PackingOrchestrator, PackingOutcome};
