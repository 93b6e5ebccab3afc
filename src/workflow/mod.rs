mod errors;
mod outcome;
mod packing;
mod state;

pub use errors::PackingError;
pub use outcome::{BroadcastStep, ClaimStep, PackingOutcome};
pub use packing::PackingOrchestrator;
pub use state::PackingState;
