use crate::dispatch::{BroadcastReport, ClaimPublication};
use crate::domain::order::Order;
use crate::estimator::EstimateSource;

use super::state::PackingState;

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimStep {
    Created,
    /// Written by an earlier attempt
    AlreadyPresent,
    /// A vehicle owner has already taken the job
    AlreadyClaimed,
    Failed(String),
}

impl From<ClaimPublication> for ClaimStep {
    fn from(publication: ClaimPublication) -> Self {
        match publication {
            ClaimPublication::Created => ClaimStep::Created,
            ClaimPublication::AlreadyAvailable => ClaimStep::AlreadyPresent,
            ClaimPublication::AlreadyClaimed => ClaimStep::AlreadyClaimed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastStep {
    Sent(BroadcastReport),
    /// An earlier attempt finished notifying
    AlreadySent,
    /// No broadcast from this call: no claim, or the claim is taken
    Skipped,
}

/// What one `mark_packed` / `resume_packing` call achieved, step by step
#[derive(Debug, Clone)]
pub struct PackingOutcome {
    pub order: Order,
    pub resumed: bool,
    /// `None` when the order was already packed and nothing was re-estimated
    pub estimate_source: Option<EstimateSource>,
    pub claim: ClaimStep,
    pub broadcast: BroadcastStep,
    pub activity_logged: bool,
    pub state: PackingState,
}

impl PackingOutcome {
    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    pub fn notified(&self) -> usize {
        match &self.broadcast {
            BroadcastStep::Sent(report) => report.delivered,
            _ => 0,
        }
    }
}
