use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which packing sub-steps have landed for one order.
///
/// Written after every step so that a later `resume_packing` reruns only
/// what is still missing. `in_flight_since` is the lease of the attempt that
/// is currently working on the order; other callers back off until it is
/// cleared or has expired.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackingState {
    pub wholesaler_id: String,
    pub order_id: String,
    pub order_updated: bool,
    pub claim_created: bool,
    pub notifications_sent: bool,
    pub activity_logged: bool,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_flight_since: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PackingState {
    pub fn new(wholesaler_id: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            wholesaler_id: wholesaler_id.into(),
            order_id: order_id.into(),
            order_updated: false,
            claim_created: false,
            notifications_sent: false,
            activity_logged: false,
            attempts: 0,
            last_error: None,
            in_flight_since: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.order_updated && self.claim_created && self.notifications_sent && self.activity_logged
    }

    /// Another attempt holds an unexpired lease
    pub fn is_in_flight(&self, lease: Duration) -> bool {
        match self.in_flight_since {
            // A start time in the future (clock skew) still counts as held
            Some(since) => (Utc::now() - since).to_std().map_or(true, |elapsed| elapsed < lease),
            None => false,
        }
    }

    pub(crate) fn begin_attempt(&mut self) {
        let now = Utc::now();
        self.attempts += 1;
        self.last_error = None;
        self.in_flight_since = Some(now);
        self.updated_at = now;
    }

    pub(crate) fn finish_attempt(&mut self) {
        self.in_flight_since = None;
        self.updated_at = Utc::now();
    }

    pub(crate) fn record_error(&mut self, error: impl ToString) {
        self.last_error = Some(error.to_string());
        self.updated_at = Utc::now();
    }

    /// Names of the sub-steps still outstanding
    pub fn pending_steps(&self) -> Vec<&'static str> {
        [
            ("order", self.order_updated),
            ("claim", self.claim_created),
            ("notifications", self.notifications_sent),
            ("activity", self.activity_logged),
        ]
        .into_iter()
        .filter(|(_, done)| !done)
        .map(|(name, _)| name)
        .collect()
    }
}
