use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::compound_id;
use crate::domain::user::Role;

/// Audit entry under the acting wholesaler's namespace. At most one entry
/// exists per action and subject, so a repeated step never logs twice.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: String,
    pub subject_id: String,
    pub actor_id: String,
    pub actor_role: Role,
    pub actor_name: String,
    pub action: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn new(
        actor_id: impl Into<String>,
        actor_role: Role,
        actor_name: impl Into<String>,
        action: impl Into<String>,
        subject_id: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        let action = action.into();
        let subject_id = subject_id.into();
        Self {
            id: compound_id(&action, &[&subject_id]),
            subject_id,
            actor_id: actor_id.into(),
            actor_role,
            actor_name: actor_name.into(),
            action,
            details: details.into(),
            timestamp: Utc::now(),
        }
    }
}
