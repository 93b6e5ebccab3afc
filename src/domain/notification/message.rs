use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::delivery::DeliveryOpportunity;
use crate::domain::ids::compound_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DeliveryOpportunity,
}

/// The job details embedded in a vehicle owner's notification
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityPayload {
    pub claim_id: String,
    pub order_id: String,
    pub pickup_name: String,
    pub pickup_address: String,
    pub pickup_phone: String,
    pub delivery_name: String,
    pub delivery_address: String,
    pub delivery_phone: String,
    pub distance_km: f64,
    pub delivery_cost: f64,
    pub order_amount: f64,
    pub estimated_hours: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub payload: OpportunityPayload,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    /// Build the notification for one vehicle owner.
    ///
    /// The id is derived from the claim and the recipient, so rebroadcasting
    /// the same opportunity can never stack a second copy in someone's inbox.
    pub fn delivery_opportunity(
        recipient_id: &str,
        opportunity: &DeliveryOpportunity,
        assumed_speed_kmh: f64,
    ) -> Self {
        let estimated_hours = estimated_hours(opportunity.distance_km, assumed_speed_kmh);

        Self {
            id: notification_id_for(&opportunity.claim_id, recipient_id),
            recipient_id: recipient_id.to_string(),
            kind: NotificationKind::DeliveryOpportunity,
            title: "New delivery available".to_string(),
            message: format!(
                "Pickup from {} ({}) to {} ({}): {:.1} km, earn {:.0}",
                opportunity.pickup.shop_name,
                opportunity.pickup.address,
                opportunity.dropoff.shop_name,
                opportunity.dropoff.address,
                opportunity.distance_km,
                opportunity.delivery_cost,
            ),
            payload: OpportunityPayload {
                claim_id: opportunity.claim_id.clone(),
                order_id: opportunity.order_id.clone(),
                pickup_name: opportunity.pickup.shop_name.clone(),
                pickup_address: opportunity.pickup.address.clone(),
                pickup_phone: opportunity.pickup.phone.clone(),
                delivery_name: opportunity.dropoff.shop_name.clone(),
                delivery_address: opportunity.dropoff.address.clone(),
                delivery_phone: opportunity.dropoff.phone.clone(),
                distance_km: opportunity.distance_km,
                delivery_cost: opportunity.delivery_cost,
                order_amount: opportunity.order_amount,
                estimated_hours,
            },
            created_at: Utc::now(),
            read: false,
        }
    }

    /// Short text for the SMS gateway
    pub fn sms_text(&self) -> String {
        format!(
            "{}: order {} {} -> {}, {:.1} km, earn {:.0}",
            self.title,
            self.payload.order_id,
            self.payload.pickup_address,
            self.payload.delivery_address,
            self.payload.distance_km,
            self.payload.delivery_cost,
        )
    }
}

pub fn notification_id_for(claim_id: &str, recipient_id: &str) -> String {
    compound_id("notify", &[claim_id, recipient_id])
}

/// ceil(distance / speed), never below one hour for a non-empty trip
pub fn estimated_hours(distance_km: f64, assumed_speed_kmh: f64) -> u32 {
    if distance_km <= 0.0 || assumed_speed_kmh <= 0.0 {
        return 0;
    }
    (distance_km / assumed_speed_kmh).ceil() as u32
}
