use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::opportunity::{DeliveryOpportunity, PartySummary};
use crate::domain::ids::compound_id;
use crate::domain::order::DeliveryMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Available,
    Claimed,
}

/// A packed order waiting for a vehicle owner.
///
/// The id is a pure function of the order's identity, so every retry of the
/// same packing lands on the same document.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryClaim {
    pub id: String,
    pub order_id: String,
    pub wholesaler: PartySummary,
    pub retailer: PartySummary,
    pub items_description: String,
    pub order_amount: f64,
    pub distance_km: f64,
    pub delivery_cost: f64,
    pub duration_label: String,
    pub packed_at: DateTime<Utc>,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
}

impl DeliveryClaim {
    pub fn available(opportunity: &DeliveryOpportunity) -> Self {
        Self {
            id: opportunity.claim_id.clone(),
            order_id: opportunity.order_id.clone(),
            wholesaler: opportunity.pickup.clone(),
            retailer: opportunity.dropoff.clone(),
            items_description: opportunity.items_description.clone(),
            order_amount: opportunity.order_amount,
            distance_km: opportunity.distance_km,
            delivery_cost: opportunity.delivery_cost,
            duration_label: opportunity.duration_label.clone(),
            packed_at: opportunity.packed_at,
            status: ClaimStatus::Available,
            created_at: Utc::now(),
            claimed_by: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == ClaimStatus::Available
    }

    /// The figures vehicle owners were offered
    pub fn delivery_metadata(&self) -> DeliveryMetadata {
        DeliveryMetadata {
            distance_km: self.distance_km,
            delivery_cost: self.delivery_cost,
            duration_label: self.duration_label.clone(),
            packed_at: self.packed_at,
        }
    }
}

pub fn claim_id_for(wholesaler_id: &str, order_id: &str) -> String {
    compound_id("delivery", &[wholesaler_id, order_id])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party(id: &str, address: &str) -> PartySummary {
        PartySummary {
            id: id.to_string(),
            name: id.to_string(),
            shop_name: format!("{} shop", id),
            address: address.to_string(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_claim_id_is_stable_per_order() {
        assert_eq!(claim_id_for("W1", "O1"), claim_id_for("W1", "O1"));
        assert_ne!(claim_id_for("W1", "O1"), claim_id_for("W2", "O1"));
        assert!(claim_id_for("W1", "O1").contains("O1"));
    }

    #[test]
    fn test_underscored_ids_get_distinct_claims() {
        assert_ne!(claim_id_for("W_A", "X"), claim_id_for("W", "A_X"));
        assert_ne!(claim_id_for("W", "1_2"), claim_id_for("W_1", "2"));
    }

    #[test]
    fn test_available_claim_copies_opportunity() {
        let opportunity = DeliveryOpportunity {
            claim_id: claim_id_for("W1", "O1"),
            order_id: "O1".to_string(),
            wholesaler_id: "W1".to_string(),
            pickup: party("W1", "Delhi"),
            dropoff: party("R1", "Gurgaon"),
            items_description: "Rice x 5 kg".to_string(),
            order_amount: 200.0,
            distance_km: 25.0,
            delivery_cost: 250.0,
            duration_label: "50 mins".to_string(),
            packed_at: Utc::now(),
        };

        let claim = DeliveryClaim::available(&opportunity);

        assert!(claim.is_available());
        assert_eq!(claim.id, opportunity.claim_id);
        assert_eq!(claim.delivery_cost, 250.0);
        assert_eq!(claim.retailer.address, "Gurgaon");
        assert_eq!(claim.delivery_metadata().delivery_cost, 250.0);
        assert_eq!(claim.delivery_metadata().packed_at, opportunity.packed_at);

        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["status"], "available");
        assert_eq!(json["deliveryCost"], 250.0);
    }
}
