use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::{Order, OrderError};
use crate::domain::user::ActingWholesaler;
use super::claim::claim_id_for;

/// Contact card for one end of a delivery
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartySummary {
    pub id: String,
    pub name: String,
    pub shop_name: String,
    pub address: String,
    pub phone: String,
}

/// Everything a vehicle owner needs to decide on a job: who to pick up
/// from, where to drop off, how far and what it pays.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOpportunity {
    pub claim_id: String,
    pub order_id: String,
    pub wholesaler_id: String,
    pub pickup: PartySummary,
    pub dropoff: PartySummary,
    pub items_description: String,
    pub order_amount: f64,
    pub distance_km: f64,
    pub delivery_cost: f64,
    pub duration_label: String,
    pub packed_at: DateTime<Utc>,
}

impl DeliveryOpportunity {
    /// Build the opportunity from an order that has gone through packing
    pub fn from_packed_order(order: &Order, wholesaler: &ActingWholesaler) -> Result<Self, OrderError> {
        let delivery = order
            .delivery
            .as_ref()
            .ok_or(OrderError::MissingDeliveryMetadata(order.status))?;
        let retailer = order
            .retailer_snapshot
            .as_ref()
            .ok_or(OrderError::MissingDeliveryMetadata(order.status))?;

        Ok(Self {
            claim_id: claim_id_for(&order.wholesaler_id, &order.id),
            order_id: order.id.clone(),
            wholesaler_id: order.wholesaler_id.clone(),
            pickup: PartySummary {
                id: wholesaler.id.clone(),
                name: wholesaler.name.clone(),
                shop_name: wholesaler.shop_name.clone(),
                address: wholesaler.address.clone(),
                phone: wholesaler.phone.clone(),
            },
            dropoff: PartySummary {
                id: order.retailer_id.clone(),
                name: retailer.name.clone(),
                shop_name: retailer.shop_name.clone(),
                address: retailer.address.clone(),
                phone: retailer.phone.clone(),
            },
            items_description: order.items_description(),
            order_amount: order.total_amount,
            distance_km: delivery.distance_km,
            delivery_cost: delivery.delivery_cost,
            duration_label: delivery.duration_label.clone(),
            packed_at: delivery.packed_at,
        })
    }
}
