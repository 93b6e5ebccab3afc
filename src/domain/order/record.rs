use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::OrderError;
use super::value_objects::{ContactSnapshot, DeliveryMetadata, OrderItem, OrderStatus, PaymentStatus};

// ============================================================================
// Order Record
// ============================================================================
//
// Stored as one JSON document under the owning wholesaler's namespace and
// always written back whole. Status only moves forward; the transition into
// Packed is the one that attaches delivery metadata and the retailer snapshot.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    // Identity
    pub id: String,
    pub retailer_id: String,
    pub wholesaler_id: String,

    // Content
    pub items: Vec<OrderItem>,
    pub total_amount: f64,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retailer_snapshot: Option<ContactSnapshot>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryMetadata>,
}

impl Order {
    /// A freshly checked-out order, as the retailer side creates it
    pub fn new(
        id: impl Into<String>,
        retailer_id: impl Into<String>,
        wholesaler_id: impl Into<String>,
        items: Vec<OrderItem>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        let total_amount = items.iter().map(OrderItem::line_total).sum();

        Ok(Self {
            id: id.into(),
            retailer_id: retailer_id.into(),
            wholesaler_id: wholesaler_id.into(),
            items,
            total_amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: Utc::now(),
            retailer_snapshot: None,
            delivery: None,
        })
    }

    pub fn with_retailer_snapshot(mut self, snapshot: ContactSnapshot) -> Self {
        self.retailer_snapshot = Some(snapshot);
        self
    }

    /// Wholesaler accepted the order
    pub fn confirm(&mut self) -> Result<(), OrderError> {
        self.advance(OrderStatus::Confirmed)
    }

    /// Build the Packed version of this order.
    ///
    /// Allowed from Pending or Confirmed. The current value is left untouched
    /// so a failed write leaves the caller holding the original.
    pub fn packed(
        &self,
        snapshot: ContactSnapshot,
        delivery: DeliveryMetadata,
    ) -> Result<Order, OrderError> {
        match self.status {
            OrderStatus::Pending | OrderStatus::Confirmed => {}
            OrderStatus::Packed => return Err(OrderError::AlreadyPacked),
            from => {
                return Err(OrderError::InvalidStatusTransition {
                    from,
                    to: OrderStatus::Packed,
                })
            }
        }

        if delivery.distance_km < 0.0 || delivery.delivery_cost < 0.0 {
            return Err(OrderError::NegativeDeliveryFigures {
                distance_km: delivery.distance_km,
                cost: delivery.delivery_cost,
            });
        }

        let mut packed = self.clone();
        packed.status = OrderStatus::Packed;
        packed.retailer_snapshot = Some(snapshot);
        packed.delivery = Some(delivery);
        Ok(packed)
    }

    /// Single forward step outside of packing (confirmation, shipping, delivery)
    pub fn advance(&mut self, to: OrderStatus) -> Result<(), OrderError> {
        if to == OrderStatus::Packed {
            return Err(OrderError::InvalidStatusTransition { from: self.status, to });
        }
        if self.status.next() != Some(to) {
            return Err(OrderError::InvalidStatusTransition { from: self.status, to });
        }

        self.status = to;
        Ok(())
    }

    /// Delivery metadata is present exactly when the status requires it
    pub fn check_invariants(&self) -> Result<(), OrderError> {
        match (self.status.requires_delivery_metadata(), &self.delivery) {
            (true, None) => Err(OrderError::MissingDeliveryMetadata(self.status)),
            (false, Some(_)) => Err(OrderError::UnexpectedDeliveryMetadata(self.status)),
            (true, Some(d)) if d.distance_km < 0.0 || d.delivery_cost < 0.0 => {
                Err(OrderError::NegativeDeliveryFigures {
                    distance_km: d.distance_km,
                    cost: d.delivery_cost,
                })
            }
            _ => Ok(()),
        }
    }

    /// Human readable item list, e.g. "Rice x 5 kg, Wheat x 2 bag"
    pub fn items_description(&self) -> String {
        self.items
            .iter()
            .map(|item| format!("{} x {} {}", item.name, format_quantity(item.quantity), item.unit))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{}", quantity as i64)
    } else {
        format!("{}", quantity)
    }
}
