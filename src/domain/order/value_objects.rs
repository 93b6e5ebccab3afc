use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Order Value Objects
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
}

impl OrderItem {
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>, unit_price: f64) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
            unit_price,
        }
    }

    pub fn line_total(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

/// Fulfilment progress. Variants are declared in lifecycle order so the
/// derived `Ord` matches the only allowed direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Packed,
    Shipped,
    Delivered,
}

impl OrderStatus {
    /// The single status this one may advance to
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Packed),
            OrderStatus::Packed => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::Delivered),
            OrderStatus::Delivered => None,
        }
    }

    /// Whether delivery metadata must be present in this status
    pub fn requires_delivery_metadata(&self) -> bool {
        *self >= OrderStatus::Packed
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Packed => "Packed",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Overdue,
}

/// Retailer contact details frozen onto the order when it is packed.
/// Later edits to the retailer's profile do not flow back into it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactSnapshot {
    pub name: String,
    pub shop_name: String,
    pub address: String,
    pub phone: String,
    pub captured_at: DateTime<Utc>,
}

impl ContactSnapshot {
    pub fn has_address(&self) -> bool {
        !self.address.trim().is_empty()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryMetadata {
    pub distance_km: f64,
    pub delivery_cost: f64,
    pub duration_label: String,
    pub packed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_order_follows_lifecycle() {
        assert!(OrderStatus::Pending < OrderStatus::Confirmed);
        assert!(OrderStatus::Confirmed < OrderStatus::Packed);
        assert!(OrderStatus::Shipped < OrderStatus::Delivered);
        assert_eq!(OrderStatus::Confirmed.next(), Some(OrderStatus::Packed));
        assert_eq!(OrderStatus::Delivered.next(), None);
    }

    #[test]
    fn test_delivery_metadata_required_from_packed() {
        assert!(!OrderStatus::Pending.requires_delivery_metadata());
        assert!(!OrderStatus::Confirmed.requires_delivery_metadata());
        assert!(OrderStatus::Packed.requires_delivery_metadata());
        assert!(OrderStatus::Delivered.requires_delivery_metadata());
    }

    #[test]
    fn test_status_serializes_as_plain_name() {
        assert_eq!(serde_json::to_string(&OrderStatus::Packed).unwrap(), "\"Packed\"");
        let parsed: PaymentStatus = serde_json::from_str("\"Overdue\"").unwrap();
        assert_eq!(parsed, PaymentStatus::Overdue);
    }

    #[test]
    fn test_item_uses_camel_case_fields() {
        let item = OrderItem::new("Rice", 5.0, "kg", 40.0);
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["unitPrice"], 40.0);
        assert_eq!(item.line_total(), 200.0);
    }
}
