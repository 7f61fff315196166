use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Order Value Objects
// ============================================================================

/// One product+seller+quantity entry, price snapshotted at order creation.
/// Seller and price never change after the order is created.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LineItem {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: i32,
    pub unit_price_snapshot: Decimal,
}

impl LineItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price_snapshot * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Completed,
    Cancelled,
    Disputed,
    Refunded,
}

impl OrderStatus {
    /// Terminal orders accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Refunded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

/// Supplied by the external identity provider; the core trusts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Buyer,
    Seller,
    Admin,
}

/// Admin decision closing a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeResolution {
    Refund,
    Release,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_item_subtotal() {
        let item = LineItem {
            product_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            quantity: 3,
            unit_price_snapshot: Decimal::from(150),
        };

        assert_eq!(item.subtotal(), Decimal::from(450));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());

        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
        assert!(!OrderStatus::Disputed.is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&OrderStatus::Disputed).unwrap();
        assert_eq!(json, "\"disputed\"");

        let back: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OrderStatus::Disputed);
    }

    #[test]
    fn test_line_item_serialization() {
        let item = LineItem {
            product_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            quantity: 2,
            unit_price_snapshot: Decimal::from(100),
        };

        let json = serde_json::to_string(&item).unwrap();
        let back: LineItem = serde_json::from_str(&json).unwrap();

        assert_eq!(back.product_id, item.product_id);
        assert_eq!(back.seller_id, item.seller_id);
        assert_eq!(back.quantity, 2);
        assert_eq!(back.subtotal(), Decimal::from(200));
    }
}
