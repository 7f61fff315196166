use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::transitions::{rule_for, TransitionRule};
use super::value_objects::{ActorRole, LineItem, OrderStatus, PaymentStatus};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub version: i64,

    // Snapshotted at creation, never recomputed
    pub line_items: Vec<LineItem>,
    pub total_amount: Decimal,

    // Lifecycle
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_reference: String,

    // Present only while/after disputed
    pub dispute_reason: Option<String>,
    pub dispute_date: Option<DateTime<Utc>>,

    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a new order at checkout. `total_amount` is derived here, once,
    /// as the sum of line-item subtotals; nothing may alter it afterwards.
    pub fn create(
        buyer_id: Uuid,
        line_items: Vec<LineItem>,
        shipping_address: String,
        payment_reference: String,
        payment_status: PaymentStatus,
    ) -> Result<Self, OrderError> {
        validate_line_items(&line_items)?;

        if payment_reference.trim().is_empty() {
            return Err(OrderError::Validation("payment reference is required".into()));
        }

        let total_amount: Decimal = line_items.iter().map(LineItem::subtotal).sum();
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            buyer_id,
            version: 1,
            line_items,
            total_amount,
            status: OrderStatus::Pending,
            payment_status,
            payment_reference,
            dispute_reason: None,
            dispute_date: None,
            shipping_address,
            created_at: now,
            updated_at: now,
        })
    }

    /// Distinct sellers across line items, creation order preserved.
    pub fn seller_ids(&self) -> Vec<Uuid> {
        let mut sellers = Vec::new();
        for item in &self.line_items {
            if !sellers.contains(&item.seller_id) {
                sellers.push(item.seller_id);
            }
        }
        sellers
    }

    pub fn involves_seller(&self, seller_id: Uuid) -> bool {
        self.line_items.iter().any(|i| i.seller_id == seller_id)
    }

    /// Sum of this seller's line items, used to split escrow holds.
    pub fn seller_subtotal(&self, seller_id: Uuid) -> Decimal {
        self.line_items
            .iter()
            .filter(|i| i.seller_id == seller_id)
            .map(LineItem::subtotal)
            .sum()
    }

    /// Validate the edge and the actor against the policy table. Detects
    /// everything except the version conflict, which the store enforces on
    /// write. No mutation happens here.
    pub fn authorize_transition(
        &self,
        actor_id: Uuid,
        actor_role: ActorRole,
        target: OrderStatus,
    ) -> Result<&'static TransitionRule, OrderError> {
        let rule = rule_for(self.status, target).ok_or(OrderError::InvalidStateTransition {
            from: self.status,
            to: target,
        })?;

        if !rule.allowed_roles.contains(&actor_role) {
            return Err(OrderError::Unauthorized(format!(
                "role {actor_role:?} may not move an order from {:?} to {target:?}",
                self.status
            )));
        }

        // Role alone is not enough: buyers act only on their own orders,
        // sellers only on orders carrying their items.
        match actor_role {
            ActorRole::Buyer if actor_id != self.buyer_id => Err(OrderError::Unauthorized(
                "buyer does not own this order".into(),
            )),
            ActorRole::Seller if !self.involves_seller(actor_id) => Err(OrderError::Unauthorized(
                "seller has no line items in this order".into(),
            )),
            _ => Ok(rule),
        }
    }

    /// Whether moving to `target` must refund the buyer first.
    pub fn transition_requires_refund(&self, target: OrderStatus) -> bool {
        matches!(target, OrderStatus::Cancelled | OrderStatus::Refunded)
            && self.payment_status == PaymentStatus::Paid
    }

    /// Whether reaching `target` settles escrow out to the sellers.
    pub fn transition_releases_escrow(&self, target: OrderStatus) -> bool {
        target == OrderStatus::Completed && self.payment_status == PaymentStatus::Paid
    }
}

fn validate_line_items(items: &[LineItem]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::Validation("order must contain at least one line item".into()));
    }

    for item in items {
        if item.quantity < 1 {
            return Err(OrderError::Validation(format!(
                "invalid quantity {} for product {}",
                item.quantity, item.product_id
            )));
        }
        if item.unit_price_snapshot < Decimal::ZERO {
            return Err(OrderError::Validation(format!(
                "negative price for product {}",
                item.product_id
            )));
        }
    }

    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
