use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLog, AuditLogEntry};
use crate::domain::order::{
    ActorRole, LineItem, Order, OrderError, OrderStatus, PaymentStatus,
};
use crate::escrow::{EscrowController, RefundOutcome};
use crate::store::OrderStore;

// ============================================================================
// Order Service - State Machine Entry Point
// ============================================================================
//
// Every mutation of an order flows through this service: it validates the
// actor and the edge against the policy table, runs escrow side effects in
// the required order, and persists under the optimistic version guard.
// Route/handler code never touches the stores directly.
//
// ============================================================================

/// Edge-specific input carried alongside a transition request.
#[derive(Debug, Clone, Default)]
pub struct TransitionPayload {
    /// Required when the target is Disputed.
    pub dispute_reason: Option<String>,
    /// Free-form notes, e.g. an admin's resolution rationale.
    pub notes: Option<String>,
}

/// Aggregates for a seller's dashboard, computed over their line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerStats {
    pub total_revenue: Decimal,
    pub total_orders: u64,
    pub pending_orders: u64,
}

pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    audit: Arc<dyn AuditLog>,
    escrow: Arc<EscrowController>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        audit: Arc<dyn AuditLog>,
        escrow: Arc<EscrowController>,
    ) -> Self {
        Self { orders, audit, escrow }
    }

    /// Checkout: snapshot the line items, derive the total, capture the
    /// payment, and hold the captured funds in escrow. A rejected capture
    /// still creates the order, with `payment_status = Failed` and nothing
    /// held; a gateway outage creates nothing.
    pub async fn create(
        &self,
        buyer_id: Uuid,
        line_items: Vec<LineItem>,
        shipping_address: String,
        payment_reference: String,
    ) -> Result<Order, OrderError> {
        let mut order = Order::create(
            buyer_id,
            line_items,
            shipping_address,
            payment_reference,
            PaymentStatus::Pending,
        )?;

        order.payment_status = if self.escrow.capture(&order.payment_reference).await? {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Failed
        };

        self.orders.insert(order.clone()).await?;

        self.audit
            .record(
                order.id,
                buyer_id,
                ActorRole::Buyer,
                AuditAction::Created,
                order.total_amount,
                format!("order created with {} line item(s)", order.line_items.len()),
            )
            .await;

        if order.payment_status == PaymentStatus::Paid {
            self.escrow.hold(&order, buyer_id, ActorRole::Buyer).await?;
        }

        tracing::info!(
            order_id = %order.id,
            buyer_id = %buyer_id,
            total = %order.total_amount,
            payment_status = ?order.payment_status,
            "Order created"
        );

        Ok(order)
    }

    /// Buyer sees their own orders, a seller sees orders carrying their
    /// line items, admin sees everything.
    pub async fn get(
        &self,
        order_id: Uuid,
        requester_id: Uuid,
        requester_role: ActorRole,
    ) -> Result<Order, OrderError> {
        let order = self.orders.get(order_id).await?;

        let allowed = match requester_role {
            ActorRole::Admin => true,
            ActorRole::Buyer => order.buyer_id == requester_id,
            ActorRole::Seller => order.involves_seller(requester_id),
        };

        if !allowed {
            return Err(OrderError::Unauthorized(
                "requester has no access to this order".into(),
            ));
        }

        Ok(order)
    }

    pub async fn list_by_buyer(&self, buyer_id: Uuid) -> Result<Vec<Order>, OrderError> {
        self.orders.list_by_buyer(buyer_id).await
    }

    /// A seller's orders plus dashboard aggregates. Revenue counts only
    /// this seller's subtotals on completed, paid orders.
    pub async fn list_by_seller(
        &self,
        seller_id: Uuid,
    ) -> Result<(Vec<Order>, SellerStats), OrderError> {
        let orders = self.orders.list_by_seller(seller_id).await?;

        let total_revenue = orders
            .iter()
            .filter(|o| {
                o.status == OrderStatus::Completed && o.payment_status == PaymentStatus::Paid
            })
            .map(|o| o.seller_subtotal(seller_id))
            .sum();

        let stats = SellerStats {
            total_revenue,
            total_orders: orders.len() as u64,
            pending_orders: orders.iter().filter(|o| o.status == OrderStatus::Pending).count()
                as u64,
        };

        Ok((orders, stats))
    }

    /// Validate and apply one status transition. Mirrors the lifecycle
    /// contract: version conflicts and authorization failures abort before
    /// any side effect; refunds run before the commit and abort it on
    /// gateway failure; releases run after the commit to Completed (a failed
    /// credit stays held and retryable).
    pub async fn request_transition(
        &self,
        order_id: Uuid,
        actor_id: Uuid,
        actor_role: ActorRole,
        target: OrderStatus,
        expected_version: i64,
        payload: TransitionPayload,
    ) -> Result<Order, OrderError> {
        let order = self.orders.get(order_id).await?;

        if order.version != expected_version {
            return Err(OrderError::ConcurrencyConflict {
                expected: expected_version,
                actual: order.version,
            });
        }

        order.authorize_transition(actor_id, actor_role, target)?;

        if target == OrderStatus::Disputed {
            match payload.dispute_reason.as_deref().map(str::trim) {
                Some(reason) if !reason.is_empty() => {}
                _ => return Err(OrderError::Validation("a dispute requires a reason".into())),
            }
        }

        let mut working = order.clone();
        working.status = target;
        working.updated_at = Utc::now();
        if target == OrderStatus::Disputed {
            working.dispute_reason = payload.dispute_reason.clone();
            working.dispute_date = Some(working.updated_at);
        }

        // Refund-type side effects come first: if the gateway fails, the
        // stored order is untouched and the identical call can be retried.
        let refund_outcome = if working.transition_requires_refund(target) {
            Some(self.escrow.refund(&mut working).await?)
        } else {
            None
        };

        working.version = expected_version + 1;
        let updated = self.orders.update(working, expected_version).await?;

        self.audit
            .record(
                order_id,
                actor_id,
                actor_role,
                audit_action_for(order.status, target),
                Decimal::ZERO,
                transition_details(order.status, target, &payload),
            )
            .await;

        if refund_outcome == Some(RefundOutcome::Refunded) {
            self.escrow.settle_refund(&updated, actor_id, actor_role).await?;
        }

        // Completion settles the held funds out to the sellers.
        if target == OrderStatus::Completed && updated.payment_status == PaymentStatus::Paid {
            self.escrow.release_all(&updated, actor_id, actor_role).await?;
        }

        tracing::info!(
            order_id = %order_id,
            actor_id = %actor_id,
            from = ?order.status,
            to = ?target,
            version = updated.version,
            "Order transition applied"
        );

        Ok(updated)
    }

    /// Compliance view of everything that happened to an order. Admin only.
    pub async fn audit_trail(
        &self,
        order_id: Uuid,
        requester_role: ActorRole,
    ) -> Result<Vec<AuditLogEntry>, OrderError> {
        if requester_role != ActorRole::Admin {
            return Err(OrderError::Unauthorized("audit trail is admin-only".into()));
        }
        self.orders.get(order_id).await?;
        Ok(self.audit.list(order_id).await)
    }
}

/// The ledger action for an accepted edge. Callers run this only after the
/// edge passed the policy table, so every reachable pair is covered.
fn audit_action_for(from: OrderStatus, to: OrderStatus) -> AuditAction {
    match (from, to) {
        (OrderStatus::Disputed, _) => AuditAction::DisputeResolved,
        (_, OrderStatus::Processing) => AuditAction::Approved,
        (_, OrderStatus::Shipped) => AuditAction::Shipped,
        (_, OrderStatus::Completed) => AuditAction::Completed,
        (_, OrderStatus::Cancelled) => AuditAction::Cancelled,
        (_, OrderStatus::Disputed) => AuditAction::Disputed,
        (_, OrderStatus::Refunded) => AuditAction::DisputeResolved,
        (_, OrderStatus::Pending) => unreachable!("no edge leads back to pending"),
    }
}

fn transition_details(from: OrderStatus, to: OrderStatus, payload: &TransitionPayload) -> String {
    let mut details = format!("{from:?} -> {to:?}");
    if let Some(reason) = &payload.dispute_reason {
        details.push_str(&format!("; reason: {reason}"));
    }
    if let Some(notes) = &payload.notes {
        details.push_str(&format!("; notes: {notes}"));
    }
    details
}

// ============================================================================
// Unit Tests
// ============================================================================
