use std::sync::Arc;

use uuid::Uuid;

use crate::domain::order::{ActorRole, DisputeResolution, Order, OrderError, OrderStatus};

use super::orders::{OrderService, TransitionPayload};

// ============================================================================
// Dispute Handler
// ============================================================================
//
// Disputes are ordinary state-machine transitions with one extra property:
// while an order sits in Disputed, escrow release is frozen. Resolution is
// an admin decision, either refunding the buyer or releasing the held funds
// to the sellers by completing the order.
//
// ============================================================================

pub struct DisputeHandler {
    orders: Arc<OrderService>,
}

impl DisputeHandler {
    pub fn new(orders: Arc<OrderService>) -> Self {
        Self { orders }
    }

    /// Buyer contests an order. Rejected when the order is already disputed
    /// or in a terminal state; an empty reason is a validation error.
    pub async fn raise_dispute(
        &self,
        order_id: Uuid,
        buyer_id: Uuid,
        reason: String,
        expected_version: i64,
    ) -> Result<Order, OrderError> {
        self.orders
            .request_transition(
                order_id,
                buyer_id,
                ActorRole::Buyer,
                OrderStatus::Disputed,
                expected_version,
                TransitionPayload { dispute_reason: Some(reason), notes: None },
            )
            .await
    }

    /// Admin closes a dispute. `Refund` sends the payment back to the buyer;
    /// `Release` completes the order, which settles escrow out to the
    /// sellers through the normal per-seller release.
    pub async fn resolve_dispute(
        &self,
        order_id: Uuid,
        admin_id: Uuid,
        resolution: DisputeResolution,
        notes: Option<String>,
        expected_version: i64,
    ) -> Result<Order, OrderError> {
        let target = match resolution {
            DisputeResolution::Refund => OrderStatus::Refunded,
            DisputeResolution::Release => OrderStatus::Completed,
        };

        tracing::info!(
            order_id = %order_id,
            admin_id = %admin_id,
            resolution = ?resolution,
            "Resolving dispute"
        );

        self.orders
            .request_transition(
                order_id,
                admin_id,
                ActorRole::Admin,
                target,
                expected_version,
                TransitionPayload { dispute_reason: None, notes },
            )
            .await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
