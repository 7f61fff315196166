use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLog};
use crate::domain::order::{ActorRole, Order, OrderError, OrderStatus, PaymentStatus};
use crate::store::EscrowStore;
use crate::utils::{retry_on_transient, IsTransient, RetryConfig};

use super::gateway::PaymentChannel;
use super::EscrowRecord;

// ============================================================================
// Escrow Controller
// ============================================================================
//
// Moves money at most once per (order, seller) and at most once per refund,
// no matter how often a caller retries. The rule throughout: check the
// persisted flag before calling the gateway, and never flip the flag until
// the gateway confirms. A failed call therefore always leaves a retryable
// state behind.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    Refunded,
    /// The order was already refunded; nothing moved. Reported as success.
    AlreadyRefunded,
}

pub struct EscrowController {
    escrow_store: Arc<dyn EscrowStore>,
    audit: Arc<dyn AuditLog>,
    channel: Arc<dyn PaymentChannel>,
    retry: RetryConfig,
}

impl EscrowController {
    pub fn new(
        escrow_store: Arc<dyn EscrowStore>,
        audit: Arc<dyn AuditLog>,
        channel: Arc<dyn PaymentChannel>,
        retry: RetryConfig,
    ) -> Self {
        Self { escrow_store, audit, channel, retry }
    }

    /// Capture the buyer's payment at checkout. `Ok(true)` means the funds
    /// are captured (a duplicate ack counts: the reference was captured
    /// earlier); `Ok(false)` means the gateway rejected the payment outright.
    /// Transient outages surface as a gateway error once retries run out.
    pub async fn capture(&self, payment_reference: &str) -> Result<bool, OrderError> {
        let reference = payment_reference.to_string();
        let channel = self.channel.clone();
        let result = retry_on_transient(self.retry.clone(), move |_attempt| {
            let channel = channel.clone();
            let reference = reference.clone();
            async move { channel.capture(&reference).await }
        })
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if !e.is_transient() => {
                tracing::warn!(payment_reference, error = %e, "Payment capture rejected");
                Ok(false)
            }
            Err(e) => Err(OrderError::Gateway(e.to_string())),
        }
    }

    /// Hold the buyer's captured funds, split per seller. Called once, at
    /// order creation, when the payment is already captured. Writes one
    /// EscrowHeld entry covering the full amount.
    pub async fn hold(
        &self,
        order: &Order,
        actor_id: Uuid,
        actor_role: ActorRole,
    ) -> Result<(), OrderError> {
        if order.payment_status != PaymentStatus::Paid {
            return Err(OrderError::Validation(
                "escrow can only hold captured (paid) funds".into(),
            ));
        }

        for seller_id in order.seller_ids() {
            let subtotal = order.seller_subtotal(seller_id);
            self.escrow_store
                .insert(EscrowRecord::new(order.id, seller_id, subtotal))
                .await?;

            tracing::debug!(
                order_id = %order.id,
                seller_id = %seller_id,
                amount = %subtotal,
                "Escrow record created"
            );
        }

        self.audit
            .record(
                order.id,
                actor_id,
                actor_role,
                AuditAction::EscrowHeld,
                order.total_amount,
                format!("held across {} seller(s)", order.seller_ids().len()),
            )
            .await;

        Ok(())
    }

    /// Credit one seller's held funds out. Legal only once the order is
    /// completed; refused outright while disputed (release freeze). Returns
    /// `false` when the record was already released (idempotent no-op).
    pub async fn release(
        &self,
        order: &Order,
        seller_id: Uuid,
        actor_id: Uuid,
        actor_role: ActorRole,
    ) -> Result<bool, OrderError> {
        if order.status != OrderStatus::Completed {
            return Err(OrderError::InvalidStateTransition {
                from: order.status,
                to: OrderStatus::Completed,
            });
        }

        let mut record = self.escrow_store.get(order.id, seller_id).await?;

        if record.released {
            tracing::debug!(
                order_id = %order.id,
                seller_id = %seller_id,
                "Escrow already released, no-op"
            );
            return Ok(false);
        }

        // Same persisted key on every attempt: the gateway dedupes a retry
        // that raced a crash between "call sent" and "flag persisted".
        let amount = record.held_amount;
        let key = record.release_idempotency_key;
        let channel = self.channel.clone();
        retry_on_transient(self.retry.clone(), move |_attempt| {
            let channel = channel.clone();
            async move { channel.credit(seller_id, amount, key).await }
        })
        .await
        .map_err(|e| OrderError::Gateway(e.to_string()))?;

        record.released = true;
        self.escrow_store.update(record).await?;

        self.audit
            .record(
                order.id,
                actor_id,
                actor_role,
                AuditAction::EscrowReleased,
                amount,
                format!("released to seller {seller_id}"),
            )
            .await;

        tracing::info!(
            order_id = %order.id,
            seller_id = %seller_id,
            amount = %amount,
            "Escrow released"
        );

        Ok(true)
    }

    /// Release every seller's held funds for a completed order.
    pub async fn release_all(
        &self,
        order: &Order,
        actor_id: Uuid,
        actor_role: ActorRole,
    ) -> Result<(), OrderError> {
        for record in self.escrow_store.list_for_order(order.id).await? {
            self.release(order, record.seller_id, actor_id, actor_role).await?;
        }
        Ok(())
    }

    /// Refund the buyer's payment through the gateway. Mutates only the
    /// caller's working copy of the order (`payment_status = Refunded`); the
    /// caller persists it under the owning transition's version-guarded
    /// write, then calls [`settle_refund`](Self::settle_refund).
    pub async fn refund(&self, order: &mut Order) -> Result<RefundOutcome, OrderError> {
        if order.payment_status == PaymentStatus::Refunded {
            return Ok(RefundOutcome::AlreadyRefunded);
        }
        if order.payment_status != PaymentStatus::Paid {
            return Err(OrderError::Validation(
                "only a paid order can be refunded".into(),
            ));
        }

        // Partial refunds for partially-released multi-seller orders have no
        // agreed policy yet; refuse rather than guess.
        for record in self.escrow_store.list_for_order(order.id).await? {
            if record.released && record.held_amount > Decimal::ZERO {
                return Err(OrderError::Validation(format!(
                    "seller {} was already paid out; partial refunds are not supported",
                    record.seller_id
                )));
            }
        }

        // One refund key per payment reference, derived deterministically:
        // every attempt, in this process or after a crash, sends the same
        // key, and the gateway also dedupes on the reference itself.
        let reference = order.payment_reference.clone();
        let amount = order.total_amount;
        let key = Uuid::new_v5(&Uuid::NAMESPACE_OID, reference.as_bytes());
        let channel = self.channel.clone();
        retry_on_transient(self.retry.clone(), move |_attempt| {
            let channel = channel.clone();
            let reference = reference.clone();
            async move { channel.refund(&reference, amount, key).await }
        })
        .await
        .map_err(|e| OrderError::Gateway(e.to_string()))?;

        order.payment_status = PaymentStatus::Refunded;

        tracing::info!(
            order_id = %order.id,
            amount = %amount,
            "Refund confirmed by gateway"
        );

        Ok(RefundOutcome::Refunded)
    }

    /// After the refunding transition committed: zero out still-held records
    /// (funds went back to the buyer, not to sellers) and write the Refunded
    /// audit entry.
    pub async fn settle_refund(
        &self,
        order: &Order,
        actor_id: Uuid,
        actor_role: ActorRole,
    ) -> Result<(), OrderError> {
        for mut record in self.escrow_store.list_for_order(order.id).await? {
            if !record.released {
                record.released = true;
                record.held_amount = Decimal::ZERO;
                self.escrow_store.update(record).await?;
            }
        }

        self.audit
            .record(
                order.id,
                actor_id,
                actor_role,
                AuditAction::Refunded,
                order.total_amount,
                format!("payment {} refunded to buyer", order.payment_reference),
            )
            .await;

        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditLog;
    use crate::domain::order::LineItem;
    use crate::escrow::InMemoryPaymentChannel;
    use crate::store::InMemoryEscrowStore;

    struct Fixture {
        controller: EscrowController,
        escrow_store: Arc<InMemoryEscrowStore>,
        audit: Arc<InMemoryAuditLog>,
        channel: Arc<InMemoryPaymentChannel>,
    }

    fn fixture() -> Fixture {
        let escrow_store = Arc::new(InMemoryEscrowStore::new());
        let audit = Arc::new(InMemoryAuditLog::new());
        let channel = Arc::new(InMemoryPaymentChannel::new());
        let controller = EscrowController::new(
            escrow_store.clone(),
            audit.clone(),
            channel.clone(),
            RetryConfig::fast(),
        );
        Fixture { controller, escrow_store, audit, channel }
    }

    fn paid_order(seller_a: Uuid, seller_b: Uuid) -> Order {
        Order::create(
            Uuid::new_v4(),
            vec![
                LineItem {
                    product_id: Uuid::new_v4(),
                    seller_id: seller_a,
                    quantity: 2,
                    unit_price_snapshot: Decimal::from(100),
                },
                LineItem {
                    product_id: Uuid::new_v4(),
                    seller_id: seller_b,
                    quantity: 1,
                    unit_price_snapshot: Decimal::from(250),
                },
            ],
            "addr".into(),
            "pay-ref-1".into(),
            PaymentStatus::Paid,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_hold_splits_total_per_seller() {
        let f = fixture();
        let seller_a = Uuid::new_v4();
        let seller_b = Uuid::new_v4();
        let order = paid_order(seller_a, seller_b);

        f.controller.hold(&order, order.buyer_id, ActorRole::Buyer).await.unwrap();

        let a = f.escrow_store.get(order.id, seller_a).await.unwrap();
        let b = f.escrow_store.get(order.id, seller_b).await.unwrap();
        assert_eq!(a.held_amount, Decimal::from(200));
        assert_eq!(b.held_amount, Decimal::from(250));
        assert!(!a.released && !b.released);

        let entries = f.audit.list(order.id).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::EscrowHeld);
        assert_eq!(entries[0].amount_involved, Decimal::from(450));
    }

    #[tokio::test]
    async fn test_hold_requires_captured_payment() {
        let f = fixture();
        let mut order = paid_order(Uuid::new_v4(), Uuid::new_v4());
        order.payment_status = PaymentStatus::Pending;

        let err = f.controller.hold(&order, order.buyer_id, ActorRole::Buyer).await.unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_double_release_credits_exactly_once() {
        let f = fixture();
        let seller_a = Uuid::new_v4();
        let mut order = paid_order(seller_a, Uuid::new_v4());
        f.controller.hold(&order, order.buyer_id, ActorRole::Buyer).await.unwrap();
        order.status = OrderStatus::Completed;

        let admin = Uuid::new_v4();
        let first = f.controller.release(&order, seller_a, admin, ActorRole::Admin).await.unwrap();
        let second = f.controller.release(&order, seller_a, admin, ActorRole::Admin).await.unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(f.channel.credited_total(seller_a).await, Decimal::from(200));
        assert_eq!(f.channel.credit_calls().await, 1);

        let released_entries: Vec<_> = f
            .audit
            .list(order.id)
            .await
            .into_iter()
            .filter(|e| e.action == AuditAction::EscrowReleased)
            .collect();
        assert_eq!(released_entries.len(), 1);
    }

    #[tokio::test]
    async fn test_release_refused_while_disputed() {
        let f = fixture();
        let seller_a = Uuid::new_v4();
        let mut order = paid_order(seller_a, Uuid::new_v4());
        f.controller.hold(&order, order.buyer_id, ActorRole::Buyer).await.unwrap();
        order.status = OrderStatus::Disputed;

        let err = f
            .controller
            .release(&order, seller_a, Uuid::new_v4(), ActorRole::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidStateTransition { .. }));
        assert_eq!(f.channel.credit_calls().await, 0);
    }

    #[tokio::test]
    async fn test_failed_gateway_leaves_release_retryable() {
        let f = fixture();
        let seller_a = Uuid::new_v4();
        let mut order = paid_order(seller_a, Uuid::new_v4());
        f.controller.hold(&order, order.buyer_id, ActorRole::Buyer).await.unwrap();
        order.status = OrderStatus::Completed;

        // Exhaust all retry attempts.
        f.channel.fail_next_credits(3).await;
        let err = f
            .controller
            .release(&order, seller_a, Uuid::new_v4(), ActorRole::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Gateway(_)));

        // Flag untouched, so the retry pays exactly once.
        assert!(!f.escrow_store.get(order.id, seller_a).await.unwrap().released);
        let credited = f
            .controller
            .release(&order, seller_a, Uuid::new_v4(), ActorRole::Admin)
            .await
            .unwrap();
        assert!(credited);
        assert_eq!(f.channel.credited_total(seller_a).await, Decimal::from(200));
    }

    #[tokio::test]
    async fn test_transient_credit_failure_retried_within_release() {
        let f = fixture();
        let seller_a = Uuid::new_v4();
        let mut order = paid_order(seller_a, Uuid::new_v4());
        f.controller.hold(&order, order.buyer_id, ActorRole::Buyer).await.unwrap();
        order.status = OrderStatus::Completed;

        // Fewer failures than max_attempts: the backoff loop absorbs them.
        f.channel.fail_next_credits(2).await;
        let credited = f
            .controller
            .release(&order, seller_a, Uuid::new_v4(), ActorRole::Admin)
            .await
            .unwrap();
        assert!(credited);
        assert_eq!(f.channel.credited_total(seller_a).await, Decimal::from(200));
    }

    #[tokio::test]
    async fn test_refund_twice_pays_once() {
        let f = fixture();
        let mut order = paid_order(Uuid::new_v4(), Uuid::new_v4());
        f.controller.hold(&order, order.buyer_id, ActorRole::Buyer).await.unwrap();

        let first = f.controller.refund(&mut order).await.unwrap();
        assert_eq!(first, RefundOutcome::Refunded);
        assert_eq!(order.payment_status, PaymentStatus::Refunded);

        let second = f.controller.refund(&mut order).await.unwrap();
        assert_eq!(second, RefundOutcome::AlreadyRefunded);
        assert_eq!(f.channel.refund_calls().await, 1);
    }

    #[tokio::test]
    async fn test_refund_retries_carry_one_idempotency_key() {
        let f = fixture();
        let mut order = paid_order(Uuid::new_v4(), Uuid::new_v4());
        f.controller.hold(&order, order.buyer_id, ActorRole::Buyer).await.unwrap();

        // Two transient failures, then success: three calls, one key.
        f.channel.fail_next_refunds(2).await;
        let outcome = f.controller.refund(&mut order).await.unwrap();
        assert_eq!(outcome, RefundOutcome::Refunded);
        assert_eq!(f.channel.refund_calls().await, 3);
        assert_eq!(f.channel.distinct_refund_keys().await, 1);

        // The key is derived from the reference, so a fresh controller (a
        // restarted process) retrying the same order sends the same key.
        let expected = Uuid::new_v5(&Uuid::NAMESPACE_OID, order.payment_reference.as_bytes());
        order.payment_status = PaymentStatus::Paid;
        f.controller.refund(&mut order).await.unwrap();
        assert_eq!(f.channel.distinct_refund_keys().await, 1);
        assert!(f.channel.refund_keys_seen().await.contains(&expected));
    }

    #[tokio::test]
    async fn test_refund_refused_after_partial_release() {
        let f = fixture();
        let seller_a = Uuid::new_v4();
        let mut order = paid_order(seller_a, Uuid::new_v4());
        f.controller.hold(&order, order.buyer_id, ActorRole::Buyer).await.unwrap();

        // Seller A already got paid out.
        order.status = OrderStatus::Completed;
        f.controller.release(&order, seller_a, Uuid::new_v4(), ActorRole::Admin).await.unwrap();

        let err = f.controller.refund(&mut order).await.unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_settle_refund_zeroes_held_records() {
        let f = fixture();
        let seller_a = Uuid::new_v4();
        let seller_b = Uuid::new_v4();
        let mut order = paid_order(seller_a, seller_b);
        f.controller.hold(&order, order.buyer_id, ActorRole::Buyer).await.unwrap();

        f.controller.refund(&mut order).await.unwrap();
        f.controller.settle_refund(&order, order.buyer_id, ActorRole::Buyer).await.unwrap();

        for record in f.escrow_store.list_for_order(order.id).await.unwrap() {
            assert!(record.released);
            assert_eq!(record.held_amount, Decimal::ZERO);
        }

        let refunded: Vec<_> = f
            .audit
            .list(order.id)
            .await
            .into_iter()
            .filter(|e| e.action == AuditAction::Refunded)
            .collect();
        assert_eq!(refunded.len(), 1);
        assert_eq!(refunded[0].amount_involved, Decimal::from(450));
    }
}
