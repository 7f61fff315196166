use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::utils::IsTransient;

// ============================================================================
// Payment Channel - External Gateway Capability
// ============================================================================
//
// The remote payment gateway is modeled as an opaque capability with three
// operations, all safely retryable. A `Duplicate` ack means the gateway has
// already applied an identical request (same idempotency key or payment
// reference); callers treat it as success.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentAck {
    Confirmed,
    /// The gateway saw this idempotency key / reference before and applied
    /// nothing new.
    Duplicate,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("payment channel unavailable: {0}")]
    Transient(String),

    #[error("payment channel rejected the request: {0}")]
    Rejected(String),
}

impl IsTransient for ChannelError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[async_trait]
pub trait PaymentChannel: Send + Sync {
    /// Capture the buyer's payment identified by `payment_reference`.
    async fn capture(&self, payment_reference: &str) -> Result<PaymentAck, ChannelError>;

    /// Credit a seller's account. Idempotent on `idempotency_key`.
    async fn credit(
        &self,
        seller_account: Uuid,
        amount: Decimal,
        idempotency_key: Uuid,
    ) -> Result<PaymentAck, ChannelError>;

    /// Refund the buyer. Idempotent on `payment_reference`: a second refund
    /// against the same reference acks `Duplicate` instead of paying twice.
    async fn refund(
        &self,
        payment_reference: &str,
        amount: Decimal,
        idempotency_key: Uuid,
    ) -> Result<PaymentAck, ChannelError>;
}

// ============================================================================
// In-Memory Channel (demo + tests)
// ============================================================================

#[derive(Default)]
struct ChannelState {
    captured: HashSet<String>,
    credited_keys: HashSet<Uuid>,
    credited_totals: HashMap<Uuid, Decimal>,
    refunded_refs: HashSet<String>,
    refund_keys: HashSet<Uuid>,
    credit_calls: u64,
    refund_calls: u64,
    // Failure injection: each pending failure consumes one call.
    failing_credits: u32,
    failing_refunds: u32,
    rejecting_captures: u32,
}

/// Deduplicating stand-in for the real gateway. Tracks idempotency keys and
/// payment references the way the remote side would, and supports failure
/// injection so retry paths can be exercised.
#[derive(Default)]
pub struct InMemoryPaymentChannel {
    state: Mutex<ChannelState>,
}

impl InMemoryPaymentChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` credit calls fail with a transient error.
    pub async fn fail_next_credits(&self, n: u32) {
        self.state.lock().await.failing_credits = n;
    }

    /// Make the next `n` refund calls fail with a transient error.
    pub async fn fail_next_refunds(&self, n: u32) {
        self.state.lock().await.failing_refunds = n;
    }

    /// Make the next `n` capture calls fail with a permanent rejection
    /// (declined card, expired authorization).
    pub async fn reject_next_captures(&self, n: u32) {
        self.state.lock().await.rejecting_captures = n;
    }

    /// Total amount actually credited to a seller account.
    pub async fn credited_total(&self, seller_account: Uuid) -> Decimal {
        self.state
            .lock()
            .await
            .credited_totals
            .get(&seller_account)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub async fn credit_calls(&self) -> u64 {
        self.state.lock().await.credit_calls
    }

    pub async fn refund_calls(&self) -> u64 {
        self.state.lock().await.refund_calls
    }

    /// How many distinct idempotency keys refund calls arrived with.
    pub async fn distinct_refund_keys(&self) -> usize {
        self.state.lock().await.refund_keys.len()
    }

    pub async fn refund_keys_seen(&self) -> HashSet<Uuid> {
        self.state.lock().await.refund_keys.clone()
    }

    pub async fn was_refunded(&self, payment_reference: &str) -> bool {
        self.state.lock().await.refunded_refs.contains(payment_reference)
    }
}

#[async_trait]
impl PaymentChannel for InMemoryPaymentChannel {
    async fn capture(&self, payment_reference: &str) -> Result<PaymentAck, ChannelError> {
        let mut state = self.state.lock().await;

        if state.rejecting_captures > 0 {
            state.rejecting_captures -= 1;
            return Err(ChannelError::Rejected("payment declined".into()));
        }

        if !state.captured.insert(payment_reference.to_string()) {
            return Ok(PaymentAck::Duplicate);
        }
        Ok(PaymentAck::Confirmed)
    }

    async fn credit(
        &self,
        seller_account: Uuid,
        amount: Decimal,
        idempotency_key: Uuid,
    ) -> Result<PaymentAck, ChannelError> {
        let mut state = self.state.lock().await;
        state.credit_calls += 1;

        if state.failing_credits > 0 {
            state.failing_credits -= 1;
            return Err(ChannelError::Transient("simulated credit outage".into()));
        }

        if !state.credited_keys.insert(idempotency_key) {
            return Ok(PaymentAck::Duplicate);
        }

        *state.credited_totals.entry(seller_account).or_insert(Decimal::ZERO) += amount;
        Ok(PaymentAck::Confirmed)
    }

    async fn refund(
        &self,
        payment_reference: &str,
        _amount: Decimal,
        idempotency_key: Uuid,
    ) -> Result<PaymentAck, ChannelError> {
        let mut state = self.state.lock().await;
        state.refund_calls += 1;
        state.refund_keys.insert(idempotency_key);

        if state.failing_refunds > 0 {
            state.failing_refunds -= 1;
            return Err(ChannelError::Transient("simulated refund outage".into()));
        }

        if !state.refunded_refs.insert(payment_reference.to_string()) {
            return Ok(PaymentAck::Duplicate);
        }
        Ok(PaymentAck::Confirmed)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
