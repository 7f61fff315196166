// ============================================================================
// Escrow - Held Funds and Settlement Against the Payment Channel
// ============================================================================
//
// Funds captured from the buyer are held per seller until the order
// completes, then credited out at most once per (order, seller). Records are
// created and mutated only by the EscrowController, as side effects of
// state-machine transitions.
//
// ============================================================================

pub mod controller;
pub mod gateway;

pub use controller::{EscrowController, RefundOutcome};
pub use gateway::{ChannelError, InMemoryPaymentChannel, PaymentAck, PaymentChannel};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-(order, seller) held funds. The idempotency key is minted when the
/// hold is created and reused on every credit attempt, so a retried release
/// can never double-pay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub order_id: Uuid,
    pub seller_id: Uuid,
    pub held_amount: Decimal,
    pub released: bool,
    pub release_idempotency_key: Uuid,
}

impl EscrowRecord {
    pub fn new(order_id: Uuid, seller_id: Uuid, held_amount: Decimal) -> Self {
        Self {
            order_id,
            seller_id,
            held_amount,
            released: false,
            release_idempotency_key: Uuid::new_v4(),
        }
    }
}
