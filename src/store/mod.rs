use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::{Order, OrderError};
use crate::escrow::EscrowRecord;

// ============================================================================
// Store Seams - Abstract Persistence Capabilities
// ============================================================================
//
// The state machine, escrow controller, and audit log depend only on these
// traits, never on a concrete database handle. The in-memory implementations
// in `memory` back the demo binary and the test suite; a durable backend
// implements the same contracts.
//
// ============================================================================

/// Durable aggregate store with optimistic versioning. `update` is a
/// compare-and-swap on `version`: of two racing writers carrying the same
/// expected version, exactly one wins.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> Result<(), OrderError>;

    async fn get(&self, order_id: Uuid) -> Result<Order, OrderError>;

    /// Persist `order` (already carrying the incremented version) if the
    /// stored version still equals `expected_version`. Mismatch returns
    /// `ConcurrencyConflict` and writes nothing.
    async fn update(&self, order: Order, expected_version: i64) -> Result<Order, OrderError>;

    async fn list_by_buyer(&self, buyer_id: Uuid) -> Result<Vec<Order>, OrderError>;

    /// Orders containing at least one line item from this seller.
    async fn list_by_seller(&self, seller_id: Uuid) -> Result<Vec<Order>, OrderError>;
}

/// Held-funds records, keyed by (order, seller).
#[async_trait]
pub trait EscrowStore: Send + Sync {
    async fn insert(&self, record: EscrowRecord) -> Result<(), OrderError>;

    async fn get(&self, order_id: Uuid, seller_id: Uuid) -> Result<EscrowRecord, OrderError>;

    async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<EscrowRecord>, OrderError>;

    async fn update(&self, record: EscrowRecord) -> Result<(), OrderError>;
}

pub mod memory;

pub use memory::{InMemoryEscrowStore, InMemoryOrderStore};
