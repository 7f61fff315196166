// ============================================================================
// farmlink-orders - Order Lifecycle & Escrow Settlement Engine
// ============================================================================
//
// Core of a produce marketplace: tracks multi-seller orders through payment
// capture, fulfillment, cancellation, refund, and dispute, with an
// append-only audit trail and at-most-once disbursement per seller.
//
// Layering, leaves first:
// - audit:   append-only ledger of every state-changing event
// - escrow:  per-seller held funds; idempotent hold/release/refund against
//            the external payment channel
// - domain:  the Order aggregate and its transition policy table
// - store:   abstract persistence seams + in-memory implementations
// - service: the state machine entry point and the dispute handler
//
// ============================================================================

pub mod audit;
pub mod domain;
pub mod escrow;
pub mod service;
pub mod store;
pub mod utils;

pub use audit::{AuditAction, AuditLog, AuditLogEntry, InMemoryAuditLog};
pub use domain::order::{
    ActorRole, DisputeResolution, ErrorBody, LineItem, Order, OrderError, OrderStatus,
    PaymentStatus,
};
pub use escrow::{EscrowController, EscrowRecord, InMemoryPaymentChannel, PaymentChannel};
pub use service::{DisputeHandler, OrderService, SellerStats, TransitionPayload};
pub use store::{EscrowStore, InMemoryEscrowStore, InMemoryOrderStore, OrderStore};
