// ============================================================================
// Service Layer - Orchestration
// ============================================================================
//
// The OrderService is the only entry point that mutates orders; the
// DisputeHandler is a thin specialization on top of it. Handlers and routes
// call these, never the stores.
//
// ============================================================================

pub mod disputes;
pub mod orders;

pub use disputes::DisputeHandler;
pub use orders::{OrderService, SellerStats, TransitionPayload};
