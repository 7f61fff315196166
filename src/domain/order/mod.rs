// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (LineItem, OrderStatus, PaymentStatus, ActorRole)
// - Errors (OrderError taxonomy, ErrorBody wire shape)
// - Transition policy table (who may move an order between which statuses)
// - Aggregate (Order with business invariants)
//
// Orchestration lives in src/service/; persistence seams in src/store/.
//
// ============================================================================

pub mod aggregate;
pub mod errors;
pub mod transitions;
pub mod value_objects;

// Re-export for convenience
pub use aggregate::*;
pub use errors::*;
pub use transitions::*;
pub use value_objects::*;
