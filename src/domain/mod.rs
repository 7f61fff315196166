// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Domain-specific aggregates and rules, kept separate from the stores,
// the escrow infrastructure, and the service orchestration.
//
// ============================================================================

pub mod order;
