use super::value_objects::{ActorRole, OrderStatus};

// ============================================================================
// Transition Policy Table
// ============================================================================
//
// Single source of truth for which role may move an order between which
// statuses. Every transition request is checked against this table; route
// or handler code never re-implements role checks.
//
// Ownership is enforced on top of the table: a Buyer must own the order and
// a Seller must have line items in it. Admin acts on any order.
//
// ============================================================================

#[derive(Debug)]
pub struct TransitionRule {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub allowed_roles: &'static [ActorRole],
}

use ActorRole::{Admin, Buyer, Seller};
use OrderStatus::*;

pub const TRANSITION_TABLE: &[TransitionRule] = &[
    TransitionRule { from: Pending, to: Processing, allowed_roles: &[Admin] },
    TransitionRule { from: Pending, to: Cancelled, allowed_roles: &[Buyer] },
    TransitionRule { from: Processing, to: Cancelled, allowed_roles: &[Buyer, Admin] },
    TransitionRule { from: Processing, to: Shipped, allowed_roles: &[Seller, Admin] },
    TransitionRule { from: Shipped, to: Completed, allowed_roles: &[Buyer, Admin] },
    // Disputes: buyer-only, reachable from any non-terminal status.
    TransitionRule { from: Pending, to: Disputed, allowed_roles: &[Buyer] },
    TransitionRule { from: Processing, to: Disputed, allowed_roles: &[Buyer] },
    TransitionRule { from: Shipped, to: Disputed, allowed_roles: &[Buyer] },
    // Resolution paths: admin decides refund or release.
    TransitionRule { from: Disputed, to: Refunded, allowed_roles: &[Admin] },
    TransitionRule { from: Disputed, to: Completed, allowed_roles: &[Admin] },
];

/// Look up the rule for an edge; `None` means the transition does not exist.
pub fn rule_for(from: OrderStatus, to: OrderStatus) -> Option<&'static TransitionRule> {
    TRANSITION_TABLE.iter().find(|r| r.from == from && r.to == to)
}

// ============================================================================
// Unit Tests
// ============================================================================
