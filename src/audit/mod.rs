use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::order::ActorRole;

// ============================================================================
// Audit Log - Append-Only Compliance Ledger
// ============================================================================
//
// Every accepted state-machine transition and every escrow side effect
// produces exactly one entry. Entries are never updated or deleted; rejected
// operations write nothing because no order state changed.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Approved,
    Shipped,
    Completed,
    Cancelled,
    Disputed,
    DisputeResolved,
    EscrowHeld,
    EscrowReleased,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub entry_id: Uuid,
    pub order_id: Uuid,
    pub actor_id: Uuid,
    pub actor_role: ActorRole,
    pub action: AuditAction,
    pub amount_involved: Decimal,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

/// Write-only ledger interface. Implementations must append atomically and
/// return entries in ascending timestamp order per order.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(
        &self,
        order_id: Uuid,
        actor_id: Uuid,
        actor_role: ActorRole,
        action: AuditAction,
        amount_involved: Decimal,
        details: String,
    ) -> Uuid;

    async fn list(&self, order_id: Uuid) -> Vec<AuditLogEntry>;
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: Arc<RwLock<HashMap<Uuid, Vec<AuditLogEntry>>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn record(
        &self,
        order_id: Uuid,
        actor_id: Uuid,
        actor_role: ActorRole,
        action: AuditAction,
        amount_involved: Decimal,
        details: String,
    ) -> Uuid {
        let entry = AuditLogEntry {
            entry_id: Uuid::new_v4(),
            order_id,
            actor_id,
            actor_role,
            action,
            amount_involved,
            timestamp: Utc::now(),
            details,
        };

        tracing::info!(
            order_id = %order_id,
            actor_id = %actor_id,
            action = ?action,
            amount = %amount_involved,
            "Audit entry recorded"
        );

        let entry_id = entry.entry_id;
        self.entries.write().await.entry(order_id).or_default().push(entry);
        entry_id
    }

    async fn list(&self, order_id: Uuid) -> Vec<AuditLogEntry> {
        let mut entries = self
            .entries
            .read()
            .await
            .get(&order_id)
            .cloned()
            .unwrap_or_default();
        // Appends are already chronological; the stable sort keeps insertion
        // order for same-millisecond entries.
        entries.sort_by_key(|e| e.timestamp);
        entries
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_list_in_order() {
        let log = InMemoryAuditLog::new();
        let order_id = Uuid::new_v4();
        let actor = Uuid::new_v4();

        log.record(order_id, actor, ActorRole::Buyer, AuditAction::Created, Decimal::from(450), "order created".into())
            .await;
        log.record(order_id, actor, ActorRole::Admin, AuditAction::Approved, Decimal::ZERO, "approved".into())
            .await;

        let entries = log.list(order_id).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::Created);
        assert_eq!(entries[1].action, AuditAction::Approved);
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[tokio::test]
    async fn test_entries_scoped_per_order() {
        let log = InMemoryAuditLog::new();
        let order_a = Uuid::new_v4();
        let order_b = Uuid::new_v4();
        let actor = Uuid::new_v4();

        log.record(order_a, actor, ActorRole::Buyer, AuditAction::Created, Decimal::from(100), "a".into())
            .await;

        assert_eq!(log.list(order_a).await.len(), 1);
        assert!(log.list(order_b).await.is_empty());
    }

    #[tokio::test]
    async fn test_entry_ids_are_unique() {
        let log = InMemoryAuditLog::new();
        let order_id = Uuid::new_v4();
        let actor = Uuid::new_v4();

        let a = log
            .record(order_id, actor, ActorRole::Buyer, AuditAction::Created, Decimal::ZERO, "".into())
            .await;
        let b = log
            .record(order_id, actor, ActorRole::Buyer, AuditAction::Disputed, Decimal::ZERO, "".into())
            .await;

        assert_ne!(a, b);
    }
}
