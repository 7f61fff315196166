use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::order::{Order, OrderError};
use crate::escrow::EscrowRecord;

use super::{EscrowStore, OrderStore};

// ============================================================================
// In-Memory Stores
// ============================================================================

#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<(), OrderError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(OrderError::Validation(format!("order {} already exists", order.id)));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.orders
            .read()
            .await
            .get(&order_id)
            .cloned()
            .ok_or(OrderError::NotFound(order_id))
    }

    async fn update(&self, order: Order, expected_version: i64) -> Result<Order, OrderError> {
        let mut orders = self.orders.write().await;
        let current = orders.get(&order.id).ok_or(OrderError::NotFound(order.id))?;

        // The CAS guard: the whole read-modify-write is decided here, under
        // the write lock.
        if current.version != expected_version {
            return Err(OrderError::ConcurrencyConflict {
                expected: expected_version,
                actual: current.version,
            });
        }

        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn list_by_buyer(&self, buyer_id: Uuid) -> Result<Vec<Order>, OrderError> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| o.buyer_id == buyer_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn list_by_seller(&self, seller_id: Uuid) -> Result<Vec<Order>, OrderError> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| o.involves_seller(seller_id))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryEscrowStore {
    records: Arc<RwLock<HashMap<(Uuid, Uuid), EscrowRecord>>>,
}

impl InMemoryEscrowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EscrowStore for InMemoryEscrowStore {
    async fn insert(&self, record: EscrowRecord) -> Result<(), OrderError> {
        let mut records = self.records.write().await;
        let key = (record.order_id, record.seller_id);
        if records.contains_key(&key) {
            return Err(OrderError::Validation(format!(
                "escrow record already exists for order {} seller {}",
                record.order_id, record.seller_id
            )));
        }
        records.insert(key, record);
        Ok(())
    }

    async fn get(&self, order_id: Uuid, seller_id: Uuid) -> Result<EscrowRecord, OrderError> {
        self.records
            .read()
            .await
            .get(&(order_id, seller_id))
            .cloned()
            .ok_or(OrderError::NotFound(order_id))
    }

    async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<EscrowRecord>, OrderError> {
        let mut records: Vec<EscrowRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.seller_id);
        Ok(records)
    }

    async fn update(&self, record: EscrowRecord) -> Result<(), OrderError> {
        let mut records = self.records.write().await;
        let key = (record.order_id, record.seller_id);
        if !records.contains_key(&key) {
            return Err(OrderError::NotFound(record.order_id));
        }
        records.insert(key, record);
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
