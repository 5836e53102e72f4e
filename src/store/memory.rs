use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{OrderStore, StoreError};
use crate::models::Order;

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<i32, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_by_id(&self, id: i32) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        self.orders.write().await.insert(order.id, order.clone());

        tracing::debug!(
            order_id = order.id,
            status = %order.status,
            "Order saved to in-memory store"
        );

        Ok(())
    }
}
