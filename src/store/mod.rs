// ============================================================================
// Order Store
// ============================================================================
//
// Keyed lookup and upsert of order records. A lookup miss is `Ok(None)`;
// only backend failures surface as `StoreError`.
//
// Implementations:
// - memory - process-local map, used by tests and local runs
// - scylla - `orders` table keyed by order id
//
// ============================================================================

mod memory;
mod scylla_store;

use async_trait::async_trait;

use crate::models::{Order, OrderStatus};

pub use memory::InMemoryOrderStore;
pub use scylla_store::ScyllaOrderStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Order store unavailable: {0}")]
    Unavailable(String),

    #[error("Order store query failed: {0}")]
    Query(String),

    #[error("Stored order {id} is unreadable: {reason}")]
    CorruptRecord { id: i32, reason: String },
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<Order>, StoreError>;

    /// Lookup used for idempotency: only matches when the stored status is `status`.
    async fn find_by_id_and_status(
        &self,
        id: i32,
        status: OrderStatus,
    ) -> Result<Option<Order>, StoreError> {
        Ok(self
            .find_by_id(id)
            .await?
            .filter(|order| order.status == status))
    }

    /// Insert or overwrite the record keyed by `order.id`.
    async fn save(&self, order: &Order) -> Result<(), StoreError>;
}
