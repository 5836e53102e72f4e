use async_trait::async_trait;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use std::sync::Arc;

use super::{OrderStore, StoreError};
use crate::models::{Order, OrderStatus};

// ============================================================================
// ScyllaDB Order Store
// ============================================================================
//
// Schema:
//   orders (id int PRIMARY KEY, last_updated_date text, status text)
//
// INSERT in CQL is an upsert, so `save` overwrites any existing row for the
// same id. The (id, status) lookup reads by primary key and filters the
// status client-side rather than scanning with ALLOW FILTERING.
//
// ============================================================================

const CREATE_ORDERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS orders (
    id int PRIMARY KEY,
    last_updated_date text,
    status text
)";

pub struct ScyllaOrderStore {
    session: Arc<Session>,
}

impl ScyllaOrderStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Connect to `node`, ensure the keyspace and table exist, and switch to the keyspace.
    pub async fn connect(node: &str, keyspace: &str) -> Result<Self, StoreError> {
        tracing::info!(node = %node, keyspace = %keyspace, "Connecting to ScyllaDB...");

        let session: Session = SessionBuilder::new()
            .known_node(node)
            .build()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {keyspace} WITH REPLICATION = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}"
                ),
                &[],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to create keyspace: {}", e)))?;

        session
            .use_keyspace(keyspace, false)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to use keyspace: {}", e)))?;

        session
            .query_unpaged(CREATE_ORDERS_TABLE, &[])
            .await
            .map_err(|e| StoreError::Query(format!("Failed to create orders table: {}", e)))?;

        Ok(Self::new(Arc::new(session)))
    }
}

fn order_from_row(row: (i32, String, String)) -> Result<Order, StoreError> {
    let (id, last_updated_date, status) = row;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::CorruptRecord {
            id,
            reason: e.to_string(),
        })?;

    Ok(Order {
        id,
        last_updated_date,
        status,
    })
}

/// A lookup that did not come back as rows is a failed query, never a miss.
fn lookup_rows<R, E: std::fmt::Display>(id: i32, result: Result<R, E>) -> Result<R, StoreError> {
    result.map_err(|e| StoreError::Query(format!("Lookup of order {id} returned no rows: {e}")))
}

#[async_trait]
impl OrderStore for ScyllaOrderStore {
    async fn find_by_id(&self, id: i32) -> Result<Option<Order>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT id, last_updated_date, status FROM orders WHERE id = ?",
                (id,),
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query order: {}", e)))?;

        let rows_result = lookup_rows(id, result.into_rows_result())?;

        let mut rows = rows_result
            .rows::<(i32, String, String)>()
            .map_err(|e| StoreError::Query(format!("Failed to get rows: {}", e)))?;

        match rows.next() {
            Some(row) => {
                let row = row.map_err(|e| StoreError::CorruptRecord {
                    id,
                    reason: e.to_string(),
                })?;
                order_from_row(row).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        self.session
            .query_unpaged(
                "INSERT INTO orders (id, last_updated_date, status) VALUES (?, ?, ?)",
                (order.id, &order.last_updated_date, order.status.as_str()),
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to upsert order: {}", e)))?;

        tracing::debug!(
            order_id = order.id,
            status = %order.status,
            "Order upserted in ScyllaDB"
        );

        Ok(())
    }
}
