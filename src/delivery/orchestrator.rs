use std::sync::Arc;

use super::errors::DeliveryError;
use crate::metrics::DeliveryMetrics;
use crate::models::{DeliveryRequest, Order, OrderStatus};
use crate::resolver::{ResolveContext, StatusResolver};
use crate::store::OrderStore;

// ============================================================================
// Delivery Orchestrator
// ============================================================================
//
// Idempotency check -> status resolution -> upsert, strictly in that order.
// The check runs before the remote call and before any mutation; an order
// already stored with `target_status` is skipped without touching either.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// An order with the target status already exists; nothing was done
    AlreadyProcessed,
    /// The resolved status was persisted
    Processed(Order),
}

pub struct DeliveryOrchestrator {
    store: Arc<dyn OrderStore>,
    resolver: Arc<dyn StatusResolver>,
    target_status: OrderStatus,
    metrics: Arc<DeliveryMetrics>,
}

impl DeliveryOrchestrator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        resolver: Arc<dyn StatusResolver>,
        target_status: OrderStatus,
        metrics: Arc<DeliveryMetrics>,
    ) -> Self {
        Self {
            store,
            resolver,
            target_status,
            metrics,
        }
    }

    pub async fn process(&self, request: &DeliveryRequest) -> Result<ProcessOutcome, DeliveryError> {
        let order_id = request.order_id;

        if self
            .store
            .find_by_id_and_status(order_id, self.target_status)
            .await?
            .is_some()
        {
            tracing::info!(
                order_id = order_id,
                status = %self.target_status,
                "Order already processed, skipping"
            );
            return Ok(ProcessOutcome::AlreadyProcessed);
        }

        let context = ResolveContext {
            delivery_date: request.delivery_date.clone(),
        };
        let status = self
            .resolver
            .resolve(order_id, &context)
            .await
            .inspect_err(|e| {
                self.metrics
                    .record_resolver_failure(self.resolver.name(), e.kind());
            })?;

        let order = Order {
            id: order_id,
            last_updated_date: request.delivery_date.clone(),
            status,
        };
        self.store.save(&order).await?;

        tracing::info!(
            order_id = order_id,
            status = %order.status,
            resolver = self.resolver.name(),
            "✅ Order status updated"
        );

        Ok(ProcessOutcome::Processed(order))
    }
}
