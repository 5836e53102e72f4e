// ============================================================================
// Status Resolver
// ============================================================================
//
// The single blocking remote call made while processing a delivery event.
// Two interchangeable strategies implement the same contract:
//
// - fetch - OrderStatusClient reads the status from the order status service
// - raise - TaxServiceClient raises a tax invoice; success yields a fixed status
//
// The strategy is picked once at startup (`build_resolver`). Every attempt is
// bounded by the configured timeout, and timeouts count toward the retry
// budget.
//
// ============================================================================

mod http;
mod order_status_client;
mod tax_service_client;

#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ResolverConfig;
use crate::metrics::DeliveryMetrics;
use crate::models::OrderStatus;
use crate::utils::RetryError;

pub use order_status_client::OrderStatusClient;
pub use tax_service_client::TaxServiceClient;

/// Per-request data a resolver may need beyond the order id.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub delivery_date: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("{service} request failed: {message}")]
    Transport { service: &'static str, message: String },

    #[error("{service} responded with HTTP {status}")]
    UnexpectedStatus { service: &'static str, status: u16 },

    #[error("{service} returned an empty response for order {order_id}")]
    EmptyResponse { service: &'static str, order_id: i32 },

    #[error("{service} returned an undecodable response: {message}")]
    InvalidResponse { service: &'static str, message: String },

    #[error("{service} timed out after {attempts} attempt(s)")]
    TimedOut { service: &'static str, attempts: u32 },

    #[error("Unknown status '{status}' for order {order_id}")]
    UnknownStatus { order_id: i32, status: String },
}

impl ResolverError {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ResolverError::Transport { .. } => "transport",
            ResolverError::UnexpectedStatus { .. } => "unexpected_status",
            ResolverError::EmptyResponse { .. } => "empty_response",
            ResolverError::InvalidResponse { .. } => "invalid_response",
            ResolverError::TimedOut { .. } => "timeout",
            ResolverError::UnknownStatus { .. } => "unknown_status",
        }
    }

    pub(crate) fn from_retry(service: &'static str, error: RetryError<ResolverError>) -> Self {
        match error {
            RetryError::TimedOut { attempts, .. } => ResolverError::TimedOut { service, attempts },
            RetryError::Failed { error, .. } => error,
        }
    }
}

#[async_trait]
pub trait StatusResolver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(
        &self,
        order_id: i32,
        context: &ResolveContext,
    ) -> Result<OrderStatus, ResolverError>;
}

pub fn build_resolver(
    config: &ResolverConfig,
    metrics: Arc<DeliveryMetrics>,
) -> Arc<dyn StatusResolver> {
    let resolver: Arc<dyn StatusResolver> = match config {
        ResolverConfig::Fetch {
            order_status_service,
        } => Arc::new(OrderStatusClient::new(order_status_service, metrics)),
        ResolverConfig::Raise {
            tax_service,
            invoiced_status,
        } => Arc::new(TaxServiceClient::new(tax_service, *invoiced_status, metrics)),
    };

    tracing::info!(resolver = resolver.name(), "Status resolver selected");
    resolver
}
