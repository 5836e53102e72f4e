use async_trait::async_trait;
use std::sync::Arc;

use super::http::{join_url, read_json};
use super::{ResolveContext, ResolverError, StatusResolver};
use crate::config::EndpointConfig;
use crate::metrics::DeliveryMetrics;
use crate::models::{OrderStatus, OrderStatusResponse};
use crate::utils::{retry_with_timeout, RetryConfig};

const SERVICE: &str = "order-status-service";
const RESOLVER: &str = "fetch";

/// Fetch strategy: `GET {base_url}/orders/{order_id}/status` -> `{"status": "..."}`.
pub struct OrderStatusClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
    metrics: Arc<DeliveryMetrics>,
}

impl OrderStatusClient {
    pub fn new(config: &EndpointConfig, metrics: Arc<DeliveryMetrics>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            retry: config.retry_config(),
            metrics,
        }
    }

    fn status_url(&self, order_id: i32) -> String {
        join_url(&self.base_url, &format!("/orders/{order_id}/status"))
    }

    pub async fn fetch_status(&self, order_id: i32) -> Result<OrderStatus, ResolverError> {
        let url = self.status_url(order_id);
        tracing::info!(order_id = order_id, url = %url, "Fetching order status");

        let response: OrderStatusResponse = retry_with_timeout(&self.retry, |_attempt| {
            self.metrics.record_resolver_attempt(RESOLVER);
            let sent = self.client.get(&url).send();
            async move { read_json::<OrderStatusResponse>(SERVICE, order_id, sent.await).await }
        })
        .await
        .map_err(|e| {
            let error = ResolverError::from_retry(SERVICE, e);
            tracing::error!(order_id = order_id, error = %error, "Failed to fetch order status");
            error
        })?;

        // Parsed after the retry loop: an unknown value is not retried
        let status = response.status.parse::<OrderStatus>().map_err(|_| {
            tracing::error!(
                order_id = order_id,
                status = %response.status,
                "Unknown status value for order"
            );
            ResolverError::UnknownStatus {
                order_id,
                status: response.status.clone(),
            }
        })?;

        tracing::info!(order_id = order_id, status = %status, "Fetched order status");
        Ok(status)
    }
}

#[async_trait]
impl StatusResolver for OrderStatusClient {
    fn name(&self) -> &'static str {
        RESOLVER
    }

    async fn resolve(
        &self,
        order_id: i32,
        _context: &ResolveContext,
    ) -> Result<OrderStatus, ResolverError> {
        self.fetch_status(order_id).await
    }
}
