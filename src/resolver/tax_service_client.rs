use async_trait::async_trait;
use std::sync::Arc;

use super::http::{join_url, read_json};
use super::{ResolveContext, ResolverError, StatusResolver};
use crate::config::EndpointConfig;
use crate::metrics::DeliveryMetrics;
use crate::models::{OrderStatus, TaxInvoiceRequest, TaxInvoiceResponse};
use crate::utils::{retry_with_timeout, RetryConfig};

const SERVICE: &str = "tax-service";
const RESOLVER: &str = "raise";

/// Raise strategy: `POST {base_url}/tax/invoices`. A raised invoice means the
/// order moves to `invoiced_status`; the invoice's own status is informational.
pub struct TaxServiceClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
    invoiced_status: OrderStatus,
    metrics: Arc<DeliveryMetrics>,
}

impl TaxServiceClient {
    pub fn new(
        config: &EndpointConfig,
        invoiced_status: OrderStatus,
        metrics: Arc<DeliveryMetrics>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            retry: config.retry_config(),
            invoiced_status,
            metrics,
        }
    }

    pub async fn raise_invoice(
        &self,
        order_id: i32,
        invoice_date: &str,
    ) -> Result<TaxInvoiceResponse, ResolverError> {
        let url = join_url(&self.base_url, "/tax/invoices");
        let request = TaxInvoiceRequest {
            order_id,
            invoice_date: invoice_date.to_string(),
        };
        tracing::info!(order_id = order_id, url = %url, "Raising tax invoice");

        retry_with_timeout(&self.retry, |_attempt| {
            self.metrics.record_resolver_attempt(RESOLVER);
            let sent = self.client.post(&url).json(&request).send();
            async move { read_json::<TaxInvoiceResponse>(SERVICE, order_id, sent.await).await }
        })
        .await
        .map_err(|e| {
            let error = ResolverError::from_retry(SERVICE, e);
            tracing::error!(order_id = order_id, error = %error, "Failed to raise tax invoice");
            error
        })
    }
}

#[async_trait]
impl StatusResolver for TaxServiceClient {
    fn name(&self) -> &'static str {
        RESOLVER
    }

    async fn resolve(
        &self,
        order_id: i32,
        context: &ResolveContext,
    ) -> Result<OrderStatus, ResolverError> {
        let invoice = self.raise_invoice(order_id, &context.delivery_date).await?;

        tracing::info!(
            order_id = order_id,
            invoice_id = %invoice.invoice_id,
            invoice_status = %invoice.status,
            "Tax invoice raised"
        );

        Ok(self.invoiced_status)
    }
}
