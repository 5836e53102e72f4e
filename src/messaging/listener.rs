use std::sync::Arc;
use std::time::Instant;

use super::ack::Acknowledgment;
use super::errors::ListenerError;
use crate::codec::decode_delivery_request;
use crate::delivery::{DeliveryOrchestrator, ProcessOutcome};
use crate::metrics::{DeliveryMetrics, MessageOutcome};

// ============================================================================
// Delivery Listener
// ============================================================================
//
// Acknowledgment discipline, per message:
// - undecodable payload  -> acknowledge and discard (never blocks the partition)
// - processed / skipped  -> acknowledge after the store write completes
// - processing failure   -> return the error without acknowledging
//
// Messages from any topic other than the delivery topic are ignored.
//
// ============================================================================

pub struct DeliveryListener {
    delivery_topic: String,
    orchestrator: DeliveryOrchestrator,
    metrics: Arc<DeliveryMetrics>,
}

impl DeliveryListener {
    pub fn new(
        delivery_topic: impl Into<String>,
        orchestrator: DeliveryOrchestrator,
        metrics: Arc<DeliveryMetrics>,
    ) -> Self {
        Self {
            delivery_topic: delivery_topic.into(),
            orchestrator,
            metrics,
        }
    }

    pub async fn on_message(
        &self,
        topic: &str,
        payload: Option<&[u8]>,
        ack: Acknowledgment,
    ) -> Result<(), ListenerError> {
        let started = Instant::now();

        let result = if topic == self.delivery_topic {
            self.initiate_order_delivery(payload, ack).await
        } else {
            tracing::warn!(topic = %topic, "Message from unhandled topic ignored");
            Ok(MessageOutcome::Ignored)
        };

        let outcome = match &result {
            Ok(outcome) => *outcome,
            Err(_) => MessageOutcome::Failed,
        };
        self.metrics
            .record_message(outcome, started.elapsed().as_secs_f64());

        result.map(|_| ())
    }

    async fn initiate_order_delivery(
        &self,
        payload: Option<&[u8]>,
        ack: Acknowledgment,
    ) -> Result<MessageOutcome, ListenerError> {
        let raw = payload.map(String::from_utf8_lossy).unwrap_or_default();
        tracing::info!(
            topic = %self.delivery_topic,
            offset = ack.position().offset,
            payload = %raw,
            "Received delivery message"
        );

        let request = match decode_delivery_request(payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    payload = %raw,
                    "Failed to parse message, acknowledging to skip"
                );
                ack.acknowledge()?;
                return Ok(MessageOutcome::DecodeFailed);
            }
        };

        match self.orchestrator.process(&request).await {
            Ok(outcome) => {
                ack.acknowledge()?;
                Ok(match outcome {
                    ProcessOutcome::AlreadyProcessed => MessageOutcome::AlreadyProcessed,
                    ProcessOutcome::Processed(_) => MessageOutcome::Processed,
                })
            }
            Err(e) => {
                tracing::error!(
                    order_id = request.order_id,
                    error = %e,
                    "Error processing message, will retry"
                );
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::orchestrator::tests::{request, ScriptedResolver};
    use crate::delivery::DeliveryError;
    use crate::messaging::ack::tests::{position, RecordingCommitter};
    use crate::messaging::ack::OffsetCommitter;
    use crate::messaging::errors::ConsumerError;
    use crate::models::{Order, OrderStatus};
    use crate::resolver::test_support::{endpoint, metrics, order_status_service, Reply};
    use crate::resolver::{OrderStatusClient, ResolverError, StatusResolver};
    use crate::store::{InMemoryOrderStore, OrderStore};

    const TOPIC: &str = "out-for-delivery-orders";
    const ORDER_42: &[u8] =
        br#"{"orderId":42,"deliveryAddress":"1 Main St","deliveryDate":"2024-01-01"}"#;

    struct Harness {
        listener: DeliveryListener,
        store: Arc<InMemoryOrderStore>,
        committer: Arc<RecordingCommitter>,
        metrics: Arc<DeliveryMetrics>,
    }

    impl Harness {
        fn new(resolver: Arc<dyn StatusResolver>) -> Self {
            Self::with_committer(resolver, RecordingCommitter::default())
        }

        fn with_committer(resolver: Arc<dyn StatusResolver>, committer: RecordingCommitter) -> Self {
            let store = Arc::new(InMemoryOrderStore::new());
            let metrics = Arc::new(DeliveryMetrics::new().unwrap());
            let orchestrator = DeliveryOrchestrator::new(
                store.clone(),
                resolver,
                OrderStatus::Shipped,
                metrics.clone(),
            );

            Self {
                listener: DeliveryListener::new(TOPIC, orchestrator, metrics.clone()),
                store,
                committer: Arc::new(committer),
                metrics,
            }
        }

        fn ack(&self, offset: i64) -> Acknowledgment {
            let committer: Arc<dyn OffsetCommitter> = self.committer.clone();
            Acknowledgment::new(position(offset), committer)
        }

        async fn deliver(&self, offset: i64, payload: &[u8]) -> Result<(), ListenerError> {
            self.listener
                .on_message(TOPIC, Some(payload), self.ack(offset))
                .await
        }

        fn committed_offsets(&self) -> Vec<i64> {
            self.committer.commits().iter().map(|p| p.offset).collect()
        }

        fn outcome_count(&self, outcome: MessageOutcome) -> u64 {
            self.metrics
                .messages_total
                .with_label_values(&[outcome.as_label()])
                .get()
        }
    }

    fn shipped_42() -> Order {
        Order {
            id: 42,
            last_updated_date: "2024-01-01".to_string(),
            status: OrderStatus::Shipped,
        }
    }

    #[tokio::test]
    async fn test_processed_message_is_acknowledged_once() {
        let harness = Harness::new(ScriptedResolver::new(|_| Ok(OrderStatus::Shipped)));

        harness.deliver(0, ORDER_42).await.unwrap();

        assert_eq!(harness.committed_offsets(), vec![0]);
        assert_eq!(harness.store.find_by_id(42).await.unwrap(), Some(shipped_42()));
        assert_eq!(harness.outcome_count(MessageOutcome::Processed), 1);
    }

    #[tokio::test]
    async fn test_malformed_message_does_not_block_next_one() {
        let resolver = ScriptedResolver::new(|_| Ok(OrderStatus::Shipped));
        let harness = Harness::new(resolver.clone());

        harness
            .deliver(0, br#"{"orderId":42,"deliveryAddress":null}"#)
            .await
            .unwrap();
        harness.deliver(1, ORDER_42).await.unwrap();

        assert_eq!(harness.committed_offsets(), vec![0, 1]);
        assert_eq!(resolver.calls(), 1);
        assert_eq!(harness.store.find_by_id(42).await.unwrap(), Some(shipped_42()));
        assert_eq!(harness.outcome_count(MessageOutcome::DecodeFailed), 1);
    }

    #[tokio::test]
    async fn test_missing_payload_is_acknowledged_and_dropped() {
        let harness = Harness::new(ScriptedResolver::new(|_| Ok(OrderStatus::Shipped)));

        harness
            .listener
            .on_message(TOPIC, None, harness.ack(5))
            .await
            .unwrap();

        assert_eq!(harness.committed_offsets(), vec![5]);
        assert_eq!(harness.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_redelivery_is_acknowledged_without_resolver_call() {
        let resolver = ScriptedResolver::new(|_| Ok(OrderStatus::Shipped));
        let harness = Harness::new(resolver.clone());

        harness.deliver(0, ORDER_42).await.unwrap();
        harness.deliver(0, ORDER_42).await.unwrap();

        assert_eq!(resolver.calls(), 1);
        assert_eq!(harness.committed_offsets(), vec![0, 0]);
        assert_eq!(harness.store.len().await, 1);
        assert_eq!(harness.store.find_by_id(42).await.unwrap(), Some(shipped_42()));
        assert_eq!(harness.outcome_count(MessageOutcome::AlreadyProcessed), 1);
    }

    #[tokio::test]
    async fn test_resolver_failure_withholds_acknowledgment() {
        let harness = Harness::new(ScriptedResolver::new(|_| {
            Err(ResolverError::Transport {
                service: "tax-service",
                message: "connection reset".to_string(),
            })
        }));

        let result = harness.deliver(0, ORDER_42).await;

        assert!(matches!(
            result,
            Err(ListenerError::Processing(DeliveryError::Resolver(_)))
        ));
        assert!(harness.committed_offsets().is_empty());
        assert_eq!(harness.store.len().await, 0);
        assert_eq!(harness.outcome_count(MessageOutcome::Failed), 1);
    }

    #[tokio::test]
    async fn test_commit_failure_is_surfaced_for_redelivery() {
        let harness = Harness::with_committer(
            ScriptedResolver::new(|_| Ok(OrderStatus::Shipped)),
            RecordingCommitter::rejecting(),
        );

        let result = harness.deliver(0, ORDER_42).await;

        assert!(matches!(
            result,
            Err(ListenerError::Acknowledge(ConsumerError::Commit { .. }))
        ));
        // The write happened; redelivery will hit the idempotency check
        assert_eq!(harness.store.find_by_id(42).await.unwrap(), Some(shipped_42()));
    }

    #[tokio::test]
    async fn test_other_topics_are_ignored() {
        let resolver = ScriptedResolver::new(|_| Ok(OrderStatus::Shipped));
        let harness = Harness::new(resolver.clone());

        harness
            .listener
            .on_message("new-orders", Some(ORDER_42), harness.ack(0))
            .await
            .unwrap();

        assert_eq!(resolver.calls(), 0);
        assert!(harness.committed_offsets().is_empty());
        assert_eq!(harness.outcome_count(MessageOutcome::Ignored), 1);
    }

    #[tokio::test]
    async fn test_fetch_resolver_end_to_end() {
        let upstream = order_status_service(Reply::Json(r#"{"status":"SHIPPED"}"#)).await;
        let resolver = Arc::new(OrderStatusClient::new(
            &endpoint(&upstream.base_url, 1),
            metrics(),
        ));
        let harness = Harness::new(resolver);

        harness.deliver(0, ORDER_42).await.unwrap();
        harness.deliver(0, ORDER_42).await.unwrap();

        assert_eq!(upstream.hits(), 1);
        assert_eq!(harness.committed_offsets(), vec![0, 0]);
        assert_eq!(harness.store.find_by_id(42).await.unwrap(), Some(shipped_42()));
    }

    #[tokio::test]
    async fn test_unknown_fetched_status_is_not_acknowledged() {
        let upstream = order_status_service(Reply::Json(r#"{"status":"FLYING"}"#)).await;
        let resolver = Arc::new(OrderStatusClient::new(
            &endpoint(&upstream.base_url, 1),
            metrics(),
        ));
        let harness = Harness::new(resolver);

        let result = harness.deliver(0, ORDER_42).await;

        assert!(matches!(
            result,
            Err(ListenerError::Processing(DeliveryError::Resolver(
                ResolverError::UnknownStatus { .. }
            )))
        ));
        assert!(harness.committed_offsets().is_empty());
        assert_eq!(harness.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_resolver_timeout_is_not_acknowledged() {
        let upstream = order_status_service(Reply::Hang).await;
        let resolver = Arc::new(OrderStatusClient::new(
            &endpoint(&upstream.base_url, 1),
            metrics(),
        ));
        let harness = Harness::new(resolver);

        let result = harness.deliver(0, ORDER_42).await;

        assert!(matches!(
            result,
            Err(ListenerError::Processing(DeliveryError::Resolver(
                ResolverError::TimedOut { attempts: 2, .. }
            )))
        ));
        assert!(harness.committed_offsets().is_empty());
        assert_eq!(harness.store.len().await, 0);
    }

    #[test]
    fn test_request_helper_matches_fixture() {
        let decoded = crate::codec::decode_delivery_request(Some(ORDER_42)).unwrap();
        assert_eq!(decoded, request(42));
    }
}
