use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    error::KafkaResult,
    message::Message,
    Offset, TopicPartitionList,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::ack::{Acknowledgment, MessagePosition, OffsetCommitter};
use super::errors::{ConsumerError, ListenerError};
use super::listener::DeliveryListener;
use crate::config::KafkaConfig;
use crate::metrics::DeliveryMetrics;

// ============================================================================
// Kafka Delivery Consumer
// ============================================================================
//
// Thin runtime over rdkafka's StreamConsumer with auto-commit disabled.
// Offsets move only through Acknowledgment. When the listener returns an
// error the message stays uncommitted; after `redelivery_backoff` the
// partition is rewound to that offset so the same message is consumed again.
//
// A rewind the client rejects never stops the consumer. The partition is
// held back instead: later messages on it are left uncommitted until a
// rewind succeeds or the broker itself serves the failed offset again.
//
// ============================================================================

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Commits `offset + 1` for the message's partition, synchronously.
pub struct KafkaOffsetCommitter {
    consumer: Arc<StreamConsumer>,
}

impl KafkaOffsetCommitter {
    pub fn new(consumer: Arc<StreamConsumer>) -> Self {
        Self { consumer }
    }
}

fn commit_list(position: &MessagePosition) -> KafkaResult<TopicPartitionList> {
    let mut list = TopicPartitionList::new();
    list.add_partition_offset(
        &position.topic,
        position.partition,
        Offset::Offset(position.offset + 1),
    )?;
    Ok(list)
}

impl OffsetCommitter for KafkaOffsetCommitter {
    fn commit(&self, position: &MessagePosition) -> Result<(), ConsumerError> {
        let list = commit_list(position)?;
        self.consumer
            .commit(&list, CommitMode::Sync)
            .map_err(|e| ConsumerError::Commit {
                position: position.clone(),
                message: e.to_string(),
            })
    }
}

/// Moves a partition's fetch position back to a message so it is consumed again.
pub trait PartitionRewinder: Send + Sync {
    fn rewind(&self, position: &MessagePosition) -> Result<(), ConsumerError>;
}

pub struct KafkaPartitionRewinder {
    consumer: Arc<StreamConsumer>,
}

impl PartitionRewinder for KafkaPartitionRewinder {
    fn rewind(&self, position: &MessagePosition) -> Result<(), ConsumerError> {
        self.consumer
            .seek(
                &position.topic,
                position.partition,
                Offset::Offset(position.offset),
                SEEK_TIMEOUT,
            )
            .map_err(|e| ConsumerError::Seek {
                position: position.clone(),
                message: e.to_string(),
            })
    }
}

fn rewind(
    rewinder: &dyn PartitionRewinder,
    position: &MessagePosition,
    metrics: &DeliveryMetrics,
) -> bool {
    match rewinder.rewind(position) {
        Ok(()) => {
            metrics.record_redelivery();
            tracing::debug!(
                topic = %position.topic,
                partition = position.partition,
                offset = position.offset,
                "Partition rewound for redelivery"
            );
            true
        }
        Err(e) => {
            metrics.record_rewind_failure();
            tracing::warn!(
                error = %e,
                topic = %position.topic,
                partition = position.partition,
                offset = position.offset,
                "Rewind failed, holding partition until it succeeds"
            );
            false
        }
    }
}

/// Failed offsets whose rewind has not gone through yet, per partition.
#[derive(Default)]
struct PendingRedeliveries {
    pending: HashMap<(String, i32), MessagePosition>,
}

impl PendingRedeliveries {
    /// Rewind to a failed message, remembering it if the rewind is rejected.
    fn redeliver(
        &mut self,
        rewinder: &dyn PartitionRewinder,
        position: &MessagePosition,
        metrics: &DeliveryMetrics,
    ) {
        if !rewind(rewinder, position, metrics) {
            self.pending.insert(
                (position.topic.clone(), position.partition),
                position.clone(),
            );
        }
    }

    /// Whether `position` may be handled now. A message past a pending failed
    /// offset is skipped without an ack, and the rewind is attempted again.
    fn admit(
        &mut self,
        rewinder: &dyn PartitionRewinder,
        position: &MessagePosition,
        metrics: &DeliveryMetrics,
    ) -> bool {
        let key = (position.topic.clone(), position.partition);
        let Some(failed) = self.pending.get(&key).cloned() else {
            return true;
        };

        if position.offset <= failed.offset {
            self.pending.remove(&key);
            return true;
        }

        if rewind(rewinder, &failed, metrics) {
            self.pending.remove(&key);
        }
        false
    }
}

pub struct KafkaDeliveryConsumer {
    consumer: Arc<StreamConsumer>,
    listener: DeliveryListener,
    redelivery_backoff: Duration,
    metrics: Arc<DeliveryMetrics>,
}

impl KafkaDeliveryConsumer {
    pub fn new(
        config: &KafkaConfig,
        listener: DeliveryListener,
        metrics: Arc<DeliveryMetrics>,
    ) -> Result<Self, ConsumerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .create()?;

        consumer.subscribe(&[config.delivery_topic.as_str()])?;

        tracing::info!(
            brokers = %config.bootstrap_servers,
            group_id = %config.group_id,
            topic = %config.delivery_topic,
            "Subscribed to delivery topic"
        );

        Ok(Self {
            consumer: Arc::new(consumer),
            listener,
            redelivery_backoff: config.redelivery_backoff,
            metrics,
        })
    }

    /// Consume until `shutdown` resolves. Messages are handled one at a time.
    pub async fn run<S>(&self, shutdown: S) -> Result<(), ConsumerError>
    where
        S: Future<Output = ()>,
    {
        let committer: Arc<dyn OffsetCommitter> =
            Arc::new(KafkaOffsetCommitter::new(self.consumer.clone()));
        let rewinder = KafkaPartitionRewinder {
            consumer: self.consumer.clone(),
        };
        let mut redeliveries = PendingRedeliveries::default();
        tokio::pin!(shutdown);

        loop {
            let received = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("🛑 Shutdown requested, stopping delivery consumer");
                    return Ok(());
                }
                received = self.consumer.recv() => received,
            };

            let message = match received {
                Ok(message) => message.detach(),
                Err(e) => {
                    tracing::error!(error = %e, "Kafka receive error");
                    tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                    continue;
                }
            };

            let position = MessagePosition {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            };
            if !redeliveries.admit(&rewinder, &position, &self.metrics) {
                continue;
            }

            let ack = Acknowledgment::new(position.clone(), committer.clone());

            if let Err(e) = self
                .listener
                .on_message(message.topic(), message.payload(), ack)
                .await
            {
                if matches!(e, ListenerError::Acknowledge(_)) {
                    self.metrics.record_commit_failure();
                }
                tracing::warn!(
                    error = %e,
                    topic = %position.topic,
                    partition = position.partition,
                    offset = position.offset,
                    backoff_ms = self.redelivery_backoff.as_millis(),
                    "Message not acknowledged, scheduling redelivery"
                );
                tokio::time::sleep(self.redelivery_backoff).await;
                redeliveries.redeliver(&rewinder, &position, &self.metrics);
            }
        }
    }
}
