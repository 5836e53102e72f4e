use rdkafka::error::KafkaError;

use super::ack::MessagePosition;
use crate::delivery::DeliveryError;

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("Kafka client error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Failed to commit offset {} of {}[{}]: {message}", .position.offset, .position.topic, .position.partition)]
    Commit {
        position: MessagePosition,
        message: String,
    },

    #[error("Failed to rewind {}[{}] to offset {}: {message}", .position.topic, .position.partition, .position.offset)]
    Seek {
        position: MessagePosition,
        message: String,
    },
}

/// Failure of one message. The acknowledgment has not been committed, so the
/// message must be redelivered.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Delivery processing failed: {0}")]
    Processing(#[from] DeliveryError),

    #[error("Acknowledgment failed: {0}")]
    Acknowledge(#[from] ConsumerError),
}
