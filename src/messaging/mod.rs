// ============================================================================
// Messaging
// ============================================================================
//
// Broker-facing side of the service:
// - ack            - single-use acknowledgment handle and offset committer seam
// - listener       - per-message decode, dispatch and ack decision
// - kafka_consumer - rdkafka runtime with manual commit and rewind-based redelivery
//
// ============================================================================

mod ack;
mod errors;
mod kafka_consumer;
mod listener;

pub use kafka_consumer::KafkaDeliveryConsumer;
pub use listener::DeliveryListener;
