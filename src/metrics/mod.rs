// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the delivery pipeline
// ============================================================================
//
// Tracks:
// - Inbound delivery messages by outcome, with processing latency
// - Status resolver attempts by resolver, and failures by resolver and kind
// - Redeliveries, failed rewinds and offset commit failures in the broker runtime
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Outcome label for one inbound message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageOutcome {
    Processed,
    AlreadyProcessed,
    DecodeFailed,
    Failed,
    Ignored,
}

impl MessageOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            MessageOutcome::Processed => "processed",
            MessageOutcome::AlreadyProcessed => "already_processed",
            MessageOutcome::DecodeFailed => "decode_failed",
            MessageOutcome::Failed => "failed",
            MessageOutcome::Ignored => "ignored",
        }
    }
}

pub struct DeliveryMetrics {
    registry: Registry,

    pub messages_total: IntCounterVec,
    pub processing_duration: HistogramVec,
    pub resolver_attempts: IntCounterVec,
    pub resolver_failures: IntCounterVec,
    pub redeliveries_total: IntCounter,
    pub rewind_failures_total: IntCounter,
    pub commit_failures_total: IntCounter,
}

impl DeliveryMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let messages_total = IntCounterVec::new(
            Opts::new("delivery_messages_total", "Delivery messages handled, by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(messages_total.clone()))?;

        let processing_duration = HistogramVec::new(
            HistogramOpts::new(
                "delivery_processing_duration_seconds",
                "Time from receipt to acknowledgment decision",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(processing_duration.clone()))?;

        let resolver_attempts = IntCounterVec::new(
            Opts::new(
                "status_resolver_attempts_total",
                "Remote calls made by the status resolver, retries included",
            ),
            &["resolver"],
        )?;
        registry.register(Box::new(resolver_attempts.clone()))?;

        let resolver_failures = IntCounterVec::new(
            Opts::new("status_resolver_failures_total", "Status resolver failures"),
            &["resolver", "kind"],
        )?;
        registry.register(Box::new(resolver_failures.clone()))?;

        let redeliveries_total = IntCounter::new(
            "delivery_redeliveries_total",
            "Messages rewound for redelivery after a processing failure",
        )?;
        registry.register(Box::new(redeliveries_total.clone()))?;

        let rewind_failures_total = IntCounter::new(
            "delivery_rewind_failures_total",
            "Partition seeks for redelivery that the broker client rejected",
        )?;
        registry.register(Box::new(rewind_failures_total.clone()))?;

        let commit_failures_total = IntCounter::new(
            "delivery_offset_commit_failures_total",
            "Offset commits rejected by the broker",
        )?;
        registry.register(Box::new(commit_failures_total.clone()))?;

        Ok(Self {
            registry,
            messages_total,
            processing_duration,
            resolver_attempts,
            resolver_failures,
            redeliveries_total,
            rewind_failures_total,
            commit_failures_total,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_message(&self, outcome: MessageOutcome, duration_secs: f64) {
        let label = outcome.as_label();
        self.messages_total.with_label_values(&[label]).inc();
        self.processing_duration
            .with_label_values(&[label])
            .observe(duration_secs);
    }

    pub fn record_resolver_attempt(&self, resolver: &str) {
        self.resolver_attempts.with_label_values(&[resolver]).inc();
    }

    pub fn record_resolver_failure(&self, resolver: &str, kind: &str) {
        self.resolver_failures
            .with_label_values(&[resolver, kind])
            .inc();
    }

    pub fn record_redelivery(&self) {
        self.redeliveries_total.inc();
    }

    pub fn record_rewind_failure(&self) {
        self.rewind_failures_total.inc();
    }

    pub fn record_commit_failure(&self) {
        self.commit_failures_total.inc();
    }
}
