use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod codec;
mod config;
mod delivery;
mod messaging;
mod metrics;
mod models;
mod resolver;
mod store;
mod utils;

use config::{ServiceConfig, StoreConfig};
use delivery::DeliveryOrchestrator;
use messaging::{DeliveryListener, KafkaDeliveryConsumer};
use store::{InMemoryOrderStore, OrderStore, ScyllaOrderStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging, overridable with RUST_LOG
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_delivery=debug")),
        )
        .init();

    tracing::info!("🚀 Starting Order Delivery Service");

    let config = ServiceConfig::from_env()?;

    // === 1. Order store ===
    let store: Arc<dyn OrderStore> = match &config.store {
        StoreConfig::Memory => {
            tracing::info!("Using in-memory order store");
            Arc::new(InMemoryOrderStore::new())
        }
        StoreConfig::Scylla { node, keyspace } => {
            Arc::new(ScyllaOrderStore::connect(node, keyspace).await?)
        }
    };

    // === 2. Prometheus metrics ===
    let metrics = Arc::new(metrics::DeliveryMetrics::new()?);

    // Metrics HTTP server runs on its own thread and runtime
    let metrics_registry = metrics.registry().clone();
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Failed to start metrics runtime: {}", e);
                return;
            }
        };
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(metrics_registry, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 3. Status resolver, chosen by configuration ===
    let resolver = resolver::build_resolver(&config.resolver, metrics.clone());

    // === 4. Delivery pipeline ===
    let orchestrator = DeliveryOrchestrator::new(
        store,
        resolver,
        config.target_status,
        metrics.clone(),
    );
    let listener = DeliveryListener::new(
        config.kafka.delivery_topic.clone(),
        orchestrator,
        metrics.clone(),
    );
    let consumer = KafkaDeliveryConsumer::new(&config.kafka, listener, metrics)?;

    tracing::info!(
        topic = %config.kafka.delivery_topic,
        resolver = ?config.resolver.kind(),
        target_status = %config.target_status,
        "⏳ Waiting for delivery events"
    );

    consumer
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("👋 Order Delivery Service stopped");

    Ok(())
}
