use std::time::Duration;

use crate::models::OrderStatus;
use crate::utils::RetryConfig;

// ============================================================================
// Service Configuration
// ============================================================================
//
// Read once at startup from environment variables. Unset or blank variables
// fall back to defaults; a variable that is set but cannot be parsed is an
// error, as is a missing base URL for the selected resolver.
//
// ============================================================================

pub const DEFAULT_DELIVERY_TOPIC: &str = "out-for-delivery-orders";
const DEFAULT_TIMEOUT_SECONDS: u64 = 3;
const DEFAULT_RETRY_ATTEMPTS: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub group_id: String,
    pub delivery_topic: String,
    /// Pause before a failed message is redelivered
    pub redelivery_backoff: Duration,
}

/// One remote endpoint: base URL plus the per-call timeout/retry policy.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
}

impl EndpointConfig {
    pub fn retry_config(&self) -> RetryConfig {
        let retry = RetryConfig::immediate(self.timeout, self.retry_attempts);
        if self.retry_backoff.is_zero() {
            retry
        } else {
            retry.with_backoff(self.retry_backoff, self.retry_backoff * 8, 2.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolverKind {
    Fetch,
    Raise,
}

#[derive(Debug, Clone)]
pub enum ResolverConfig {
    Fetch {
        order_status_service: EndpointConfig,
    },
    Raise {
        tax_service: EndpointConfig,
        invoiced_status: OrderStatus,
    },
}

impl ResolverConfig {
    pub fn kind(&self) -> ResolverKind {
        match self {
            ResolverConfig::Fetch { .. } => ResolverKind::Fetch,
            ResolverConfig::Raise { .. } => ResolverKind::Raise,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    Memory,
    Scylla { node: String, keyspace: String },
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub kafka: KafkaConfig,
    pub resolver: ResolverConfig,
    /// Status whose presence marks a delivery event as already processed
    pub target_status: OrderStatus,
    pub store: StoreConfig,
    pub metrics_port: u16,
}

impl ServiceConfig {
    /// Load configuration from the process environment.
    ///
    /// Recognised variables:
    /// - `KAFKA_BOOTSTRAP_SERVERS` (default: 127.0.0.1:9092)
    /// - `KAFKA_GROUP_ID` (default: order-delivery-service)
    /// - `KAFKA_DELIVERY_TOPIC` (default: out-for-delivery-orders)
    /// - `KAFKA_REDELIVERY_BACKOFF_MS` (default: 1000)
    /// - `STATUS_RESOLVER` (fetch | raise, default: raise)
    /// - `ORDER_STATUS_SERVICE_BASE_URL`, `ORDER_STATUS_SERVICE_TIMEOUT_SECONDS`,
    ///   `ORDER_STATUS_SERVICE_RETRY_ATTEMPTS`, `ORDER_STATUS_SERVICE_RETRY_BACKOFF_MS`
    /// - `TAX_SERVICE_BASE_URL`, `TAX_SERVICE_TIMEOUT_SECONDS`,
    ///   `TAX_SERVICE_RETRY_ATTEMPTS`, `TAX_SERVICE_RETRY_BACKOFF_MS`
    /// - `TAX_SERVICE_INVOICED_STATUS` (default: SHIPPED)
    /// - `DELIVERY_TARGET_STATUS` (default: SHIPPED; with the raise resolver it
    ///   defaults to, and must equal, the invoiced status)
    /// - `ORDER_STORE` (memory | scylla, default: memory)
    /// - `SCYLLA_NODE` (default: 127.0.0.1:9042), `SCYLLA_KEYSPACE` (default: orders_ks)
    /// - `METRICS_PORT` (default: 9090)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let kafka = KafkaConfig {
            bootstrap_servers: env
                .string("KAFKA_BOOTSTRAP_SERVERS")
                .unwrap_or_else(|| "127.0.0.1:9092".to_string()),
            group_id: env
                .string("KAFKA_GROUP_ID")
                .unwrap_or_else(|| "order-delivery-service".to_string()),
            delivery_topic: env
                .string("KAFKA_DELIVERY_TOPIC")
                .unwrap_or_else(|| DEFAULT_DELIVERY_TOPIC.to_string()),
            redelivery_backoff: Duration::from_millis(
                env.parsed("KAFKA_REDELIVERY_BACKOFF_MS")?.unwrap_or(1000),
            ),
        };

        let resolver_kind = match env.string("STATUS_RESOLVER").as_deref() {
            None | Some("raise") => ResolverKind::Raise,
            Some("fetch") => ResolverKind::Fetch,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STATUS_RESOLVER",
                    value: other.to_string(),
                    reason: "expected 'fetch' or 'raise'".to_string(),
                })
            }
        };

        let resolver = match resolver_kind {
            ResolverKind::Fetch => ResolverConfig::Fetch {
                order_status_service: env.endpoint(
                    "ORDER_STATUS_SERVICE_BASE_URL",
                    "ORDER_STATUS_SERVICE_TIMEOUT_SECONDS",
                    "ORDER_STATUS_SERVICE_RETRY_ATTEMPTS",
                    "ORDER_STATUS_SERVICE_RETRY_BACKOFF_MS",
                )?,
            },
            ResolverKind::Raise => ResolverConfig::Raise {
                tax_service: env.endpoint(
                    "TAX_SERVICE_BASE_URL",
                    "TAX_SERVICE_TIMEOUT_SECONDS",
                    "TAX_SERVICE_RETRY_ATTEMPTS",
                    "TAX_SERVICE_RETRY_BACKOFF_MS",
                )?,
                invoiced_status: env
                    .parsed("TAX_SERVICE_INVOICED_STATUS")?
                    .unwrap_or(OrderStatus::Shipped),
            },
        };

        let store = match env.string("ORDER_STORE").as_deref() {
            None | Some("memory") => StoreConfig::Memory,
            Some("scylla") => StoreConfig::Scylla {
                node: env
                    .string("SCYLLA_NODE")
                    .unwrap_or_else(|| "127.0.0.1:9042".to_string()),
                keyspace: env
                    .string("SCYLLA_KEYSPACE")
                    .unwrap_or_else(|| "orders_ks".to_string()),
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "ORDER_STORE",
                    value: other.to_string(),
                    reason: "expected 'memory' or 'scylla'".to_string(),
                })
            }
        };

        // The raise resolver always writes `invoiced_status`; any other target
        // would never match on redelivery and the invoice would be raised again.
        let configured_target: Option<OrderStatus> = env.parsed("DELIVERY_TARGET_STATUS")?;
        let target_status = match (&resolver, configured_target) {
            (ResolverConfig::Raise { invoiced_status, .. }, Some(target))
                if target != *invoiced_status =>
            {
                return Err(ConfigError::Invalid {
                    name: "DELIVERY_TARGET_STATUS",
                    value: target.to_string(),
                    reason: format!(
                        "raise resolver writes {invoiced_status}, so the idempotency check must target it"
                    ),
                })
            }
            (ResolverConfig::Raise { invoiced_status, .. }, None) => *invoiced_status,
            (_, target) => target.unwrap_or(OrderStatus::Shipped),
        };

        Ok(Self {
            kafka,
            resolver,
            target_status,
            store,
            metrics_port: env.parsed("METRICS_PORT")?.unwrap_or(9090),
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn parsed<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(value) = self.string(name) else {
            return Ok(None);
        };
        value.parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        })
    }

    fn endpoint(
        &self,
        base_url: &'static str,
        timeout_seconds: &'static str,
        retry_attempts: &'static str,
        retry_backoff_ms: &'static str,
    ) -> Result<EndpointConfig, ConfigError> {
        Ok(EndpointConfig {
            base_url: self.string(base_url).ok_or(ConfigError::Missing(base_url))?,
            timeout: Duration::from_secs(
                self.parsed(timeout_seconds)?.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            ),
            retry_attempts: self.parsed(retry_attempts)?.unwrap_or(DEFAULT_RETRY_ATTEMPTS),
            retry_backoff: Duration::from_millis(self.parsed(retry_backoff_ms)?.unwrap_or(0)),
        })
    }
}
