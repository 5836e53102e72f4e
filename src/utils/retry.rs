use std::time::Duration;
use tokio::time::{sleep, timeout};

// ============================================================================
// Bounded Retry With Per-Attempt Timeout
// ============================================================================
//
// Runs a remote call as a unit: each attempt is bounded by `attempt_timeout`,
// and a timed-out attempt consumes one slot of the retry budget just like an
// error does. Delay between attempts grows exponentially from
// `initial_delay` (zero means retry immediately).
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Upper bound on a single attempt
    pub attempt_timeout: Duration,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl RetryConfig {
    /// One initial attempt plus `retries` immediate retries
    pub fn immediate(attempt_timeout: Duration, retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            attempt_timeout,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    pub fn with_backoff(mut self, initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        self.initial_delay = initial_delay;
        self.max_delay = max_delay;
        self.multiplier = multiplier;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("timed out after {timeout:?} on attempt {attempts}")]
    TimedOut { attempts: u32, timeout: Duration },

    #[error("failed after {attempts} attempt(s): {error}")]
    Failed { attempts: u32, error: E },
}

/// Execute `operation` until it succeeds or the attempt budget is spent.
/// The reported error is the outcome of the last attempt.
pub async fn retry_with_timeout<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;

        tracing::debug!(
            attempt = attempt,
            max_attempts = max_attempts,
            "Attempting operation"
        );

        let failure = match timeout(config.attempt_timeout, operation(attempt)).await {
            Ok(Ok(result)) => {
                if attempt > 1 {
                    tracing::info!(attempt = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Ok(Err(error)) => {
                tracing::warn!(attempt = attempt, error = %error, "Attempt failed");
                RetryError::Failed { attempts: attempt, error }
            }
            Err(_) => {
                tracing::warn!(
                    attempt = attempt,
                    timeout_ms = config.attempt_timeout.as_millis(),
                    "Attempt timed out"
                );
                RetryError::TimedOut {
                    attempts: attempt,
                    timeout: config.attempt_timeout,
                }
            }
        };

        if attempt >= max_attempts {
            tracing::error!(attempt = attempt, "Operation failed after all attempts");
            return Err(failure);
        }

        if !delay.is_zero() {
            sleep(delay).await;
            delay = Duration::from_millis(((delay.as_millis() as f64) * config.multiplier) as u64)
                .min(config.max_delay);
        }
    }
}
