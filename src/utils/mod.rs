pub mod retry;

pub use retry::{retry_with_timeout, RetryConfig, RetryError};
