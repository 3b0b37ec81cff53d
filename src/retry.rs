use crate::cancel::{sleep_with_cancel, CancellationState};
use crate::{Result, VibegenError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior on rate-limited requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay for exponential backoff (in seconds)
    pub base_delay: u64,
    /// Maximum delay cap (in seconds)
    pub max_delay: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: 1,
            max_delay: 60,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retries + 1` when the server asked for
    /// `retry_after` seconds.
    pub fn delay_for(&self, retry_after: u64, retries: u32) -> u64 {
        let backoff = self.base_delay.saturating_mul(2_u64.saturating_pow(retries));
        std::cmp::min(retry_after.saturating_add(backoff), self.max_delay)
    }
}

/// Result of a retry operation with context
#[derive(Debug)]
pub struct RetryResult<T> {
    /// The successful result
    pub result: T,
    /// Number of retry attempts made
    pub attempts_made: u32,
    /// Total time spent waiting between attempts (in seconds)
    pub total_retry_time: u64,
}

/// Execute an async operation, retrying it while it fails with
/// [`VibegenError::RateLimit`].
///
/// Any other error is returned immediately. Once `max_retries` is exhausted
/// the last rate-limit error is returned.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation_name` - Name of the operation for logging
/// * `cancel` - When set, cancelling it cuts a backoff wait short with
///   [`VibegenError::Cancelled`]
/// * `operation` - Async function that returns a Result
/// * `on_rate_limit` - Callback for rate limit events (delay in seconds)
pub async fn retry_with_backoff<T, F, Fut, OnRateLimit>(
    config: &RetryConfig,
    operation_name: &str,
    cancel: Option<&CancellationState>,
    mut operation: F,
    mut on_rate_limit: OnRateLimit,
) -> Result<RetryResult<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    OnRateLimit: FnMut(u64, &str),
{
    let mut retries = 0;
    let mut total_retry_time = 0;

    loop {
        match operation().await {
            Ok(result) => {
                return Ok(RetryResult {
                    result,
                    attempts_made: retries,
                    total_retry_time,
                });
            }
            Err(VibegenError::RateLimit { retry_after }) => {
                if retries >= config.max_retries {
                    log::warn!(
                        "Max retries ({}) exceeded for {} operation",
                        config.max_retries,
                        operation_name
                    );
                    return Err(VibegenError::RateLimit { retry_after });
                }

                let delay = config.delay_for(retry_after, retries);

                log::info!(
                    "{} rate limited. Waiting {} seconds before retry {} of {}",
                    operation_name,
                    delay,
                    retries + 1,
                    config.max_retries
                );

                on_rate_limit(delay, operation_name);

                let wait = Duration::from_secs(delay);
                match cancel {
                    Some(cancel) => sleep_with_cancel(cancel.subscribe(), wait).await?,
                    None => tokio::time::sleep(wait).await,
                }
                retries += 1;
                total_retry_time += delay;
            }
            Err(other_error) => {
                return Err(other_error);
            }
        }
    }
}

/// Simplified retry function for operations that don't need custom rate limit handling
pub async fn retry_operation<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    cancel: Option<&CancellationState>,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_backoff(config, operation_name, cancel, operation, |delay, op_name| {
        log::debug!("Rate limited during {op_name}: waiting {delay} seconds");
    })
    .await
    .map(|retry_result| retry_result.result)
}
