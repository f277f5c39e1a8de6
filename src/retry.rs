//! Exponential backoff for transient source failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::SourceError;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 3).
    pub max_retries: u32,
    /// Delay before the first retry (default: 1 second).
    pub base_delay: Duration,
    /// Upper bound for a single delay (default: 30 seconds).
    pub max_delay: Duration,
    /// Up to this fraction of the delay is added as random jitter (default: 0.25).
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_fraction: 0.25,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Delay before retry `attempt` (0-indexed): `min(base * 2^attempt, max)` plus jitter.
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt.min(20));
    let base_ms = config.base_delay.as_millis() as u64;
    let capped_ms = base_ms
        .saturating_mul(exp)
        .min(config.max_delay.as_millis() as u64);

    let jitter_max_ms = (capped_ms as f64 * config.jitter_fraction.max(0.0)) as u64;
    let jitter_ms = if jitter_max_ms > 0 {
        rand::thread_rng().gen_range(0..=jitter_max_ms)
    } else {
        0
    };

    Duration::from_millis(capped_ms + jitter_ms)
}

/// Delay before retrying `err`: the computed backoff, or the server's
/// `retry_after` hint when longer. The hint is capped at `max_delay`.
fn delay_for(config: &RetryConfig, attempt: u32, err: &SourceError) -> Duration {
    let computed = compute_delay(config, attempt);
    err.retry_after()
        .map_or(computed, |hint| computed.max(hint.min(config.max_delay)))
}

/// Run `op` until it succeeds, fails permanently, or the retry budget is spent.
///
/// Only [`SourceError::is_transient`] failures are retried. A server-supplied
/// `retry_after` is honoured when it is longer than the computed delay, up to
/// `max_delay`.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut op: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if !err.is_transient() || attempt >= config.max_retries {
                    return Err(err);
                }

                let delay = delay_for(config, attempt, &err);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
