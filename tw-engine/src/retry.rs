//! Retry Policy
//!
//! Bounded retries for reads that are eventually consistent with the ledger,
//! such as the backend profile lookup right after a registration confirms.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Retry strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RetryStrategy {
    /// No retry
    None,
    /// Fixed delay between retries
    Fixed { delay_secs: u64 },
    /// Exponential backoff
    Exponential {
        initial_delay_secs: u64,
        max_delay_secs: u64,
        multiplier: f64,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Exponential {
            initial_delay_secs: 2,
            max_delay_secs: 10,
            multiplier: 2.0,
        }
    }
}

impl RetryStrategy {
    /// Calculate delay before attempt number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::None => Duration::ZERO,
            RetryStrategy::Fixed { delay_secs } => Duration::from_secs(*delay_secs),
            RetryStrategy::Exponential {
                initial_delay_secs,
                max_delay_secs,
                multiplier,
            } => {
                let exp = attempt.saturating_sub(1) as i32;
                let delay = (*initial_delay_secs as f64) * multiplier.powi(exp);
                let delay = delay.min(*max_delay_secs as f64);
                Duration::from_secs(delay as u64)
            }
        }
    }

    /// Total attempts allowed for `max_attempts`, 1 when retries are off
    fn attempts(&self, max_attempts: u32) -> u32 {
        match self {
            RetryStrategy::None => 1,
            _ => max_attempts.max(1),
        }
    }
}

/// Run `op` until it yields `Some`, sleeping between attempts
///
/// Returns `Ok(None)` when every attempt came back empty. Errors end the loop
/// only on the final attempt; earlier ones are retried like empty results.
pub async fn retry_until_some<T, F, Fut>(
    strategy: &RetryStrategy,
    max_attempts: u32,
    mut op: F,
) -> EngineResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<Option<T>>>,
{
    let attempts = strategy.attempts(max_attempts);
    let mut last_error: Option<EngineError> = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            tokio::time::sleep(strategy.delay_for_attempt(attempt - 1)).await;
        }

        match op().await {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {
                debug!(attempt, attempts, "Retryable read returned nothing yet");
                last_error = None;
            }
            Err(e) => {
                debug!(attempt, attempts, error = %e, "Retryable read failed");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(e),
        None => Ok(None),
    }
}
