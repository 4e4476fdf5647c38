use std::fmt::{Debug, Display};
use std::future::Future;

use thiserror::Error;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Bounded retry with exponential backoff
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Error)]
pub enum RetryError<E: Display + Debug> {
    #[error("cancelled")]
    Cancelled,
    #[error("all {attempts} attempts failed: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl RetrySettings {
    /// Run `operation` up to `attempts` times, doubling the delay between
    /// attempts until `max_delay_ms`. Stops early once `cancel` fires.
    pub async fn run_with_retry<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display + Debug,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.base_delay_ms;

        for attempt in 1..=attempts {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                result = operation() => result,
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    warn!("attempt {attempt}/{attempts} failed: {e}");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                        _ = sleep(Duration::from_millis(delay)) => {}
                    }
                    delay = (delay * 2).min(self.max_delay_ms);
                }
                Err(e) => {
                    error!("all {attempt} attempts failed: {e}");
                    return Err(RetryError::Exhausted { attempts: attempt, last: e });
                }
            }
        }
        unreachable!("Retry loop exhausted unexpectedly")
    }
}

/// Unbounded retry spacing: wait before retry n is min(step * n, max)
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    pub step: Duration,
    pub max: Duration,
}

impl LinearBackoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.max)
    }
}
