//! Bounded retries with capped exponential backoff.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::NetworkStatus;
use crate::error::BackendError;

/// Retry configuration shared by every backend call.
///
/// Durations are kept in milliseconds so the policy reads naturally in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total tries, the first included.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub base_delay_ms: u64,
    /// Growth factor for each subsequent delay.
    pub multiplier: f64,
    /// Backoff cap.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::requests()
    }
}

impl RetryPolicy {
    /// Backend requests: 2 tries, 1 s base, doubling, 5 s cap.
    pub fn requests() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 5000,
        }
    }

    /// Chunk PUTs: the first try plus 3 requeues.
    pub fn chunks() -> Self {
        Self {
            max_attempts: 4,
            ..Self::requests()
        }
    }

    /// Delay after failed attempt `attempt` (1-based):
    /// `min(base × multiplier^(attempt-1), cap)`.
    ///
    /// No jitter is applied, so successive delays never decrease.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let ms = self.base_delay_ms as f64 * self.multiplier.powi(exp);
        let capped = ms.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// The network probe is consulted before every attempt and after every
    /// failure; an offline report ends the loop at once without sleeping.
    pub async fn run<T, E, F, Fut>(
        &self,
        network: &dyn NetworkStatus,
        operation: &str,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if !network.is_online() {
                return Err(RetryError::Offline);
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(RetryError::Permanent(e)),
                Err(e) if attempt >= attempts => {
                    warn!(operation, attempt, error = %e, "giving up");
                    return Err(RetryError::Exhausted(e));
                }
                Err(_) if !network.is_online() => return Err(RetryError::Offline),
                Err(e) => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Why [`RetryPolicy::run`] stopped without a value.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The network probe reported offline.
    Offline,
    /// The operation failed with an error that retrying cannot fix.
    Permanent(E),
    /// Every attempt failed; holds the last error.
    Exhausted(E),
}

/// Classifies errors for [`RetryPolicy::run`].
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for BackendError {
    fn is_transient(&self) -> bool {
        !matches!(self, BackendError::AuthExpired)
    }
}
