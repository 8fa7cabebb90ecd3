// Retry and backoff utilities

use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Exponent cap so the multiplier cannot overflow.
const MAX_DOUBLINGS: u32 = 16;

/// How long to pause after consecutive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    Fixed(Duration),
    Exponential { base: Duration, max: Duration },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Fixed(Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    /// Fixed when no cap is given, capped-exponential otherwise.
    pub fn from_millis(base_ms: u64, max_ms: Option<u64>) -> Self {
        let base = Duration::from_millis(base_ms);
        match max_ms {
            Some(max) => BackoffPolicy::Exponential {
                base,
                max: Duration::from_millis(max).max(base),
            },
            None => BackoffPolicy::Fixed(base),
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            BackoffPolicy::Fixed(delay) => delay,
            BackoffPolicy::Exponential { base, max } => {
                let doublings = attempt.saturating_sub(1).min(MAX_DOUBLINGS);
                base.saturating_mul(1u32 << doublings).min(max)
            }
        }
    }

    pub fn start(&self) -> Backoff {
        Backoff {
            policy: *self,
            attempt: 0,
        }
    }
}

/// Consecutive-failure counter driven by a [`BackoffPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.policy.delay(self.attempt)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

pub async fn with_retry<F, T, E>(
    mut operation: F,
    max_retries: u32,
    policy: &BackoffPolicy,
) -> Result<T, E>
where
    F: FnMut() -> futures::future::BoxFuture<'static, Result<T, E>>,
    E: std::fmt::Display,
{
    let mut backoff = policy.start();

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if backoff.attempts() + 1 >= max_retries {
                    return Err(error);
                }

                let delay = backoff.next_delay();
                warn!(
                    attempt = backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Operation failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}
