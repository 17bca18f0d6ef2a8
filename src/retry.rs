//! Backoff for calls into the inference collaborator.
//!
//! Both callers, handler model rounds and validation-gate checkers, go
//! through [`retry_async`]. Only collaborator outages are retried; a
//! rejected decision or a failed precondition comes back the same way on
//! every attempt.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{AgentsError, Result};

/// Upper bound of the random extra added to a delay, as a share of it.
const MAX_JITTER: f64 = 0.3;

/// Tracks the retries spent on one call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempt: usize,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// A policy that gives up on the first failure.
    pub fn none() -> Self {
        Self::new(RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        })
    }

    /// Retries spent so far.
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    pub fn should_retry(&self) -> bool {
        self.attempt < self.config.max_retries
    }

    /// Delay before retry number `retry` (1-based), without jitter.
    ///
    /// Grows by `backoff_multiplier` per retry and never exceeds `max_delay`.
    pub fn base_delay(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as usize) as i32;
        let factor = f64::from(self.config.backoff_multiplier).powi(exponent);
        let millis = self.config.initial_delay.as_millis() as f64 * factor;
        let cap = self.config.max_delay.as_millis() as f64;
        Duration::from_millis(millis.min(cap).max(0.0) as u64)
    }

    /// Spends one retry and returns how long to wait before it.
    pub fn next_delay<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Duration {
        self.attempt += 1;
        let delay = self.base_delay(self.attempt);
        if !self.config.jitter {
            return delay;
        }
        let extra = delay.as_millis() as f64 * rng.gen_range(0.0..MAX_JITTER);
        delay + Duration::from_millis(extra as u64)
    }
}

/// Whether an error is a collaborator outage worth another attempt.
pub fn is_retryable(error: &AgentsError) -> bool {
    matches!(
        error,
        AgentsError::OpenAIError(_) | AgentsError::CollaboratorFailure { .. } | AgentsError::IoError(_)
    )
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `config.max_retries` retries are spent. `call` names the call in logs.
pub async fn retry_async<F, Fut, T>(call: &str, config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut policy = RetryPolicy::new(config.clone());
    loop {
        let error = match operation().await {
            Ok(value) => {
                if policy.attempt() > 0 {
                    debug!(call = %call, retries = policy.attempt(), "call recovered");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !is_retryable(&error) {
            return Err(error);
        }
        if !policy.should_retry() {
            warn!(call = %call, retries = policy.attempt(), error = %error, "giving up");
            return Err(error);
        }

        let delay = policy.next_delay(&mut rand::thread_rng());
        warn!(
            call = %call,
            attempt = policy.attempt(),
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "collaborator call failed, retrying"
        );
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast(max_retries: usize) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    fn outage() -> AgentsError {
        AgentsError::CollaboratorFailure {
            message: "upstream timeout".to_string(),
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            jitter: false,
        });
        let delays: Vec<u128> = (1..=5).map(|n| policy.base_delay(n).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
    }

    #[test]
    fn test_next_delay_spends_retries() {
        let mut policy = RetryPolicy::new(RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 3.0,
            jitter: false,
        });
        let mut rng = StdRng::seed_from_u64(7);

        assert!(policy.should_retry());
        assert_eq!(policy.next_delay(&mut rng), Duration::from_millis(100));
        assert_eq!(policy.next_delay(&mut rng), Duration::from_millis(300));
        assert_eq!(policy.attempt(), 2);
        assert!(!policy.should_retry());
        assert!(!RetryPolicy::none().should_retry());
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let mut policy = RetryPolicy::new(RetryConfig {
                initial_delay: Duration::from_millis(1000),
                jitter: true,
                ..RetryConfig::default()
            });
            let delay = policy.next_delay(&mut rng).as_millis();
            assert!((1000..1300).contains(&delay), "{delay}ms out of range");
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&outage()));
        assert!(is_retryable(&AgentsError::IoError(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timeout"
        ))));
        assert!(!is_retryable(&AgentsError::MaxTurnsExceeded { max_turns: 5 }));
        assert!(!is_retryable(&AgentsError::OffGraphHandoff {
            from: "FAQ Agent".into(),
            to: "Cancellation Agent".into(),
        }));
        assert!(!is_retryable(&AgentsError::PreconditionViolation {
            tool: "update_seat".into(),
            message: "no flight".into(),
        }));
    }

    #[tokio::test]
    async fn test_retry_async_recovers() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result = retry_async("lookup", &fast(3), || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(outage())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_async_gives_up() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result = retry_async("lookup", &fast(2), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(outage())
            }
        })
        .await;

        assert!(matches!(result, Err(AgentsError::CollaboratorFailure { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result = retry_async("lookup", &fast(5), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AgentsError::UnknownTool {
                    handler: "FAQ Agent".into(),
                    tool: "cancel_flight".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(AgentsError::UnknownTool { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
