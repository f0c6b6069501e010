//! Conflict retry with exponential backoff.
//!
//! Every mutating operation loads its aggregates, decides, and commits with
//! expected versions. When another writer commits first the store reports a
//! concurrency conflict; the operation is then re-run against fresh state.

use std::future::Future;
use std::time::Duration;

use crate::error::DomainError;

/// Retry policy for operations that lose an optimistic concurrency race.
///
/// # Default Values
///
/// - `max_attempts`: 5 (including the first try)
/// - `initial_delay`: 2ms
/// - `max_delay`: 50ms
/// - `multiplier`: 2.0
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(50),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Default backoff with a different attempt budget.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based), capped at `max_delay`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let delay = Duration::from_millis(delay_ms as u64);

        if delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }

    /// Runs `attempt` until it succeeds, fails with a non-conflict error, or
    /// the attempt budget is spent. The last conflict is returned unchanged.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut tries = 1;

        loop {
            match attempt().await {
                Err(err) if err.is_conflict() => {
                    metrics::counter!("order_commit_conflicts_total").increment(1);

                    if tries >= max_attempts {
                        tracing::warn!(
                            operation,
                            attempts = tries,
                            "giving up after repeated conflicts"
                        );
                        return Err(err);
                    }

                    let delay = self.delay_for_retry(tries);
                    tracing::debug!(
                        operation,
                        attempt = tries,
                        ?delay,
                        "concurrency conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    tries += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use common::AggregateId;
    use event_store::{EventStoreError, Version};

    fn conflict() -> DomainError {
        DomainError::EventStore(EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::first(),
            actual: Version::new(2),
        })
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(2));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(4));
        assert_eq!(policy.delay_for_retry(4), Duration::from_millis(16));
        assert_eq!(policy.delay_for_retry(10), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_retries_conflicts_until_success() {
        let calls = &AtomicU32::new(0);
        let result = RetryPolicy::default()
            .run("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(conflict())
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::with_max_attempts(3)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(conflict())
            })
            .await;

        assert!(result.unwrap_err().is_conflict());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DomainError::AggregateNotFound {
                    aggregate_type: "Order",
                    aggregate_id: AggregateId::new(),
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
