//! Retry with exponential backoff for transient store failures

use crate::runtime::AsyncSpawner;
use crate::store::StoreResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// How often, and how patiently, a failed store call is repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total tries including the first; zero is rejected by config validation
    pub max_attempts: u32,
    /// Wait after the first failure
    pub base_delay_ms: u64,
    /// Growth factor between consecutive waits
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 50,
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Try once and never wait
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before retry number `failed_attempts` (1 after the first failure)
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1);
        let factor = u64::from(self.multiplier).saturating_pow(exponent);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy runs out
///
/// Only transient errors are retried. `on_retry` fires once per retry,
/// before the backoff sleep.
pub async fn with_retry<P, T, F, Fut>(
    spawner: &P,
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
    mut on_retry: impl FnMut(),
) -> StoreResult<T>
where
    P: AsyncSpawner,
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempts = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempts += 1;
                if !e.is_transient() || attempts >= policy.max_attempts {
                    return Err(e);
                }

                let backoff = policy.delay_for(attempts);
                log::warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    what,
                    attempts,
                    policy.max_attempts,
                    backoff,
                    e
                );
                on_retry();
                spawner.sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockSpawner;
    use crate::store::StoreError;
    use futures::executor::block_on;
    use std::cell::Cell;

    #[test]
    fn test_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(200));
    }

    #[test]
    fn test_huge_attempt_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(200), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_transient_then_success() {
        let spawner = MockSpawner::new();
        let calls = Cell::new(0);
        let retries = Cell::new(0);

        let result = block_on(with_retry(
            &spawner,
            &RetryPolicy::default(),
            "read",
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(StoreError::Transient("timeout".into()))
                    } else {
                        Ok(n)
                    }
                }
            },
            || retries.set(retries.get() + 1),
        ));

        assert_eq!(result, Ok(3));
        assert_eq!(retries.get(), 2);
        assert_eq!(spawner.sleep_count(), 2);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let spawner = MockSpawner::new();
        let calls = Cell::new(0);

        let result: StoreResult<()> = block_on(with_retry(
            &spawner,
            &RetryPolicy::default(),
            "read",
            || {
                calls.set(calls.get() + 1);
                async { Err(StoreError::Transient("down".into())) }
            },
            || {},
        ));

        assert!(result.is_err());
        assert_eq!(calls.get(), 4);
        assert_eq!(spawner.sleep_count(), 3);
    }

    #[test]
    fn test_permanent_error_not_retried() {
        let spawner = MockSpawner::new();
        let calls = Cell::new(0);

        let result: StoreResult<()> = block_on(with_retry(
            &spawner,
            &RetryPolicy::default(),
            "write",
            || {
                calls.set(calls.get() + 1);
                async { Err(StoreError::Rejected("denied".into())) }
            },
            || {},
        ));

        assert_eq!(result, Err(StoreError::Rejected("denied".into())));
        assert_eq!(calls.get(), 1);
        assert_eq!(spawner.sleep_count(), 0);
    }
}
