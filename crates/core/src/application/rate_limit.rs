// Fixed-window rate limiting over the shared counter store

use crate::port::CounterStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default key namespace for rate-limit counters
pub const DEFAULT_KEY_PREFIX: &str = "rl";

/// Outcome of one admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Under the limit; `remaining` requests left in the current window
    Allowed { remaining: u64 },
    /// Over the limit until the window resets
    Limited { retry_after_secs: u64 },
    /// Counter store unavailable; request let through without counting
    FailOpen,
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, RateLimitDecision::Limited { .. })
    }

    /// `None` means unknown (fail-open)
    pub fn remaining(&self) -> Option<u64> {
        match self {
            RateLimitDecision::Allowed { remaining } => Some(*remaining),
            RateLimitDecision::Limited { .. } => Some(0),
            RateLimitDecision::FailOpen => None,
        }
    }
}

/// Per-identity fixed-window limiter
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    key_prefix: String,
    call_timeout: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, call_timeout: Duration) -> Self {
        Self {
            store,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            call_timeout,
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn key_for(&self, identity: &str) -> String {
        format!("{}:{}", self.key_prefix, identity)
    }

    /// Count one request for `identity` and decide whether it may proceed.
    ///
    /// A single store call is made; an error or a call exceeding the timeout
    /// degrades to [`RateLimitDecision::FailOpen`] immediately.
    pub async fn check_and_consume(
        &self,
        identity: &str,
        limit: u64,
        window: Duration,
    ) -> RateLimitDecision {
        let key = self.key_for(identity);
        let counted =
            tokio::time::timeout(self.call_timeout, self.store.incr_with_expiry(&key, window))
                .await;

        let window_count = match counted {
            Ok(Ok(wc)) => wc,
            Ok(Err(e)) => {
                warn!(identity = %identity, error = %e, fail_open = true, "Rate limit check failed, allowing request");
                return RateLimitDecision::FailOpen;
            }
            Err(_) => {
                warn!(
                    identity = %identity,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    fail_open = true,
                    "Rate limit check timed out, allowing request"
                );
                return RateLimitDecision::FailOpen;
            }
        };

        if window_count.count <= limit {
            RateLimitDecision::Allowed {
                remaining: limit - window_count.count,
            }
        } else {
            let retry_after_secs = if window_count.ttl_secs > 0 {
                window_count.ttl_secs
            } else {
                window.as_secs()
            }
            .max(1);
            debug!(identity = %identity, count = window_count.count, limit, "Rate limited");
            RateLimitDecision::Limited { retry_after_secs }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::counter_store::mocks::{
        HangingCounterStore, NeverExpiringCounterStore, UnavailableCounterStore,
    };

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_allows_up_to_limit_then_limits() {
        let limiter = RateLimiter::new(
            Arc::new(NeverExpiringCounterStore::new()),
            Duration::from_millis(250),
        );

        for expected_remaining in (0..3).rev() {
            let decision = limiter.check_and_consume("10.0.0.1", 3, WINDOW).await;
            assert_eq!(
                decision,
                RateLimitDecision::Allowed {
                    remaining: expected_remaining
                }
            );
        }

        let decision = limiter.check_and_consume("10.0.0.1", 3, WINDOW).await;
        assert_eq!(decision, RateLimitDecision::Limited { retry_after_secs: 60 });
        assert!(!decision.is_allowed());
        assert_eq!(decision.remaining(), Some(0));
    }

    #[tokio::test]
    async fn test_identities_are_counted_separately() {
        let limiter = RateLimiter::new(
            Arc::new(NeverExpiringCounterStore::new()),
            Duration::from_millis(250),
        );

        assert!(limiter.check_and_consume("key-a", 1, WINDOW).await.is_allowed());
        assert!(!limiter.check_and_consume("key-a", 1, WINDOW).await.is_allowed());
        assert!(limiter.check_and_consume("key-b", 1, WINDOW).await.is_allowed());
    }

    #[tokio::test]
    async fn test_store_error_fails_open_without_retry() {
        let store = Arc::new(UnavailableCounterStore::new());
        let limiter = RateLimiter::new(store.clone(), Duration::from_millis(250));

        let decision = limiter.check_and_consume("10.0.0.1", 1, WINDOW).await;
        assert_eq!(decision, RateLimitDecision::FailOpen);
        assert!(decision.is_allowed());
        assert_eq!(decision.remaining(), None);
        assert_eq!(store.call_count(), 1);
    }

    #[tokio::test]
    async fn test_store_timeout_fails_open() {
        let limiter = RateLimiter::new(Arc::new(HangingCounterStore), Duration::from_millis(20));
        let decision = limiter.check_and_consume("10.0.0.1", 1, WINDOW).await;
        assert_eq!(decision, RateLimitDecision::FailOpen);
    }
}
