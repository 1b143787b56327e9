// Shared Counter Store Port
// Process-external atomic counters backing rate limiting

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Counter value after an increment, with the time left in its window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub count: u64,
    /// Seconds until the window resets (the full window on the first hit)
    pub ttl_secs: u64,
}

/// Atomic increment-with-expiry primitive
///
/// Implementations must be safe for concurrent callers across processes:
/// no client-side locking, the store performs the increment.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key` by one. The first increment of a window creates the key
    /// and sets its expiry to `window`; later increments leave the expiry alone.
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<WindowCount>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose backend is down
    #[derive(Default)]
    pub struct UnavailableCounterStore {
        calls: AtomicUsize,
    }

    impl UnavailableCounterStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CounterStore for UnavailableCounterStore {
        async fn incr_with_expiry(&self, _key: &str, _window: Duration) -> Result<WindowCount> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Store("connection refused".to_string()))
        }
    }

    /// Store that counts per key and never expires; ttl is always the full window
    #[derive(Default)]
    pub struct NeverExpiringCounterStore {
        counts: std::sync::Mutex<std::collections::HashMap<String, u64>>,
    }

    impl NeverExpiringCounterStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl CounterStore for NeverExpiringCounterStore {
        async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<WindowCount> {
            let mut counts = self.counts.lock().unwrap();
            let count = counts.entry(key.to_string()).or_insert(0);
            *count += 1;
            Ok(WindowCount {
                count: *count,
                ttl_secs: window.as_secs(),
            })
        }
    }

    /// Store that never answers (exercises call timeouts)
    pub struct HangingCounterStore;

    #[async_trait]
    impl CounterStore for HangingCounterStore {
        async fn incr_with_expiry(&self, _key: &str, _window: Duration) -> Result<WindowCount> {
            std::future::pending().await
        }
    }
}
