// Retry logic
//
// One explicit policy object per failure domain (compute, webhook delivery):
// attempt cap, backoff schedule, jitter function and a retryable predicate.
use crate::port::{ComputeError, DeliveryError};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay
    Retry(Duration),
    /// Retryable error, but the retry budget is spent
    Exhausted,
    /// The predicate classified the error as permanent
    NotRetryable,
}

/// Exponential backoff schedule
///
/// delay(n) = min(base * factor^n, max), n = retries already performed
#[derive(Debug, Clone)]
pub struct Backoff {
    pub base: Duration,
    pub factor: f64,
    pub max: Duration,
}

impl Backoff {
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            base,
            factor: 2.0,
            max,
        }
    }

    pub fn delay(&self, retries_so_far: u32) -> Duration {
        let exp = retries_so_far.min(i32::MAX as u32) as i32;
        let ms = self.base.as_millis() as f64 * self.factor.powi(exp);
        let capped = ms.min(self.max.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

/// Jitter applied on top of the backoff schedule
#[derive(Clone)]
pub enum Jitter {
    /// Deterministic delays (tests)
    None,
    /// Uniform in `[0, delay]` to spread out thundering herds
    Full,
    /// Uniform in `[delay * (1 - f), delay * (1 + f)]`, never above the backoff cap
    Proportional(f64),
    Custom(Arc<dyn Fn(Duration) -> Duration + Send + Sync>),
}

impl Jitter {
    pub fn apply(&self, delay: Duration, cap: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        let jittered = match self {
            Jitter::None => delay,
            Jitter::Full => Duration::from_millis(rand::thread_rng().gen_range(0..=ms)),
            Jitter::Proportional(f) => {
                let f = f.clamp(0.0, 1.0);
                let factor = rand::thread_rng().gen_range((1.0 - f)..=(1.0 + f));
                Duration::from_millis((ms as f64 * factor) as u64)
            }
            Jitter::Custom(jitter_fn) => jitter_fn(delay),
        };
        jittered.min(cap)
    }
}

impl std::fmt::Debug for Jitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Jitter::None => write!(f, "None"),
            Jitter::Full => write!(f, "Full"),
            Jitter::Proportional(p) => write!(f, "Proportional({})", p),
            Jitter::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Classifies an error as retryable
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Retry policy
///
/// Determines if a failed operation should be retried based on:
/// - Retries already performed
/// - Maximum retries allowed
/// - Whether the error is retryable at all
pub struct RetryPolicy<E> {
    max_retries: u32,
    backoff: Backoff,
    jitter: Jitter,
    is_retryable: RetryPredicate<E>,
}

impl<E> RetryPolicy<E> {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `max_retries` - Retries allowed after the first attempt
    /// * `backoff` - Delay schedule
    /// * `jitter` - Jitter applied to each delay
    /// * `is_retryable` - Predicate deciding which errors are worth retrying
    pub fn new(
        max_retries: u32,
        backoff: Backoff,
        jitter: Jitter,
        is_retryable: impl Fn(&E) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            max_retries,
            backoff,
            jitter,
            is_retryable: Arc::new(is_retryable),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts this policy permits (first attempt + retries)
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Replace the jitter function
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `retries_so_far + 1`
    pub fn delay_for(&self, retries_so_far: u32) -> Duration {
        self.jitter
            .apply(self.backoff.delay(retries_so_far), self.backoff.max)
    }

    /// Decide what to do after a failed attempt
    ///
    /// Returns:
    /// - `RetryDecision::Retry(delay)` if the error is retryable and budget remains
    /// - `RetryDecision::Exhausted` if `retries_so_far` reached `max_retries`
    /// - `RetryDecision::NotRetryable` if the predicate rejects the error
    pub fn decide(&self, retries_so_far: u32, error: &E) -> RetryDecision {
        if !(self.is_retryable)(error) {
            return RetryDecision::NotRetryable;
        }

        if retries_so_far >= self.max_retries {
            warn!(
                retries = retries_so_far,
                max_retries = self.max_retries,
                "Max retry attempts reached"
            );
            return RetryDecision::Exhausted;
        }

        RetryDecision::Retry(self.delay_for(retries_so_far))
    }
}

impl RetryPolicy<ComputeError> {
    /// Compute retries: only resource, I/O and connection failures are retried
    pub fn for_compute(max_retries: u32, base: Duration, max: Duration) -> Self {
        Self::new(
            max_retries,
            Backoff::exponential(base, max),
            Jitter::Full,
            |e: &ComputeError| e.kind.is_transient(),
        )
    }
}

impl RetryPolicy<DeliveryError> {
    /// Webhook retries: every failure is retried until `max_attempts` POSTs were made
    pub fn for_callbacks(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self::new(
            max_attempts.saturating_sub(1),
            Backoff::exponential(base, max),
            Jitter::Full,
            |_: &DeliveryError| true,
        )
    }
}
