// Compute Port
// The per-seed CPU routine is an external collaborator; the core only
// needs its output, its elapsed time and a failure classification.

use crate::domain::HashAlgorithm;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Output of one compute invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeOutput {
    pub hash: String,
    pub nonce: u64,
    pub elapsed: Duration,
}

/// Failure classes a compute call can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeErrorKind {
    /// Memory or other resource exhaustion
    ResourceExhausted,
    /// OS-level I/O failure
    Io,
    /// Connection to a dependency failed
    Connection,
    /// Anything else, never retried
    Permanent,
}

impl ComputeErrorKind {
    pub fn is_transient(&self) -> bool {
        !matches!(self, ComputeErrorKind::Permanent)
    }
}

/// Compute errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct ComputeError {
    pub kind: ComputeErrorKind,
    pub message: String,
}

impl ComputeError {
    pub fn new(kind: ComputeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ComputeErrorKind::Permanent, message)
    }
}

impl From<std::io::Error> for ComputeError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::OutOfMemory => ComputeErrorKind::ResourceExhausted,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected => ComputeErrorKind::Connection,
            _ => ComputeErrorKind::Io,
        };
        Self::new(kind, err.to_string())
    }
}

/// Compute collaborator
///
/// Must be deterministic: identical (seed, difficulty, algorithm) always
/// yields identical hash and nonce, which makes redelivery harmless.
#[async_trait]
pub trait Compute: Send + Sync {
    async fn compute(
        &self,
        seed: &str,
        difficulty: u32,
        algorithm: HashAlgorithm,
    ) -> Result<ComputeOutput, ComputeError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::total_iterations;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock compute behavior for a single call
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Deterministic fake output
        Success,
        /// Fail with the given class
        Fail(ComputeErrorKind, String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// Mock compute that replays a script, then falls back to a default
    pub struct ScriptedCompute {
        script: Mutex<VecDeque<MockBehavior>>,
        fallback: MockBehavior,
        call_count: AtomicUsize,
    }

    impl ScriptedCompute {
        pub fn new(script: Vec<MockBehavior>, fallback: MockBehavior) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn new_success() -> Self {
            Self::new(vec![], MockBehavior::Success)
        }

        /// Fail `times` times with `kind`, then succeed
        pub fn failing_then_success(kind: ComputeErrorKind, times: usize) -> Self {
            let script = (0..times)
                .map(|i| MockBehavior::Fail(kind, format!("scripted failure {}", i + 1)))
                .collect();
            Self::new(script, MockBehavior::Success)
        }

        pub fn always_failing(kind: ComputeErrorKind) -> Self {
            Self::new(vec![], MockBehavior::Fail(kind, "scripted failure".to_string()))
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Output the mock produces for a successful call
        pub fn expected_hash(seed: &str, difficulty: u32, algorithm: HashAlgorithm) -> String {
            format!("mock:{}:{}:{}", algorithm, difficulty, seed)
        }
    }

    #[async_trait]
    impl Compute for ScriptedCompute {
        async fn compute(
            &self,
            seed: &str,
            difficulty: u32,
            algorithm: HashAlgorithm,
        ) -> Result<ComputeOutput, ComputeError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            let behavior = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());

            match behavior {
                MockBehavior::Success => Ok(ComputeOutput {
                    hash: Self::expected_hash(seed, difficulty, algorithm),
                    nonce: total_iterations(difficulty),
                    elapsed: Duration::from_millis(3),
                }),
                MockBehavior::Fail(kind, msg) => Err(ComputeError::new(kind, msg)),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
            }
        }
    }
}
