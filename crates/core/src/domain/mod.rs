// Domain Layer - Pure business logic and entities

pub mod algorithm;
pub mod callback;
pub mod error;
pub mod job;

// Re-exports
pub use algorithm::{normalize_difficulty, total_iterations, HashAlgorithm, ITERATIONS_PER_CYCLE};
pub use callback::{CallbackAttempt, CallbackRecord, CallbackStatus};
pub use error::DomainError;
pub use job::{round_ms, Job, JobId, JobRequest, JobResult, JobSnapshot, JobState};
