// Application Layer - Use Cases and Business Logic

pub mod admission;
pub mod backpressure;
pub mod callback;
pub mod maintenance;
pub mod rate_limit;
pub mod recovery;
pub mod retry;
pub mod worker;

// Re-exports
pub use admission::{AdmissionConfig, AdmissionError, AdmissionLimits, AdmissionService};
pub use backpressure::BackpressureGate;
pub use callback::CallbackDelivery;
pub use maintenance::MaintenanceScheduler;
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use recovery::RecoveryService;
pub use retry::{Backoff, Jitter, RetryDecision, RetryPolicy};
pub use worker::{
    shutdown_channel, ShutdownSender, ShutdownToken, Worker, WorkerContext, WorkerPool,
    WorkerPoolHandle,
};
