// Port Layer - Interfaces for external dependencies

pub mod callback_sender;
pub mod compute;
pub mod counter_store;
pub mod id_provider; // For deterministic testing
pub mod job_queue;
pub mod job_store;
pub mod time_provider;

// Re-exports
pub use callback_sender::{CallbackSender, DeliveryError};
pub use compute::{Compute, ComputeError, ComputeErrorKind, ComputeOutput};
pub use counter_store::{CounterStore, WindowCount};
pub use id_provider::IdProvider;
pub use job_queue::{JobQueue, Reservation};
pub use job_store::JobStore;
pub use time_provider::TimeProvider;
