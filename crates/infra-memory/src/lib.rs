// powq Infrastructure - In-Memory Adapters
// Implements: CounterStore, JobQueue, JobStore
//
// State lives in this process only. Suitable for a single node and for tests;
// multi-instance deployments use the Redis adapters.

mod counter_store;
mod job_queue;
mod job_store;

pub use counter_store::InMemoryCounterStore;
pub use job_queue::InMemoryJobQueue;
pub use job_store::InMemoryJobStore;
