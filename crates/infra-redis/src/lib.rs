// powq Infrastructure - Redis Adapter
// Implements: CounterStore, JobQueue (late ack), JobStore (retention via key expiry)

mod connection;
mod counter_store;
mod job_queue;
mod job_store;

pub use connection::{connect, map_redis_error};
pub use counter_store::RedisCounterStore;
pub use job_queue::RedisJobQueue;
pub use job_store::RedisJobStore;

/// Default key namespace
pub const DEFAULT_KEY_PREFIX: &str = "powq";

// Note: redis::RedisError conversion is done by map_redis_error
// (orphan rules prevent From<redis::RedisError> for AppError here)
