// powq Infrastructure - System Adapters
// Implements: Compute (repeated hashing), CallbackSender (webhook POST)

pub mod hash_compute;
pub mod http_callback;

pub use hash_compute::HashCompute;
pub use http_callback::HttpCallbackSender;
