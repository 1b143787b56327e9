// powq Core - Admission, dispatch and delivery logic & Ports
// NO infrastructure dependencies: Redis, HTTP and hashing live in adapter crates

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
