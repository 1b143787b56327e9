// Redis Connection Setup

use powq_core::error::AppError;
use redis::aio::ConnectionManager;
use redis::{ErrorKind, RedisError};

/// Open a connection manager (reconnects automatically) and check it with PING
pub async fn connect(redis_url: &str) -> Result<ConnectionManager, AppError> {
    let client = redis::Client::open(redis_url).map_err(map_redis_error)?;
    let mut conn = ConnectionManager::new(client)
        .await
        .map_err(map_redis_error)?;

    redis::cmd("PING")
        .query_async::<_, String>(&mut conn)
        .await
        .map_err(map_redis_error)?;

    Ok(conn)
}

// Helper to convert redis errors to AppError with structured information
pub fn map_redis_error(err: RedisError) -> AppError {
    match err.kind() {
        ErrorKind::IoError => AppError::Store(format!("Redis I/O error: {}", err)),
        ErrorKind::AuthenticationFailed => {
            AppError::Store(format!("Redis authentication failed: {}", err))
        }
        ErrorKind::TypeError => AppError::Store(format!("Unexpected Redis reply: {}", err)),
        ErrorKind::BusyLoadingError | ErrorKind::TryAgain => {
            AppError::Store(format!("Redis busy: {}", err))
        }
        _ => AppError::Store(format!("Redis error: {}", err)),
    }
}
