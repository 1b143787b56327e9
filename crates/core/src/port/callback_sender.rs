// Callback Sender Port (webhook transport)

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Webhook POST failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Callback timed out after {0}ms")]
    Timeout(u64),

    #[error("Callback connection failed: {0}")]
    Connection(String),

    /// Endpoint answered with a non-2xx status
    #[error("Callback endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Callback failed: {0}")]
    Other(String),
}

impl DeliveryError {
    pub fn is_server_error(&self) -> bool {
        matches!(self, DeliveryError::Status(code) if *code >= 500)
    }
}

/// Posts a JSON body to a client-supplied URL
#[async_trait]
pub trait CallbackSender: Send + Sync {
    /// POST `body` as `application/json`; any non-2xx answer is an error
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<(), DeliveryError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Endpoint that answers HTTP 500 for the first `failures` calls, 200 afterwards
    pub struct FlakyEndpoint {
        failures: u32,
        received: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl FlakyEndpoint {
        pub fn new(failures: u32) -> Self {
            Self {
                failures,
                received: Mutex::new(Vec::new()),
            }
        }

        pub fn attempts(&self) -> usize {
            self.received.lock().unwrap().len()
        }

        pub fn received(&self) -> Vec<(String, serde_json::Value)> {
            self.received.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CallbackSender for FlakyEndpoint {
        async fn post_json(
            &self,
            url: &str,
            body: &serde_json::Value,
            _timeout: Duration,
        ) -> Result<(), DeliveryError> {
            let mut received = self.received.lock().unwrap();
            received.push((url.to_string(), body.clone()));
            if received.len() as u32 <= self.failures {
                Err(DeliveryError::Status(500))
            } else {
                Ok(())
            }
        }
    }
}
