// Webhook POST over reqwest
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use powq_core::port::{CallbackSender, DeliveryError};

pub struct HttpCallbackSender {
    client: reqwest::Client,
}

impl HttpCallbackSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Reuse an existing client (shared connection pool)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpCallbackSender {
    fn default() -> Self {
        Self::new()
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> DeliveryError {
    if err.is_timeout() {
        DeliveryError::Timeout(timeout.as_millis() as u64)
    } else if err.is_connect() {
        DeliveryError::Connection(err.to_string())
    } else {
        DeliveryError::Other(err.to_string())
    }
}

#[async_trait]
impl CallbackSender for HttpCallbackSender {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "Callback POST answered");
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Hook {
        fail_first: usize,
        received: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    }

    async fn receive(State(hook): State<Hook>, headers: HeaderMap, Json(body): Json<Value>) -> StatusCode {
        let content_type = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let mut received = hook.received.lock().unwrap();
        received.push((content_type, body));
        if received.len() <= hook.fail_first {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        }
    }

    async fn serve(hook: Hook) -> String {
        let app = Router::new().route("/hook", post(receive)).with_state(hook);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/hook", addr)
    }

    #[tokio::test]
    async fn test_posts_json_and_maps_status() {
        let hook = Hook {
            fail_first: 1,
            ..Hook::default()
        };
        let url = serve(hook.clone()).await;
        let sender = HttpCallbackSender::new();
        let body = json!({"requestId": "job-1", "result": {"status": "done"}});

        let first = sender.post_json(&url, &body, Duration::from_secs(5)).await;
        assert_eq!(first, Err(DeliveryError::Status(500)));
        assert!(first.unwrap_err().is_server_error());

        sender.post_json(&url, &body, Duration::from_secs(5)).await.unwrap();

        let received = hook.received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1].0.as_deref(), Some("application/json"));
        assert_eq!(received[1].1, body);
    }

    #[tokio::test]
    async fn test_refused_connection_is_connection_error() {
        // bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpCallbackSender::new()
            .post_json(&format!("http://{}/hook", addr), &json!({}), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Connection(_)), "{:?}", err);
    }
}
