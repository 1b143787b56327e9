// HTTP surface tests: drive the router in-process with tower's oneshot

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use powq_api_http::{build_router, AppState};
use powq_core::application::{AdmissionConfig, AdmissionService};
use powq_core::port::compute::mocks::ScriptedCompute;
use powq_core::port::id_provider::mocks::SequentialIdProvider;
use powq_core::port::time_provider::mocks::ManualClock;
use powq_core::port::{Compute, TimeProvider};
use powq_infra_memory::{InMemoryCounterStore, InMemoryJobQueue, InMemoryJobStore};
use powq_infra_system::HashCompute;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "s3cret";

fn app_with(config: AdmissionConfig, compute: Arc<dyn Compute>, secret: Option<&str>) -> Router {
    let clock: Arc<dyn TimeProvider> = Arc::new(ManualClock::new(1_700_000_000_000));
    let admission = AdmissionService::new(
        Arc::new(InMemoryCounterStore::new(Arc::clone(&clock))),
        Arc::new(InMemoryJobQueue::new(Arc::clone(&clock))),
        Arc::new(InMemoryJobStore::new(Duration::from_secs(3600), Arc::clone(&clock))),
        compute,
        Arc::new(SequentialIdProvider::new("job")),
        Arc::clone(&clock),
        config,
    );
    build_router(AppState {
        admission: Arc::new(admission),
        time_provider: clock,
        service_name: "powq-test".to_string(),
        admission_secret: secret.map(str::to_string),
    })
}

fn app() -> Router {
    app_with(
        AdmissionConfig::default(),
        Arc::new(ScriptedCompute::new_success()),
        Some(SECRET),
    )
}

fn post(path: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-admission-secret", SECRET)
        .body(body.into())
        .unwrap()
}

async fn json_body(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let resp = app()
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "powq-test");
    assert_eq!(body["timestamp"], 1_700_000_000_000i64);
}

#[tokio::test]
async fn test_missing_or_wrong_secret_is_unauthorized() {
    let app = app();
    let body = json!({"seeds": ["a"]}).to_string();

    let no_secret = Request::builder()
        .method("POST")
        .uri("/api/async")
        .body(Body::from(body.clone()))
        .unwrap();
    let resp = app.clone().oneshot(no_secret).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(json_body(resp).await["error"].is_string());

    let wrong = Request::builder()
        .method("POST")
        .uri("/api/sync")
        .header("x-admission-secret", "nope")
        .body(Body::from(body))
        .unwrap();
    let resp = app.oneshot(wrong).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_does_not_require_secret() {
    let req = Request::builder()
        .method("POST")
        .uri("/api/async/status")
        .body(Body::from(json!({"requestIds": ["nope"]}).to_string()))
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_json_and_bad_seeds() {
    let app = app();

    let resp = app.clone().oneshot(post("/api/async", "{not json")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "Invalid JSON body");

    let resp = app
        .oneshot(post("/api/sync", json!({"seeds": ["a", 7]}).to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "Seeds must be a list of strings.");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let config = AdmissionConfig {
        limits: powq_core::application::AdmissionLimits {
            max_body_bytes: 64,
            ..Default::default()
        },
        ..AdmissionConfig::default()
    };
    let app = app_with(config, Arc::new(ScriptedCompute::new_success()), Some(SECRET));
    let big = json!({"seeds": ["x".repeat(200)]}).to_string();

    let resp = app.oneshot(post("/api/async", big)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let error = json_body(resp).await["error"].as_str().unwrap().to_string();
    assert!(error.contains("64"), "{}", error);
}

#[tokio::test]
async fn test_rate_limit_returns_429_with_retry_after() {
    let config = AdmissionConfig {
        rate_limit: 2,
        ..AdmissionConfig::default()
    };
    let app = app_with(config, Arc::new(ScriptedCompute::new_success()), Some(SECRET));
    let body = json!({"seeds": ["a"]}).to_string();

    for _ in 0..2 {
        let resp = app.clone().oneshot(post("/api/async", body.clone())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = app.clone().oneshot(post("/api/async", body.clone())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = resp.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1 && retry_after <= 60);

    // A different API key is a different identity
    let mut other = post("/api/async", body);
    other.headers_mut().insert("x-api-key", "other".parse().unwrap());
    let resp = app.oneshot(other).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_backpressure_returns_503_with_retry_after() {
    let config = AdmissionConfig {
        backpressure_threshold: 1,
        overload_retry_after_secs: 7,
        ..AdmissionConfig::default()
    };
    let app = app_with(config, Arc::new(ScriptedCompute::new_success()), Some(SECRET));
    let body = json!({"seeds": ["a"]}).to_string();

    let resp = app.clone().oneshot(post("/api/async", body.clone())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.clone().oneshot(post("/api/async", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.headers()[header::RETRY_AFTER], "7");

    // Sync submissions do not consult the queue
    let resp = app
        .oneshot(post("/api/sync", json!({"seeds": ["b"]}).to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_sync_computes_real_hashes() {
    let app = app_with(AdmissionConfig::default(), Arc::new(HashCompute::new()), Some(SECRET));
    let body = json!({"seeds": ["alpha", "beta"], "difficulty": 1, "algorithm": "sha256"});

    let resp = app.oneshot(post("/api/sync", body.to_string())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(body["totalMs"].as_f64().unwrap() >= 0.0);

    for (i, result) in results.iter().enumerate() {
        assert_eq!(result["cycle"], i as u64 + 1);
        assert_eq!(result["status"], "done");
        assert_eq!(result["nonce"], 50_000);
        assert!(result["queueTimeMs"].is_null());
        let hash = result["hash"].as_str().unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
    assert_ne!(results[0]["hash"], results[1]["hash"]);
}

#[tokio::test]
async fn test_async_then_status() {
    let app = app();
    let resp = app
        .clone()
        .oneshot(post("/api/async", json!({"seeds": ["a", "b"]}).to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let acks = json_body(resp).await["acks"].as_array().unwrap().clone();
    assert_eq!(acks.len(), 2);
    assert_eq!(acks[0]["seed"], "a");
    assert_eq!(acks[1]["cycle"], 2);

    let ids: Vec<Value> = acks.iter().map(|a| a["requestId"].clone()).collect();
    let resp = app
        .oneshot(post(
            "/api/async/status",
            json!({"requestIds": [ids[0], ids[1], "missing"]}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let results = json_body(resp).await["results"].as_array().unwrap().clone();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["requestId"], ids[0]);
    assert_eq!(results[0]["status"], "queued");
    assert_eq!(results[0]["seed"], "a");

    // Unknown ids get the neutral snapshot
    assert_eq!(results[2]["status"], "queued");
    assert_eq!(results[2]["attempts"], 1);
    assert!(results[2]["hash"].is_null());
    assert!(results[2]["seed"].is_null());
}

#[tokio::test]
async fn test_no_secret_configured_allows_submit() {
    let app = app_with(
        AdmissionConfig::default(),
        Arc::new(ScriptedCompute::new_success()),
        None,
    );
    let req = Request::builder()
        .method("POST")
        .uri("/api/async")
        .body(Body::from(json!({"seeds": ["a"]}).to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cors_preflight_skips_secret_check() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/async")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(resp.status().is_success(), "{}", resp.status());
    let headers = resp.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN].to_str().unwrap(),
        "*"
    );
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    for method in ["GET", "HEAD", "POST", "OPTIONS"] {
        assert!(methods.contains(method), "{}", methods);
    }
    let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap();
    assert!(allowed.contains("content-type"), "{}", allowed);
}

#[tokio::test]
async fn test_cross_origin_responses_carry_allow_origin() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header(header::ORIGIN, "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN].to_str().unwrap(),
        "*"
    );
}
