//! Crate-level integration test: CSV body in, normalized batch forwarded to
//! a minimal in-process downstream, downstream response returned verbatim.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::Router;
use tower::ServiceExt;

#[path = "../src/config.rs"]
mod config;
#[path = "../src/forwarder.rs"]
mod forwarder;
#[path = "../src/handlers.rs"]
mod handlers;
#[path = "../src/metrics.rs"]
mod metrics;
#[path = "../src/normalize.rs"]
mod normalize;
#[path = "../src/parsers.rs"]
mod parsers;

use config::{ForwardConfig, NormalizerConfig, RetryConfigToml, ServerConfig};
use logops_core::retry::RetryConfig;
use metrics::Metrics;

pub struct AppState {
    pub config: NormalizerConfig,
    pub http: reqwest::Client,
    pub retry: RetryConfig,
    pub metrics: Metrics,
}

async fn spawn_sink(received_len: Arc<std::sync::atomic::AtomicUsize>) -> SocketAddr {
    async fn sink(
        axum::extract::State(counter): axum::extract::State<Arc<std::sync::atomic::AtomicUsize>>,
        body: axum::body::Bytes,
    ) -> axum::response::Response {
        use axum::response::IntoResponse;
        let records: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let n = records.as_array().map(|a| a.len()).unwrap_or(0);
        counter.fetch_add(n, std::sync::atomic::Ordering::SeqCst);
        (StatusCode::OK, axum::Json(serde_json::json!({"accepted": n}))).into_response()
    }
    let app = Router::new().route("/v1/logs", post(sink)).with_state(received_len);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn csv_batch_is_normalized_and_forwarded() {
    let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let sink_addr = spawn_sink(counter.clone()).await;

    let config = NormalizerConfig {
        server: ServerConfig { host: "127.0.0.1".into(), port: 0 },
        forward: ForwardConfig { url: format!("http://{sink_addr}/v1/logs"), timeout_sec: 5 },
        retries: RetryConfigToml { max_attempts: 2, base_delay_ms: 5, max_delay_ms: 20 },
    };
    let http = reqwest::Client::builder().timeout(Duration::from_secs(5)).build().unwrap();
    let retry = RetryConfig::new(config.retries.max_attempts, config.retries.base_delay_ms, config.retries.max_delay_ms);
    let state = Arc::new(AppState { config, http, retry, metrics: Metrics::new() });

    let app = Router::new().route("/v1/logs", post(handlers::ingest_logs)).with_state(state);

    let body = "ts,level,msg\n2025-01-01T00:00:00Z,info,\"hello, world\"\n,,bare\n";
    let req = Request::builder()
        .method("POST")
        .uri("/v1/logs")
        .header("Content-Type", "text/csv")
        .header("X-Emitter", "csv")
        .header("X-Scenario-Id", "scn-9")
        .body(Body::from(body))
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["accepted"], 2);
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalid_json_array_reports_indices_on_422() {
    let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let sink_addr = spawn_sink(counter).await;
    let config = NormalizerConfig {
        server: ServerConfig { host: "127.0.0.1".into(), port: 0 },
        forward: ForwardConfig { url: format!("http://{sink_addr}/v1/logs"), timeout_sec: 5 },
        retries: RetryConfigToml::default(),
    };
    let http = reqwest::Client::new();
    let retry = RetryConfig::default();
    let state = Arc::new(AppState { config, http, retry, metrics: Metrics::new() });
    let app = Router::new().route("/v1/logs", post(handlers::ingest_logs)).with_state(state);

    let req = Request::builder()
        .method("POST")
        .uri("/v1/logs")
        .header("Content-Type", "application/json")
        .body(Body::from("[1,2,3]"))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
