//! Ingest Normalizer binary (spec §4.5-§4.6): accepts JSON/CSV/plain-text
//! batches, normalizes and masks them, enforces trusted labels, and
//! forwards to the Core Sink with retry (no breaker).

mod config;
mod forwarder;
mod handlers;
mod metrics;
mod normalize;
mod parsers;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;

use config::NormalizerConfig;
use logops_core::retry::RetryConfig;
use metrics::Metrics;

pub struct AppState {
    pub config: NormalizerConfig,
    pub http: reqwest::Client,
    pub retry: RetryConfig,
    pub metrics: Metrics,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = NormalizerConfig::load()?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let http = reqwest::Client::builder().timeout(Duration::from_secs(config.forward.timeout_sec)).build()?;
    let retry = RetryConfig::new(config.retries.max_attempts, config.retries.base_delay_ms, config.retries.max_delay_ms);

    let state = Arc::new(AppState { config, http, retry, metrics: Metrics::new() });

    let app = Router::new()
        .route("/v1/logs", post(handlers::ingest_logs))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("normalizer listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({"ok": true}))
}

async fn metrics_handler(axum::extract::State(state): axum::extract::State<Arc<AppState>>) -> String {
    state.metrics.render()
}
