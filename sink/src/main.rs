//! Core Sink binary (spec §4.7): the terminal endpoint appending
//! normalized records to day-partitioned NDJSON files.

mod config;
mod handlers;
mod metrics;
mod storage;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use config::CoreConfig;
use metrics::Metrics;
use storage::Sink;

pub struct AppState {
    pub config: CoreConfig,
    pub sink: Sink,
    pub metrics: Metrics,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = CoreConfig::load()?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let sink = Sink::new(&config.sink.dir, config.sink.ring_size)?;
    let state = Arc::new(AppState { config, sink, metrics: Metrics::new() });

    let app = Router::new()
        .route("/v1/logs", post(handlers::ingest_logs))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("core sink listening on {addr}");
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
