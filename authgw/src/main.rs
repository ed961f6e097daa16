//! Auth Gateway binary: the front door of the LogOps ingestion pipeline
//! (spec §4.1-§4.4). Router/middleware layering and startup sequence follow
//! the teacher's `server/src/main.rs`.

mod auth;
mod backpressure;
mod config;
mod error;
mod forwarder;
mod metrics;
mod rate_limit;
mod state;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use auth::RequestContext;
use config::AuthGwConfig;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AuthGwConfig::load()?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config).await?);

    let app = Router::new()
        .route("/ingest", post(ingest_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn_with_state(state.clone(), backpressure::backpressure_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("authgw listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ingest_handler(
    state: State<Arc<AppState>>,
    headers: HeaderMap,
    ctx: axum::extract::Extension<RequestContext>,
    body: Bytes,
) -> Response {
    state.metrics.inc_requests();
    state.metrics.inflight_inc();
    let content_type = headers.get("Content-Type").and_then(|v| v.to_str().ok()).unwrap_or("application/octet-stream").to_string();
    let response = forwarder::forward(state.clone(), ctx.0, "POST".to_string(), "/ingest".to_string(), content_type, body).await;
    state.metrics.inflight_dec();
    response
}

async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    if let Some(url) = state.config.redis.url.clone() {
        match redis::Client::open(url) {
            Ok(client) => match client.get_connection_manager().await {
                Ok(mut conn) => {
                    let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
                    if pong.is_ok() {
                        return axum::Json(serde_json::json!({"ok": true})).into_response();
                    }
                    (StatusCode::OK, axum::Json(serde_json::json!({"ok": false}))).into_response()
                }
                Err(_) => (StatusCode::OK, axum::Json(serde_json::json!({"ok": false}))).into_response(),
            },
            Err(_) => (StatusCode::OK, axum::Json(serde_json::json!({"ok": false}))).into_response(),
        }
    } else {
        axum::Json(serde_json::json!({"ok": true})).into_response()
    }
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}
