//! HMAC authentication middleware (spec §4.1). Grounded on `server/src/auth.rs`'s
//! signature-verification middleware, generalized to the four-mode policy
//! (`none`/`apikey`/`hmac`/`any`) and the full canonical-string + nonce +
//! clock-skew contract spec.md spells out.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use logops_core::canonical::{canonical_string, parse_iso8601_utc, sha256_hex, HmacSigner};

use crate::config::AuthMode;
use crate::error::AuthGwError;
use crate::state::AppState;

/// Per-request authenticated context, threaded through extensions to the
/// rate-limit middleware and the forwarder.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub emitter: String,
    pub api_key: Option<String>,
    pub client_ip: String,
    pub scenario_id: String,
}

const BYPASS_PATHS: &[&str] = &["/healthz", "/metrics"];

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn scenario_id(headers: &HeaderMap) -> String {
    header_str(headers, "X-Scenario-Id")
        .or_else(|| header_str(headers, "X-Scenario"))
        .unwrap_or("na")
        .to_string()
}

fn client_ip(headers: &HeaderMap) -> String {
    header_str(headers, "X-Forwarded-For")
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn auth_middleware(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if BYPASS_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    match authenticate(&state, request).await {
        Ok((request, ctx)) => {
            let mut request = request;
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => {
            state.metrics.inc_rejected(err.reason());
            err.into_response()
        }
    }
}

async fn authenticate(state: &AppState, request: Request) -> Result<(Request, RequestContext), AuthGwError> {
    let mode = &state.config.auth.mode;
    let (parts, body) = request.into_parts();
    let headers = parts.headers.clone();

    if matches!(mode, AuthMode::None) {
        let ctx = RequestContext {
            emitter: header_str(&headers, "X-Emitter").unwrap_or("unknown").to_string(),
            api_key: None,
            client_ip: client_ip(&headers),
            scenario_id: scenario_id(&headers),
        };
        let request = Request::from_parts(parts, body);
        return Ok((request, ctx));
    }

    let api_key = header_str(&headers, "X-Api-Key").ok_or(AuthGwError::UnknownClient)?;
    let client = state.clients.get(api_key).ok_or(AuthGwError::UnknownClient)?;

    let has_hmac_headers = headers.contains_key("X-Timestamp")
        && headers.contains_key("X-Content-SHA256")
        && headers.contains_key("X-Signature");

    let do_full_hmac = match mode {
        AuthMode::Apikey => false,
        AuthMode::Hmac => true,
        AuthMode::Any => has_hmac_headers,
        AuthMode::None => unreachable!(),
    };

    if !do_full_hmac {
        let ctx = RequestContext {
            emitter: client.emitter.clone(),
            api_key: Some(api_key.to_string()),
            client_ip: client_ip(&headers),
            scenario_id: scenario_id(&headers),
        };
        let request = Request::from_parts(parts, body);
        return Ok((request, ctx));
    }

    let ts_raw = header_str(&headers, "X-Timestamp").ok_or(AuthGwError::ClockSkew { parse_error: true })?;
    let ts = parse_iso8601_utc(ts_raw).map_err(|_| AuthGwError::ClockSkew { parse_error: true })?;
    let now = Utc::now();
    let skew = (now - ts).num_seconds().abs();
    if skew > state.config.auth.clock_skew_sec {
        return Err(AuthGwError::ClockSkew { parse_error: false });
    }

    let nonce = header_str(&headers, "X-Nonce").unwrap_or("");
    if state.config.auth.require_nonce {
        if nonce.is_empty() {
            return Err(AuthGwError::BadNonce);
        }
        let key = format!("{api_key}:{nonce}");
        let ttl = Duration::from_secs(state.config.auth.clock_skew_sec.max(60) as u64);
        let first_seen = state.nonce_store.check_and_set(&key, ttl).await.map_err(|_| AuthGwError::BadNonce)?;
        if !first_seen {
            return Err(AuthGwError::BadNonce);
        }
    }

    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| AuthGwError::BadSignature { digest_mismatch: true })?;

    let provided_digest = header_str(&headers, "X-Content-SHA256").ok_or(AuthGwError::BadSignature { digest_mismatch: true })?;
    let computed_digest = sha256_hex(&body_bytes);
    if !computed_digest.eq_ignore_ascii_case(provided_digest) {
        return Err(AuthGwError::BadSignature { digest_mismatch: true });
    }

    let provided_signature = header_str(&headers, "X-Signature").ok_or(AuthGwError::BadSignature { digest_mismatch: false })?;
    let canonical = canonical_string(parts.method.as_str(), parts.uri.path(), &computed_digest, ts_raw, nonce);
    let signer = HmacSigner::new(client.secret.clone());
    if !signer.verify(&canonical, provided_signature) {
        return Err(AuthGwError::BadSignature { digest_mismatch: false });
    }

    let ctx = RequestContext {
        emitter: client.emitter.clone(),
        api_key: Some(api_key.to_string()),
        client_ip: client_ip(&headers),
        scenario_id: scenario_id(&headers),
    };

    let request = Request::from_parts(parts, Body::from(body_bytes));
    Ok((request, ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, AuthGwConfig, ForwardConfig};
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn test_config(mode: AuthMode, require_nonce: bool) -> AuthGwConfig {
        AuthGwConfig {
            server: crate::config::ServerConfig { host: "127.0.0.1".into(), port: 0 },
            auth: AuthConfig { mode, clock_skew_sec: 30, require_nonce },
            clients: vec![crate::config::ClientConfig {
                api_key: "k1".into(),
                secret: "s1".into(),
                emitter: "json".into(),
            }],
            rate_limit: crate::config::RateLimitConfig { capacity: 50.0, refill_per_sec: 10.0, per_emitter: Default::default() },
            forward: ForwardConfig { url: "http://127.0.0.1:0/v1/logs".into(), timeout_sec: 5, headers: Default::default() },
            retries: crate::config::RetryConfigToml { max_attempts: 3, base_delay_ms: 10, max_delay_ms: 100 },
            breaker: crate::config::BreakerConfig { failure_threshold: 0.5, half_open_after_sec: 30 },
            backpressure: crate::config::BackpressureConfig { enabled: true, max_body_bytes: 1_048_576 },
            redis: Default::default(),
        }
    }

    async fn ok_handler() -> &'static str {
        "ok"
    }

    #[tokio::test]
    async fn valid_hmac_request_is_admitted() {
        let cfg = test_config(AuthMode::Hmac, true);
        let state = Arc::new(AppState::new(cfg).await.unwrap());
        let app = Router::new()
            .route("/ingest", post(ok_handler))
            .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state);

        let body = b"[{\"msg\":\"hello\"}]".to_vec();
        let digest = sha256_hex(&body);
        let ts = "2099-01-01T00:00:00Z";
        let canonical = canonical_string("POST", "/ingest", &digest, ts, "n1");
        let sig = HmacSigner::new(b"s1".to_vec()).sign(&canonical);

        let req = HttpRequest::builder()
            .method("POST")
            .uri("/ingest")
            .header("X-Api-Key", "k1")
            .header("X-Timestamp", ts)
            .header("X-Content-SHA256", digest)
            .header("X-Signature", sig)
            .header("X-Nonce", "n1")
            .body(Body::from(body))
            .unwrap();

        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_api_key_is_rejected() {
        let cfg = test_config(AuthMode::Hmac, false);
        let state = Arc::new(AppState::new(cfg).await.unwrap());
        let app = Router::new()
            .route("/ingest", post(ok_handler))
            .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state);

        let req = HttpRequest::builder()
            .method("POST")
            .uri("/ingest")
            .header("X-Api-Key", "nope")
            .body(Body::empty())
            .unwrap();

        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers().get("X-AuthGW-Reason").unwrap(), "unknown_client");
    }

    #[tokio::test]
    async fn replayed_nonce_is_rejected() {
        let cfg = test_config(AuthMode::Hmac, true);
        let state = Arc::new(AppState::new(cfg).await.unwrap());
        let app = Router::new()
            .route("/ingest", post(ok_handler))
            .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state);

        let body = b"[]".to_vec();
        let digest = sha256_hex(&body);
        let ts = "2099-01-01T00:00:00Z";
        let canonical = canonical_string("POST", "/ingest", &digest, ts, "dup");
        let sig = HmacSigner::new(b"s1".to_vec()).sign(&canonical);

        let build = || {
            HttpRequest::builder()
                .method("POST")
                .uri("/ingest")
                .header("X-Api-Key", "k1")
                .header("X-Timestamp", ts)
                .header("X-Content-SHA256", digest.clone())
                .header("X-Signature", sig.clone())
                .header("X-Nonce", "dup")
                .body(Body::from(body.clone()))
                .unwrap()
        };

        let res1 = app.clone().oneshot(build()).await.unwrap();
        assert_eq!(res1.status(), StatusCode::OK);
        let res2 = app.oneshot(build()).await.unwrap();
        assert_eq!(res2.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res2.headers().get("X-AuthGW-Reason").unwrap(), "bad_nonce");
    }

    #[tokio::test]
    async fn bypass_paths_skip_auth_entirely() {
        let cfg = test_config(AuthMode::Hmac, true);
        let state = Arc::new(AppState::new(cfg).await.unwrap());
        let app = Router::new()
            .route("/healthz", axum::routing::get(ok_handler))
            .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state);

        let req = HttpRequest::builder().uri("/healthz").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
