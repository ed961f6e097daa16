//! Shared application state for the Auth Gateway, built once at startup and
//! handed to every handler/middleware as `axum::extract::State`, mirroring
//! the teacher's `AppState` in `server/src/main.rs`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use logops_core::breaker::Breaker;
use logops_core::bucket::TokenBucketRegistry;
use logops_core::nonce::{MemoryNonceStore, NonceStore, RedisNonceStore};

use crate::config::AuthGwConfig;
use crate::metrics::Metrics;

pub struct Client {
    pub secret: Vec<u8>,
    pub emitter: String,
}

pub struct AppState {
    pub config: AuthGwConfig,
    pub clients: HashMap<String, Client>,
    pub nonce_store: Arc<dyn NonceStore>,
    pub default_bucket: TokenBucketRegistry,
    pub per_emitter_buckets: HashMap<String, TokenBucketRegistry>,
    pub breaker: Breaker,
    pub http: reqwest::Client,
    pub metrics: Metrics,
}

impl AppState {
    pub async fn new(config: AuthGwConfig) -> anyhow::Result<Self> {
        let clients = config
            .clients
            .iter()
            .map(|c| (c.api_key.clone(), Client { secret: c.secret.as_bytes().to_vec(), emitter: c.emitter.clone() }))
            .collect();

        let nonce_store: Arc<dyn NonceStore> = if let Some(url) = config.redis.url.clone() {
            let client = redis::Client::open(url)?;
            let conn = client.get_connection_manager().await?;
            Arc::new(RedisNonceStore::new(conn, "authgw:nonce"))
        } else {
            Arc::new(MemoryNonceStore::new())
        };

        let per_emitter_buckets = config
            .rate_limit
            .per_emitter
            .iter()
            .map(|(emitter, tier)| (emitter.clone(), TokenBucketRegistry::new(tier.capacity, tier.refill_per_sec)))
            .collect();

        let breaker = Breaker::new(
            logops_core::breaker::parse_failure_threshold(config.breaker.failure_threshold),
            Duration::from_secs(config.breaker.half_open_after_sec),
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.forward.timeout_sec))
            .build()?;

        Ok(Self {
            default_bucket: TokenBucketRegistry::new(config.rate_limit.capacity, config.rate_limit.refill_per_sec),
            per_emitter_buckets,
            clients,
            nonce_store,
            breaker,
            http,
            metrics: Metrics::new(),
            config,
        })
    }

    /// The bucket registry to consult for `emitter`: a per-emitter override
    /// if configured, else the shared default.
    pub fn bucket_for(&self, emitter: &str) -> &TokenBucketRegistry {
        self.per_emitter_buckets.get(emitter).unwrap_or(&self.default_bucket)
    }

    pub fn rate_limit_capacity_for(&self, emitter: &str) -> f64 {
        self.config
            .rate_limit
            .per_emitter
            .get(emitter)
            .map(|t| t.capacity)
            .unwrap_or(self.config.rate_limit.capacity)
    }
}
