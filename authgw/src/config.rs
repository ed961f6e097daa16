//! Auth Gateway configuration, loaded the way the teacher's
//! `server/src/config.rs` loads its own: a typed struct tree built through
//! the `config` crate, environment overrides, then `dotenvy` for local
//! `.env` files. The TOML file path is resolved from `AUTHGW_CONFIG`
//! (spec §6), falling back to `authgw.toml` in the working directory.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8081
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Apikey,
    Hmac,
    Any,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_mode")]
    pub mode: AuthMode,
    #[serde(default = "default_clock_skew")]
    pub clock_skew_sec: i64,
    #[serde(default)]
    pub require_nonce: bool,
}

fn default_mode() -> AuthMode {
    AuthMode::Hmac
}
fn default_clock_skew() -> i64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub api_key: String,
    pub secret: String,
    pub emitter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitTier {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_capacity")]
    pub capacity: f64,
    #[serde(default = "default_refill")]
    pub refill_per_sec: f64,
    #[serde(default)]
    pub per_emitter: HashMap<String, RateLimitTier>,
}

fn default_capacity() -> f64 {
    50.0
}
fn default_refill() -> f64 {
    10.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForwardConfig {
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout_sec: u64,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfigToml {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    100
}
fn default_max_delay() -> u64 {
    1500
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: f64,
    #[serde(default = "default_half_open_after")]
    pub half_open_after_sec: u64,
}

fn default_failure_threshold() -> f64 {
    0.5
}
fn default_half_open_after() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackpressureConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_true() -> bool {
    true
}
fn default_max_body_bytes() -> usize {
    1_048_576
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthGwConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: RateLimitConfig,
    pub forward: ForwardConfig,
    #[serde(default = "RetryConfigToml::default_cfg")]
    pub retries: RetryConfigToml,
    #[serde(default = "default_breaker")]
    pub breaker: BreakerConfig,
    #[serde(default = "default_backpressure")]
    pub backpressure: BackpressureConfig,
    #[serde(default)]
    pub redis: RedisConfig,
}

fn default_server() -> ServerConfig {
    ServerConfig { host: default_host(), port: default_port() }
}
fn default_rate_limit() -> RateLimitConfig {
    RateLimitConfig { capacity: default_capacity(), refill_per_sec: default_refill(), per_emitter: HashMap::new() }
}
fn default_breaker() -> BreakerConfig {
    BreakerConfig { failure_threshold: default_failure_threshold(), half_open_after_sec: default_half_open_after() }
}
fn default_backpressure() -> BackpressureConfig {
    BackpressureConfig { enabled: true, max_body_bytes: default_max_body_bytes() }
}

impl RetryConfigToml {
    fn default_cfg() -> Self {
        Self { max_attempts: default_max_attempts(), base_delay_ms: default_base_delay(), max_delay_ms: default_max_delay() }
    }
}

impl AuthGwConfig {
    /// Load configuration from the file named by `AUTHGW_CONFIG` (or
    /// `authgw.toml` if unset), then apply `AUTHGW__`-prefixed environment
    /// overrides, mirroring the teacher's layered `config::Config` build.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let path = std::env::var("AUTHGW_CONFIG").unwrap_or_else(|_| "authgw.toml".to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(true))
            .add_source(config::Environment::with_prefix("AUTHGW").separator("__"));
        let cfg: AuthGwConfig = builder.build()?.try_deserialize()?;
        Ok(cfg)
    }
}
