//! Ingest Normalizer configuration, loaded the same layered way as the
//! Auth Gateway's (`config` crate + env overrides + `dotenvy`).

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
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForwardConfig {
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout_sec: u64,
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

impl Default for RetryConfigToml {
    fn default() -> Self {
        Self { max_attempts: default_max_attempts(), base_delay_ms: default_base_delay(), max_delay_ms: default_max_delay() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizerConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,
    pub forward: ForwardConfig,
    #[serde(default)]
    pub retries: RetryConfigToml,
}

fn default_server() -> ServerConfig {
    ServerConfig { host: default_host(), port: default_port() }
}

impl NormalizerConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let path = std::env::var("NORMALIZER_CONFIG").unwrap_or_else(|_| "normalizer.toml".to_string());
        let builder = config::Config::builder()
            .add_source(config::File::with_name(&path).required(true))
            .add_source(config::Environment::with_prefix("NORMALIZER").separator("__"));
        Ok(builder.build()?.try_deserialize()?)
    }
}
