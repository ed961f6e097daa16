//! Core Sink configuration.

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
    8095
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_dir")]
    pub dir: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_ring_size")]
    pub ring_size: usize,
}

fn default_dir() -> String {
    "./data".to_string()
}
fn default_max_body_bytes() -> usize {
    5_242_880
}
fn default_max_items() -> usize {
    10_000
}
fn default_ring_size() -> usize {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,
    #[serde(default = "default_sink")]
    pub sink: SinkConfig,
}

fn default_server() -> ServerConfig {
    ServerConfig { host: default_host(), port: default_port() }
}
fn default_sink() -> SinkConfig {
    SinkConfig { dir: default_dir(), max_body_bytes: default_max_body_bytes(), max_items: default_max_items(), ring_size: default_ring_size() }
}

impl CoreConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let path = std::env::var("CORE_CONFIG").unwrap_or_else(|_| "core.toml".to_string());
        let builder = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(config::Environment::with_prefix("CORE").separator("__"));
        Ok(builder.build()?.try_deserialize()?)
    }
}
