use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_yields_url")]
    pub yields_url: String,
    #[serde(default = "default_prices_url")]
    pub prices_url: String,
    #[serde(default = "default_tvl_url")]
    pub tvl_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff")]
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_yields_ttl")]
    pub yields_ttl_secs: u64,
    #[serde(default = "default_prices_ttl")]
    pub prices_ttl_secs: u64,
    #[serde(default = "default_tvl_ttl")]
    pub tvl_ttl_secs: u64,
    #[serde(default = "default_risk_ttl")]
    pub risk_ttl_secs: u64,
    #[serde(default = "default_capacity")]
    pub max_entries: usize,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_yields_url() -> String { "https://yields.llama.fi".to_string() }
fn default_prices_url() -> String { "https://api.coingecko.com/api/v3".to_string() }
fn default_tvl_url() -> String { "https://api.llama.fi".to_string() }
fn default_timeout() -> u64 { 10 }
fn default_retries() -> u32 { 2 }
fn default_backoff() -> u64 { 250 }
fn default_yields_ttl() -> u64 { 600 }
fn default_prices_ttl() -> u64 { 300 }
fn default_tvl_ttl() -> u64 { 1800 }
fn default_risk_ttl() -> u64 { 3600 }
fn default_capacity() -> usize { 256 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            yields_url: default_yields_url(),
            prices_url: default_prices_url(),
            tvl_url: default_tvl_url(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            retry_backoff_ms: default_backoff(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            yields_ttl_secs: default_yields_ttl(),
            prices_ttl_secs: default_prices_ttl(),
            tvl_ttl_secs: default_tvl_ttl(),
            risk_ttl_secs: default_risk_ttl(),
            max_entries: default_capacity(),
        }
    }
}

impl Config {
    /// Load from `config.toml`, falling back to defaults when the file is
    /// absent.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Path::new("config.toml");
        if !path.exists() {
            tracing::info!("config.toml not found, using defaults");
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
