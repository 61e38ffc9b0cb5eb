pub mod llama;
pub mod prices;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::UpstreamConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{upstream}: request failed: {cause}")]
    Request {
        upstream: &'static str,
        #[source]
        cause: reqwest::Error,
    },
    #[error("{upstream}: returned status {status}")]
    Status { upstream: &'static str, status: u16 },
    #[error("{upstream}: malformed response: {detail}")]
    Malformed {
        upstream: &'static str,
        detail: String,
    },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Request { cause, .. } if cause.is_timeout())
    }
}

/// Raw yield-pool payload as the provider ships it. Lives only within a
/// single fetch cycle; anything missing is defaulted away during
/// normalization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPoolRecord {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub apy: Option<f64>,
    #[serde(rename = "tvlUsd", default)]
    pub tvl_usd: Option<f64>,
    #[serde(default)]
    pub pool: Option<String>,
    // Provider's own stablecoin flag; normalization keys on the symbol
    // instead, so this is advisory only.
    #[allow(dead_code)]
    #[serde(default)]
    pub stablecoin: Option<bool>,
}

/// One point of a pool's historical chart.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartPoint {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub apy: Option<f64>,
    #[serde(rename = "tvlUsd", default)]
    pub tvl_usd: Option<f64>,
}

#[async_trait]
pub trait YieldFeed: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_pools(&self) -> Result<Vec<RawPoolRecord>, FetchError>;
    async fn fetch_chart(&self, pool_id: &str) -> Result<Vec<ChartPoint>, FetchError>;
}

/// Shared HTTP client with a fixed timeout and bounded retries. Retries use
/// a short exponential backoff so a failing upstream is not hammered.
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    backoff_ms: u64,
}

impl HttpFetcher {
    /// Fails at startup if the client cannot be built; a fetcher without its
    /// timeout must never exist.
    pub fn new(cfg: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_retries: cfg.max_retries,
            backoff_ms: cfg.retry_backoff_ms,
        })
    }

    pub async fn get_json(
        &self,
        upstream: &'static str,
        url: &str,
    ) -> Result<serde_json::Value, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            match self.try_get(upstream, url).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.max_retries {
                        tracing::error!("{}: giving up after {} attempts: {}", upstream, attempt + 1, err);
                        return Err(err);
                    }
                    let ms = self.backoff_ms << attempt;
                    tracing::warn!(
                        "{}: attempt {} failed ({}), retrying in {}ms",
                        upstream,
                        attempt + 1,
                        err,
                        ms
                    );
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn try_get(
        &self,
        upstream: &'static str,
        url: &str,
    ) -> Result<serde_json::Value, FetchError> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|cause| FetchError::Request { upstream, cause })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                upstream,
                status: status.as_u16(),
            });
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|cause| FetchError::Request { upstream, cause })
    }
}
