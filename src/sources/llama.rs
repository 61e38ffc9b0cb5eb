use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ChartPoint, FetchError, HttpFetcher, RawPoolRecord, YieldFeed};

/// DefiLlama yields API (`/pools`, `/chart/{pool}`).
pub struct LlamaYields {
    fetcher: Arc<HttpFetcher>,
    base_url: String,
}

impl LlamaYields {
    pub fn new(fetcher: Arc<HttpFetcher>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    /// Pull the `data` array out of a DefiLlama envelope. A missing key is
    /// the one malformed-payload case that surfaces as an error; individual
    /// bad elements are dropped instead.
    fn data_array(
        upstream: &'static str,
        value: serde_json::Value,
    ) -> Result<Vec<serde_json::Value>, FetchError> {
        match value.get("data").and_then(|d| d.as_array()) {
            Some(items) => Ok(items.clone()),
            None => Err(FetchError::Malformed {
                upstream,
                detail: "missing top-level 'data' array".to_string(),
            }),
        }
    }
}

#[async_trait]
impl YieldFeed for LlamaYields {
    fn name(&self) -> &'static str {
        "defillama-yields"
    }

    async fn fetch_pools(&self) -> Result<Vec<RawPoolRecord>, FetchError> {
        let url = format!("{}/pools", self.base_url);
        let value = self.fetcher.get_json(self.name(), &url).await?;
        let items = Self::data_array(self.name(), value)?;

        let total = items.len();
        let records: Vec<RawPoolRecord> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();

        if records.len() < total {
            tracing::debug!(
                "{}: dropped {} unparseable pool records",
                self.name(),
                total - records.len()
            );
        }
        Ok(records)
    }

    async fn fetch_chart(&self, pool_id: &str) -> Result<Vec<ChartPoint>, FetchError> {
        let url = format!("{}/chart/{}", self.base_url, pool_id);
        let value = self.fetcher.get_json(self.name(), &url).await?;
        let items = Self::data_array(self.name(), value)?;

        Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect())
    }
}

/// One protocol row from the DefiLlama TVL listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolTvl {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tvl: f64,
    #[serde(default)]
    pub chain: String,
}

/// DefiLlama protocol TVL API (`/protocols`).
pub struct TvlSource {
    fetcher: Arc<HttpFetcher>,
    base_url: String,
}

impl TvlSource {
    pub fn new(fetcher: Arc<HttpFetcher>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    pub async fn fetch_protocols(&self) -> Result<Vec<ProtocolTvl>, FetchError> {
        let url = format!("{}/protocols", self.base_url);
        let value = self.fetcher.get_json("defillama-tvl", &url).await?;

        let items = value.as_array().ok_or_else(|| FetchError::Malformed {
            upstream: "defillama-tvl",
            detail: "expected a top-level array".to_string(),
        })?;

        Ok(items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect())
    }
}
