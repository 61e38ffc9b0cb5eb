use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::{FetchError, HttpFetcher};
use crate::models::Stablecoin;

/// CoinGecko ids for the tracked stablecoins, in `Stablecoin::ALL` order.
const COIN_IDS: [(&str, Stablecoin); 8] = [
    ("usd-coin", Stablecoin::Usdc),
    ("tether", Stablecoin::Usdt),
    ("dai", Stablecoin::Dai),
    ("binance-usd", Stablecoin::Busd),
    ("true-usd", Stablecoin::Tusd),
    ("usdd", Stablecoin::Usdd),
    ("frax", Stablecoin::Frax),
    ("liquity-usd", Stablecoin::Lusd),
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StablecoinPrice {
    pub price: f64,
    pub change_24h: f64,
    pub market_cap: f64,
    /// Absolute distance from the 1 USD peg.
    pub peg_deviation: f64,
}

/// CoinGecko `simple/price` adapter for stablecoin peg monitoring.
pub struct PriceSource {
    fetcher: Arc<HttpFetcher>,
    base_url: String,
}

impl PriceSource {
    pub fn new(fetcher: Arc<HttpFetcher>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    pub async fn fetch_prices(&self) -> Result<BTreeMap<String, StablecoinPrice>, FetchError> {
        let ids: Vec<&str> = COIN_IDS.iter().map(|(id, _)| *id).collect();
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_change=true&include_market_cap=true",
            self.base_url,
            ids.join(",")
        );

        let value = self.fetcher.get_json("coingecko-prices", &url).await?;
        let map = value.as_object().ok_or_else(|| FetchError::Malformed {
            upstream: "coingecko-prices",
            detail: "expected a top-level object".to_string(),
        })?;

        let mut prices = BTreeMap::new();
        for (id, coin) in COIN_IDS {
            let Some(entry) = map.get(id) else { continue };
            let price = entry.get("usd").and_then(|v| v.as_f64()).unwrap_or(0.0);
            prices.insert(
                coin.symbol().to_string(),
                StablecoinPrice {
                    price,
                    change_24h: entry
                        .get("usd_24h_change")
                        .and_then(|v| v.as_f64())
                        .unwrap_or(0.0),
                    market_cap: entry
                        .get("usd_market_cap")
                        .and_then(|v| v.as_f64())
                        .unwrap_or(0.0),
                    peg_deviation: (price - 1.0).abs(),
                },
            );
        }
        Ok(prices)
    }
}
