use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use super::cache::ResultCache;
use super::history::HistoryStore;
use super::{filter, normalizer, risk};
use crate::config::CacheConfig;
use crate::models::{QuerySpec, RiskLevel, YieldPool};
use crate::sources::llama::TvlSource;
use crate::sources::prices::PriceSource;
use crate::sources::{FetchError, YieldFeed};

pub const HISTORY_DAYS_DEFAULT: u32 = 30;
pub const HISTORY_DAYS_MAX: u32 = 90;
const PORTFOLIO_SLOTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskPreference {
    Low,
    Medium,
    High,
}

impl RiskPreference {
    /// Lenient parse; anything unrecognized falls back to Medium.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => RiskPreference::Low,
            "high" => RiskPreference::High,
            _ => RiskPreference::Medium,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RiskPreference::Low => "low",
            RiskPreference::Medium => "medium",
            RiskPreference::High => "high",
        }
    }

    fn accepts(&self, level: RiskLevel) -> bool {
        match self {
            RiskPreference::Low => level <= RiskLevel::LowMedium,
            RiskPreference::Medium => level <= RiskLevel::MediumHigh,
            RiskPreference::High => true,
        }
    }
}

/// Orchestrates the pipeline: fetch, normalize, filter/rank, annotate, cache.
/// Owns one result cache per endpoint family so TTLs and keys never mix.
pub struct YieldAggregator {
    feed: Arc<dyn YieldFeed>,
    prices: PriceSource,
    tvl: TvlSource,
    history: HistoryStore,
    yields_cache: ResultCache<Vec<YieldPool>>,
    derived_cache: ResultCache<Value>,
    prices_cache: ResultCache<Value>,
    tvl_cache: ResultCache<Value>,
    risk_cache: ResultCache<Value>,
}

impl YieldAggregator {
    pub fn new(
        feed: Arc<dyn YieldFeed>,
        prices: PriceSource,
        tvl: TvlSource,
        cfg: &CacheConfig,
    ) -> Self {
        Self {
            feed,
            prices,
            tvl,
            history: HistoryStore::new(),
            yields_cache: ResultCache::new(cfg.yields_ttl_secs, cfg.max_entries),
            derived_cache: ResultCache::new(cfg.yields_ttl_secs, cfg.max_entries),
            prices_cache: ResultCache::new(cfg.prices_ttl_secs, cfg.max_entries),
            tvl_cache: ResultCache::new(cfg.tvl_ttl_secs, cfg.max_entries),
            risk_cache: ResultCache::new(cfg.risk_ttl_secs, cfg.max_entries),
        }
    }

    /// Full yields pipeline for one query. At most one upstream fetch per
    /// TTL window per distinct `QuerySpec`.
    pub async fn yields(&self, q: &QuerySpec) -> Result<Arc<Vec<YieldPool>>, FetchError> {
        let key = q.cache_key("yields");
        self.yields_cache
            .get_or_compute(&key, || self.compute_yields(q))
            .await
    }

    async fn compute_yields(&self, q: &QuerySpec) -> Result<Vec<YieldPool>, FetchError> {
        let run_ts = chrono::Utc::now().timestamp();
        let raw = self.feed.fetch_pools().await?;
        let normalized = normalizer::normalize(&raw, run_ts);
        let ranked = filter::filter_and_rank(normalized, q);

        let annotated: Vec<YieldPool> = ranked
            .iter()
            .map(|pool| {
                let mut pool = risk::annotate(pool);
                if !pool.pool_id.is_empty() {
                    let prev = self.history.put(&pool.pool_id, pool.apy, run_ts);
                    pool.trend = prev.map(|p| risk::trend_vs(pool.apy, p.apy));
                }
                pool
            })
            .collect();

        tracing::debug!(
            "yields pipeline: {} raw -> {} served",
            raw.len(),
            annotated.len()
        );
        Ok(annotated)
    }

    /// Historical APY/TVL series for one pool, newest `days` points.
    pub async fn historical(&self, pool_id: &str, days: u32) -> Result<Arc<Value>, FetchError> {
        let days = days.clamp(1, HISTORY_DAYS_MAX);
        let key = format!("history:{}:{}", pool_id, days);
        self.derived_cache
            .get_or_compute(&key, move || async move {
                let chart = self.feed.fetch_chart(pool_id).await?;
                let skip = chart.len().saturating_sub(days as usize);
                let points: Vec<Value> = chart[skip..]
                    .iter()
                    .map(|p| {
                        json!({
                            "date": p.timestamp
                                .as_deref()
                                .and_then(|t| t.split('T').next())
                                .unwrap_or(""),
                            "apy": p.apy.unwrap_or(0.0),
                            "tvl": p.tvl_usd.unwrap_or(0.0),
                        })
                    })
                    .collect();

                let trend = match (chart[skip..].first(), chart[skip..].last()) {
                    (Some(first), Some(last)) if chart[skip..].len() > 1 => Some(risk::trend_vs(
                        last.apy.unwrap_or(0.0),
                        first.apy.unwrap_or(0.0),
                    )),
                    _ => None,
                };

                Ok(json!({
                    "poolId": pool_id,
                    "dataPoints": points,
                    "trend": trend,
                }))
            })
            .await
    }

    /// Per-chain summary of where one stablecoin can be parked.
    pub async fn cross_chain(&self, symbol: &str) -> Result<Arc<Value>, FetchError> {
        let wanted = symbol.trim().to_uppercase();
        let key = format!("crosschain:{}", wanted);
        self.derived_cache
            .get_or_compute(&key, move || async move {
                let run_ts = chrono::Utc::now().timestamp();
                let raw = self.feed.fetch_pools().await?;
                let pools: Vec<YieldPool> = normalizer::normalize(&raw, run_ts)
                    .into_iter()
                    .filter(|p| p.symbol.contains(&wanted))
                    .map(|p| risk::annotate(&p))
                    .collect();

                let mut by_chain: BTreeMap<String, Vec<&YieldPool>> = BTreeMap::new();
                for pool in &pools {
                    by_chain.entry(pool.chain.clone()).or_default().push(pool);
                }

                let mut summary = serde_json::Map::new();
                for (chain, chain_pools) in by_chain {
                    let best = chain_pools
                        .iter()
                        .max_by(|a, b| {
                            a.apy
                                .partial_cmp(&b.apy)
                                .unwrap_or(std::cmp::Ordering::Equal)
                        })
                        .map(|p| {
                            json!({
                                "platform": p.platform,
                                "symbol": p.symbol,
                                "apy": p.apy,
                            })
                        });
                    let total_tvl: f64 = chain_pools.iter().map(|p| p.tvl_usd).sum();
                    let avg_apy =
                        chain_pools.iter().map(|p| p.apy).sum::<f64>() / chain_pools.len() as f64;

                    summary.insert(
                        chain,
                        json!({
                            "bestYield": best,
                            "avgApy": avg_apy,
                            "totalOptions": chain_pools.len(),
                            "totalTvl": total_tvl,
                        }),
                    );
                }

                Ok(Value::Object(summary))
            })
            .await
    }

    /// Spread `amount_usd` across the top pools admissible under the risk
    /// preference. Equal-weight split over at most five pools.
    pub async fn portfolio(
        &self,
        preference: RiskPreference,
        amount_usd: f64,
    ) -> Result<Arc<Value>, FetchError> {
        let amount_usd = if amount_usd.is_finite() && amount_usd > 0.0 {
            amount_usd
        } else {
            10_000.0
        };
        let key = format!("portfolio:{}:{}", preference.label(), amount_usd);
        self.derived_cache
            .get_or_compute(&key, move || async move {
                let run_ts = chrono::Utc::now().timestamp();
                let raw = self.feed.fetch_pools().await?;
                let mut eligible: Vec<YieldPool> = normalizer::normalize(&raw, run_ts)
                    .into_iter()
                    .map(|p| risk::annotate(&p))
                    .filter(|p| preference.accepts(p.risk_level))
                    .collect();

                eligible.sort_by(|a, b| {
                    b.apy
                        .partial_cmp(&a.apy)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                eligible.truncate(PORTFOLIO_SLOTS);

                if eligible.is_empty() {
                    return Ok(json!({
                        "portfolio": [],
                        "weightedAvgApy": 0.0,
                        "expectedAnnualYield": 0.0,
                        "riskPreference": preference.label(),
                    }));
                }

                let share = amount_usd / eligible.len() as f64;
                let pct = 100.0 / eligible.len() as f64;
                let weighted_avg_apy =
                    eligible.iter().map(|p| p.apy).sum::<f64>() / eligible.len() as f64;

                let allocations: Vec<Value> = eligible
                    .iter()
                    .map(|p| {
                        json!({
                            "platform": p.platform,
                            "symbol": p.symbol,
                            "chain": p.chain,
                            "apy": p.apy,
                            "riskLevel": p.risk_level,
                            "allocationUsd": share,
                            "allocationPct": pct,
                        })
                    })
                    .collect();

                Ok(json!({
                    "portfolio": allocations,
                    "weightedAvgApy": weighted_avg_apy,
                    "expectedAnnualYield": amount_usd * weighted_avg_apy / 100.0,
                    "riskPreference": preference.label(),
                }))
            })
            .await
    }

    /// Per-platform risk profiles derived from live pools; falls back to the
    /// static baseline table when the upstream is entirely unavailable.
    pub async fn risk_analysis(&self, platform: Option<&str>) -> Result<Arc<Value>, FetchError> {
        let wanted = platform.map(|p| p.trim().to_lowercase()).filter(|p| !p.is_empty());
        // One cache entry holds the whole profile map; the per-platform lookup
        // happens on every request so an unknown name is never pinned for the
        // full risk TTL.
        let profiles = self
            .risk_cache
            .get_or_compute("risk", move || async move {
                let profiles = match self.live_risk_profiles().await {
                    Ok(profiles) => profiles,
                    Err(err) => {
                        tracing::warn!("risk analysis falling back to baseline: {}", err);
                        risk::STATIC_RISK_PROFILES
                            .iter()
                            .map(|(name, level, apy)| {
                                (
                                    name.to_string(),
                                    json!({
                                        "riskLevel": level,
                                        "avgApy": apy,
                                        "totalTvlUsd": Value::Null,
                                        "poolCount": 0,
                                        "baseline": true,
                                    }),
                                )
                            })
                            .collect()
                    }
                };

                Ok(Value::Object(profiles.into_iter().collect()))
            })
            .await?;

        match wanted {
            Some(name) => Ok(Arc::new(profiles.get(name.as_str()).cloned().unwrap_or_else(
                || json!({ "error": format!("no pools found for platform '{}'", name) }),
            ))),
            None => Ok(profiles),
        }
    }

    async fn live_risk_profiles(&self) -> Result<BTreeMap<String, Value>, FetchError> {
        let run_ts = chrono::Utc::now().timestamp();
        let raw = self.feed.fetch_pools().await?;
        let pools = normalizer::normalize(&raw, run_ts);

        let mut by_platform: BTreeMap<String, Vec<&YieldPool>> = BTreeMap::new();
        for pool in &pools {
            by_platform
                .entry(pool.platform.to_lowercase())
                .or_default()
                .push(pool);
        }

        let mut profiles = BTreeMap::new();
        for (name, platform_pools) in by_platform {
            let avg_apy =
                platform_pools.iter().map(|p| p.apy).sum::<f64>() / platform_pools.len() as f64;
            let total_tvl: f64 = platform_pools.iter().map(|p| p.tvl_usd).sum();

            // Classify the platform aggregate with the same rules pools get.
            let mut synthetic = platform_pools[0].clone();
            synthetic.apy = avg_apy;
            synthetic.tvl_usd = total_tvl;
            let annotated = risk::annotate(&synthetic);

            profiles.insert(
                name,
                json!({
                    "riskLevel": annotated.risk_level,
                    "riskFactors": annotated.risk_factors,
                    "avgApy": avg_apy,
                    "totalTvlUsd": total_tvl,
                    "poolCount": platform_pools.len(),
                }),
            );
        }
        Ok(profiles)
    }

    /// Stablecoin peg prices (supplemental surface, cached 300s).
    pub async fn stablecoin_prices(&self) -> Result<Arc<Value>, FetchError> {
        self.prices_cache
            .get_or_compute("prices", move || async move {
                let prices = self.prices.fetch_prices().await?;
                Ok(serde_json::to_value(prices).unwrap_or(Value::Null))
            })
            .await
    }

    /// Protocol TVL listing (supplemental surface, cached 1800s).
    pub async fn protocol_tvl(&self) -> Result<Arc<Value>, FetchError> {
        self.tvl_cache
            .get_or_compute("tvl", move || async move {
                let protocols = self.tvl.fetch_protocols().await?;
                Ok(serde_json::to_value(protocols).unwrap_or(Value::Null))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;
    use crate::models::RiskLevel;
    use crate::sources::{ChartPoint, HttpFetcher, RawPoolRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockFeed {
        pools: Vec<RawPoolRecord>,
        chart: Vec<ChartPoint>,
        fail: bool,
        fetches: AtomicUsize,
    }

    impl MockFeed {
        fn with_pools(pools: Vec<RawPoolRecord>) -> Self {
            Self {
                pools,
                chart: Vec::new(),
                fail: false,
                fetches: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                pools: Vec::new(),
                chart: Vec::new(),
                fail: true,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl YieldFeed for MockFeed {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn fetch_pools(&self) -> Result<Vec<RawPoolRecord>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FetchError::Status {
                    upstream: "mock",
                    status: 503,
                });
            }
            Ok(self.pools.clone())
        }

        async fn fetch_chart(&self, _pool_id: &str) -> Result<Vec<ChartPoint>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.chart.clone())
        }
    }

    fn raw(project: &str, symbol: &str, chain: &str, apy: f64, tvl: f64) -> RawPoolRecord {
        RawPoolRecord {
            project: Some(project.to_string()),
            symbol: Some(symbol.to_string()),
            chain: Some(chain.to_string()),
            apy: Some(apy),
            tvl_usd: Some(tvl),
            pool: Some(format!("{}-{}", project, symbol)),
            stablecoin: Some(true),
        }
    }

    fn aggregator(feed: MockFeed) -> (Arc<MockFeed>, YieldAggregator) {
        let feed = Arc::new(feed);
        let fetcher = Arc::new(HttpFetcher::new(&UpstreamConfig::default()).unwrap());
        let agg = YieldAggregator::new(
            feed.clone(),
            PriceSource::new(fetcher.clone(), "http://localhost"),
            TvlSource::new(fetcher, "http://localhost"),
            &crate::config::CacheConfig::default(),
        );
        (feed, agg)
    }

    #[tokio::test]
    async fn end_to_end_ordering_and_risk() {
        let (_, agg) = aggregator(MockFeed::with_pools(vec![
            raw("Aave", "USDC", "Ethereum", 4.2, 5e8),
            raw("Compound", "DAI", "Ethereum", 12.0, 2e6),
        ]));

        let out = agg.yields(&QuerySpec::with_limit(10)).await.unwrap();
        let out: &[YieldPool] = &out;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].platform, "Compound");
        assert_eq!(out[0].risk_level, RiskLevel::Medium);
        assert_eq!(out[1].platform, "Aave");
        assert_eq!(out[1].risk_level, RiskLevel::LowMedium);
    }

    #[tokio::test]
    async fn cache_hit_suppresses_upstream_fetch() {
        let (feed, agg) = aggregator(MockFeed::with_pools(vec![raw(
            "Aave", "USDC", "Ethereum", 4.2, 5e8,
        )]));

        let q = QuerySpec::with_limit(10);
        agg.yields(&q).await.unwrap();
        agg.yields(&q).await.unwrap();
        assert_eq!(feed.fetches.load(Ordering::SeqCst), 1);

        // A different query is a different key and fetches again.
        agg.yields(&QuerySpec::with_limit(5)).await.unwrap();
        assert_eq!(feed.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_stablecoin_pool_never_served() {
        let mut record = raw("Uni", "ETH-WBTC", "Ethereum", 30.0, 1e8);
        record.stablecoin = Some(false);
        let (_, agg) = aggregator(MockFeed::with_pools(vec![
            record,
            raw("Aave", "USDC", "Ethereum", 4.2, 5e8),
        ]));

        let out = agg.yields(&QuerySpec::with_limit(10)).await.unwrap();
        let out: &[YieldPool] = &out;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol, "USDC");
    }

    #[tokio::test]
    async fn trend_appears_after_second_run() {
        let (_, agg) = aggregator(MockFeed::with_pools(vec![raw(
            "Aave", "USDC", "Ethereum", 4.2, 5e8,
        )]));

        let first = agg.yields(&QuerySpec::with_limit(10)).await.unwrap();
        assert!(first.first().unwrap().trend.is_none());

        // Distinct key forces a recompute against the recorded history.
        let second = agg.yields(&QuerySpec::with_limit(5)).await.unwrap();
        assert_eq!(second.first().unwrap().trend, Some(crate::models::Trend::Stable));
    }

    #[tokio::test]
    async fn historical_clamps_days_and_labels_trend() {
        let mut feed = MockFeed::with_pools(Vec::new());
        feed.chart = vec![
            ChartPoint {
                timestamp: Some("2026-08-01T00:00:00.000Z".to_string()),
                apy: Some(3.0),
                tvl_usd: Some(1e8),
            },
            ChartPoint {
                timestamp: Some("2026-08-02T00:00:00.000Z".to_string()),
                apy: Some(5.0),
                tvl_usd: Some(1.1e8),
            },
        ];
        let (_, agg) = aggregator(feed);

        let out = agg.historical("pool-1", 500).await.unwrap();
        let out = out.as_ref();
        assert_eq!(out["poolId"], "pool-1");
        let points = out["dataPoints"].as_array().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0]["date"], "2026-08-01");
        assert_eq!(out["trend"], "Increasing");
    }

    #[tokio::test]
    async fn cross_chain_groups_by_chain() {
        let (_, agg) = aggregator(MockFeed::with_pools(vec![
            raw("Aave", "USDC", "Ethereum", 4.0, 2e8),
            raw("Compound", "USDC", "Ethereum", 6.0, 1e8),
            raw("Venus", "USDC", "BSC", 8.0, 5e7),
            raw("Curve", "DAI", "Ethereum", 9.0, 1e8),
        ]));

        let out = agg.cross_chain("usdc").await.unwrap();
        let out = out.as_ref();
        let eth = &out["Ethereum"];
        assert_eq!(eth["totalOptions"], 2);
        assert_eq!(eth["avgApy"], 5.0);
        assert_eq!(eth["bestYield"]["platform"], "Compound");
        assert_eq!(out["BSC"]["totalOptions"], 1);
        // DAI pool must not leak into a USDC summary.
        assert_eq!(eth["totalTvl"], 3e8);
    }

    #[tokio::test]
    async fn portfolio_respects_risk_preference() {
        let (_, agg) = aggregator(MockFeed::with_pools(vec![
            raw("Aave", "USDC", "Ethereum", 4.2, 5e8),
            raw("DegenFarm", "USDT", "BSC", 40.0, 2e6),
        ]));

        let out = agg.portfolio(RiskPreference::Low, 10_000.0).await.unwrap();
        let out = out.as_ref();
        let allocations = out["portfolio"].as_array().unwrap();
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0]["platform"], "Aave");
        assert_eq!(allocations[0]["allocationUsd"], 10_000.0);
        assert_eq!(out["weightedAvgApy"], 4.2);
        let expected = out["expectedAnnualYield"].as_f64().unwrap();
        assert!((expected - 420.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn risk_analysis_falls_back_to_baseline() {
        let (_, agg) = aggregator(MockFeed::failing());

        let out = agg.risk_analysis(None).await.unwrap();
        let out = out.as_ref();
        assert_eq!(out["aave"]["baseline"], true);
        assert_eq!(out["aave"]["riskLevel"], "Low");
    }

    #[tokio::test]
    async fn risk_analysis_single_platform() {
        let (_, agg) = aggregator(MockFeed::with_pools(vec![
            raw("Aave", "USDC", "Ethereum", 4.0, 2e8),
            raw("Aave", "DAI", "Ethereum", 6.0, 1e8),
            raw("Compound", "USDC", "Ethereum", 3.0, 1e8),
        ]));

        let out = agg.risk_analysis(Some("aave")).await.unwrap();
        let out = out.as_ref();
        assert_eq!(out["poolCount"], 2);
        assert_eq!(out["avgApy"], 5.0);
    }

    #[tokio::test]
    async fn risk_analysis_unknown_platform_not_cached() {
        let (feed, agg) = aggregator(MockFeed::with_pools(vec![
            raw("Aave", "USDC", "Ethereum", 4.0, 2e8),
            raw("Compound", "DAI", "Ethereum", 3.0, 1e8),
        ]));

        let missing = agg.risk_analysis(Some("nonexistent")).await.unwrap();
        assert!(missing.as_ref()["error"]
            .as_str()
            .unwrap()
            .contains("nonexistent"));

        // The negative lookup must not occupy its own cache entry: the next
        // lookups reuse the shared profile map without another fetch.
        let aave = agg.risk_analysis(Some("aave")).await.unwrap();
        assert_eq!(aave.as_ref()["poolCount"], 1);
        let all = agg.risk_analysis(None).await.unwrap();
        assert!(all.as_ref().get("compound").is_some());
        assert_eq!(feed.fetches.load(Ordering::SeqCst), 1);

        // And the miss is never served stale once the platform exists.
        let missing_again = agg.risk_analysis(Some("nonexistent")).await.unwrap();
        assert!(missing_again.as_ref().get("error").is_some());
    }
}
