use crate::models::{LiquidityHealth, RiskLevel, Stablecoin, YieldPool};
use crate::sources::RawPoolRecord;

/// Map raw provider records into canonical `YieldPool`s. Pure and total:
/// malformed fields are defaulted, non-stablecoin pools are dropped, nothing
/// errors. Risk fields start at their base values and are finalized by the
/// annotator.
pub fn normalize(records: &[RawPoolRecord], run_ts: i64) -> Vec<YieldPool> {
    records
        .iter()
        .filter_map(|record| normalize_one(record, run_ts))
        .collect()
}

fn normalize_one(record: &RawPoolRecord, run_ts: i64) -> Option<YieldPool> {
    let symbol = record
        .symbol
        .as_deref()
        .unwrap_or_default()
        .to_uppercase();

    // A pool only exists in this system if its symbol names a tracked
    // stablecoin; "USDC-ETH LP" qualifies, "ETH-WBTC" never does.
    let primary = Stablecoin::first_match(&symbol)?;

    Some(YieldPool {
        pool_id: record.pool.clone().unwrap_or_default(),
        platform: record
            .project
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "Unknown".to_string()),
        symbol,
        chain: record
            .chain
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "Unknown".to_string()),
        primary_stablecoin: primary,
        apy: record.apy.unwrap_or(0.0).max(0.0),
        tvl_usd: record.tvl_usd.unwrap_or(0.0).max(0.0),
        risk_level: RiskLevel::Medium,
        risk_factors: Vec::new(),
        liquidity_health: LiquidityHealth::Degraded,
        trend: None,
        last_updated: run_ts,
    })
}
