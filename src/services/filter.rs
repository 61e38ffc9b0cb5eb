use std::cmp::Ordering;

use crate::models::{QuerySpec, YieldPool};

/// Apply the caller's predicates, rank by APY descending and truncate to the
/// query limit. Ties keep provider order (`sort_by` is stable; the provider
/// gives no secondary key to break ties with). Never errors: an empty or
/// fully filtered input yields an empty vec.
pub fn filter_and_rank(pools: Vec<YieldPool>, q: &QuerySpec) -> Vec<YieldPool> {
    let mut matched: Vec<YieldPool> = pools
        .into_iter()
        .filter(|p| matches(p, q))
        .collect();

    matched.sort_by(|a, b| b.apy.partial_cmp(&a.apy).unwrap_or(Ordering::Equal));
    matched.truncate(q.limit);
    matched
}

fn matches(pool: &YieldPool, q: &QuerySpec) -> bool {
    if let Some(platform) = &q.platform {
        if !pool.platform.to_lowercase().contains(&platform.to_lowercase()) {
            return false;
        }
    }
    if let Some(chain) = &q.chain {
        if !pool.chain.to_lowercase().contains(&chain.to_lowercase()) {
            return false;
        }
    }
    if let Some(stablecoin) = &q.stablecoin {
        if !pool.symbol.contains(&stablecoin.to_uppercase()) {
            return false;
        }
    }
    pool.apy >= q.min_apy && pool.tvl_usd >= q.min_tvl
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LiquidityHealth, RiskLevel, Stablecoin};

    fn pool(platform: &str, symbol: &str, chain: &str, apy: f64, tvl: f64) -> YieldPool {
        YieldPool {
            pool_id: format!("{platform}-{symbol}"),
            platform: platform.to_string(),
            symbol: symbol.to_string(),
            chain: chain.to_string(),
            primary_stablecoin: Stablecoin::Usdc,
            apy,
            tvl_usd: tvl,
            risk_level: RiskLevel::Medium,
            risk_factors: Vec::new(),
            liquidity_health: LiquidityHealth::Degraded,
            trend: None,
            last_updated: 0,
        }
    }

    #[test]
    fn ranks_descending_by_apy() {
        let pools = vec![
            pool("Aave", "USDC", "Ethereum", 4.2, 5e8),
            pool("Compound", "DAI", "Ethereum", 12.0, 2e6),
            pool("Curve", "USDT", "Polygon", 8.0, 1e7),
        ];
        let out = filter_and_rank(pools, &QuerySpec::with_limit(10));
        let apys: Vec<f64> = out.iter().map(|p| p.apy).collect();
        assert_eq!(apys, vec![12.0, 8.0, 4.2]);
        for pair in out.windows(2) {
            assert!(pair[0].apy >= pair[1].apy);
        }
    }

    #[test]
    fn ties_keep_fetch_order() {
        let pools = vec![
            pool("First", "USDC", "Ethereum", 5.0, 1e7),
            pool("Second", "USDT", "Ethereum", 5.0, 1e7),
            pool("Third", "DAI", "Ethereum", 5.0, 1e7),
        ];
        let out = filter_and_rank(pools, &QuerySpec::with_limit(10));
        let names: Vec<&str> = out.iter().map(|p| p.platform.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn platform_filter_is_case_insensitive_substring() {
        let pools = vec![
            pool("Aave-v3", "USDC", "Ethereum", 4.0, 1e7),
            pool("Compound", "USDC", "Ethereum", 5.0, 1e7),
        ];
        let mut q = QuerySpec::with_limit(10);
        q.platform = Some("AAVE".to_string());
        let out = filter_and_rank(pools, &q);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].platform, "Aave-v3");
    }

    #[test]
    fn min_apy_and_min_tvl_bound_results() {
        let pools = vec![
            pool("A", "USDC", "Ethereum", 2.0, 5e5),
            pool("B", "USDC", "Ethereum", 6.0, 5e7),
            pool("C", "USDC", "Ethereum", 9.0, 2e5),
        ];
        let mut q = QuerySpec::with_limit(10);
        q.min_apy = 3.0;
        q.min_tvl = 1e6;
        let out = filter_and_rank(pools, &q);
        assert_eq!(out.len(), 1);
        for p in &out {
            assert!(p.apy >= q.min_apy);
            assert!(p.tvl_usd >= q.min_tvl);
        }
    }

    #[test]
    fn stablecoin_filter_matches_symbol() {
        let pools = vec![
            pool("A", "USDC-ETH LP", "Ethereum", 2.0, 1e7),
            pool("B", "DAI", "Ethereum", 6.0, 1e7),
        ];
        let mut q = QuerySpec::with_limit(10);
        q.stablecoin = Some("usdc".to_string());
        let out = filter_and_rank(pools, &q);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol, "USDC-ETH LP");
    }

    #[test]
    fn limit_truncates() {
        let pools = (0..50)
            .map(|i| pool("P", "USDC", "Ethereum", i as f64, 1e7))
            .collect();
        let out = filter_and_rank(pools, &QuerySpec::with_limit(5));
        assert_eq!(out.len(), 5);
        assert_eq!(out[0].apy, 49.0);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let out = filter_and_rank(Vec::new(), &QuerySpec::with_limit(10));
        assert!(out.is_empty());
    }
}
