use lazy_static::lazy_static;
use std::collections::HashSet;

use crate::models::{LiquidityHealth, RiskLevel, Trend, YieldPool};

/// TVL below this is an absolute High-risk override.
const TVL_FLOOR_USD: f64 = 1_000_000.0;
const TVL_MODERATE_USD: f64 = 10_000_000.0;
/// Pools above this TVL get the "Healthy" liquidity flag.
const TVL_HEALTHY_USD: f64 = 300_000_000.0;

lazy_static! {
    /// Battle-tested platforms that earn a one-step risk downgrade.
    static ref REPUTABLE_PLATFORMS: HashSet<&'static str> =
        ["aave", "compound", "curve", "yearn", "maker"]
            .into_iter()
            .collect();
}

/// Derive the risk level, risk factors and liquidity flag for a pool.
/// Returns an augmented copy; the input is never mutated.
///
/// Rule order: APY tiers set the base, a sub-$1M TVL overrides to High
/// unconditionally, and the reputable-platform downgrade applies last but
/// never to a High base.
pub fn annotate(pool: &YieldPool) -> YieldPool {
    let mut level = RiskLevel::Medium;
    let mut factors = Vec::new();

    if pool.apy > 15.0 {
        level = RiskLevel::High;
        factors.push("Unusually high APY".to_string());
    } else if pool.apy > 10.0 {
        level = RiskLevel::MediumHigh;
        factors.push("Higher than average APY".to_string());
    }

    if pool.tvl_usd < TVL_FLOOR_USD {
        level = RiskLevel::High;
        factors.push("Very low TVL".to_string());
    } else if pool.tvl_usd < TVL_MODERATE_USD {
        factors.push("Moderate TVL".to_string());
    }

    if REPUTABLE_PLATFORMS.contains(pool.platform.to_lowercase().as_str()) {
        level = match level {
            RiskLevel::Medium => RiskLevel::LowMedium,
            RiskLevel::MediumHigh => RiskLevel::Medium,
            other => other,
        };
    }

    let mut annotated = pool.clone();
    annotated.risk_level = level;
    annotated.risk_factors = factors;
    annotated.liquidity_health = if pool.tvl_usd > TVL_HEALTHY_USD {
        LiquidityHealth::Healthy
    } else {
        LiquidityHealth::Degraded
    };
    annotated
}

/// APY direction versus the last recorded value. Equal APYs get their own
/// tier rather than collapsing into Decreasing.
pub fn trend_vs(current_apy: f64, past_apy: f64) -> Trend {
    if current_apy > past_apy {
        Trend::Increasing
    } else if current_apy < past_apy {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Baseline profiles served when the upstream is entirely unavailable.
pub const STATIC_RISK_PROFILES: [(&str, RiskLevel, f64); 5] = [
    ("aave", RiskLevel::Low, 3.5),
    ("compound", RiskLevel::Low, 3.2),
    ("curve", RiskLevel::LowMedium, 4.8),
    ("yearn", RiskLevel::Medium, 6.5),
    ("maker", RiskLevel::Low, 2.9),
];
