use serde::{Deserialize, Serialize};

/// Stablecoins this service tracks. Matching order matters: a symbol like
/// "USDC-USDT LP" resolves to the first identifier that appears in
/// `Stablecoin::ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stablecoin {
    #[serde(rename = "USDC")]
    Usdc,
    #[serde(rename = "USDT")]
    Usdt,
    #[serde(rename = "DAI")]
    Dai,
    #[serde(rename = "BUSD")]
    Busd,
    #[serde(rename = "TUSD")]
    Tusd,
    #[serde(rename = "USDD")]
    Usdd,
    #[serde(rename = "FRAX")]
    Frax,
    #[serde(rename = "LUSD")]
    Lusd,
    Unknown,
}

impl Stablecoin {
    pub const ALL: [Stablecoin; 8] = [
        Stablecoin::Usdc,
        Stablecoin::Usdt,
        Stablecoin::Dai,
        Stablecoin::Busd,
        Stablecoin::Tusd,
        Stablecoin::Usdd,
        Stablecoin::Frax,
        Stablecoin::Lusd,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Stablecoin::Usdc => "USDC",
            Stablecoin::Usdt => "USDT",
            Stablecoin::Dai => "DAI",
            Stablecoin::Busd => "BUSD",
            Stablecoin::Tusd => "TUSD",
            Stablecoin::Usdd => "USDD",
            Stablecoin::Frax => "FRAX",
            Stablecoin::Lusd => "LUSD",
            Stablecoin::Unknown => "Unknown",
        }
    }

    /// First tracked stablecoin whose identifier appears in the (uppercased)
    /// pool symbol, if any.
    pub fn first_match(symbol_upper: &str) -> Option<Stablecoin> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| symbol_upper.contains(s.symbol()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Low")]
    Low,
    #[serde(rename = "Low-Medium")]
    LowMedium,
    #[serde(rename = "Medium")]
    Medium,
    #[serde(rename = "Medium-High")]
    MediumHigh,
    #[serde(rename = "High")]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidityHealth {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// Canonical stablecoin yield pool, built fresh on every pipeline run and
/// never mutated afterwards. Invariants: `apy >= 0`, `tvl_usd >= 0`, and the
/// symbol contained at least one tracked stablecoin identifier at
/// normalization time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldPool {
    pub pool_id: String,
    pub platform: String,
    pub symbol: String,
    pub chain: String,
    pub primary_stablecoin: Stablecoin,
    pub apy: f64,
    pub tvl_usd: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    pub liquidity_health: LiquidityHealth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
    pub last_updated: i64,
}
