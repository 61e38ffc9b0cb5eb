use std::collections::HashMap;

pub const LIMIT_MIN: usize = 1;
pub const LIMIT_MAX: usize = 100;

/// Caller-supplied filter parameters. Immutable once built; also serves as
/// the cache key for the yields pipeline, so every field that affects the
/// output must be part of `cache_key`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub platform: Option<String>,
    pub chain: Option<String>,
    pub stablecoin: Option<String>,
    pub limit: usize,
    pub min_apy: f64,
    pub min_tvl: f64,
}

impl QuerySpec {
    #[allow(dead_code)]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            platform: None,
            chain: None,
            stablecoin: None,
            limit: limit.clamp(LIMIT_MIN, LIMIT_MAX),
            min_apy: 0.0,
            min_tvl: 0.0,
        }
    }

    /// Build a spec from raw query-string parameters. Parsing is lenient:
    /// non-numeric or out-of-range values fall back to defaults instead of
    /// erroring, and `limit` is clamped into [1, 100].
    pub fn from_params(params: &HashMap<String, String>, default_limit: usize) -> Self {
        let text = |key: &str| {
            params
                .get(key)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        };

        let limit = params
            .get("limit")
            .and_then(|s| s.trim().parse::<i64>().ok())
            // Negative or zero limits are treated as "not provided".
            .filter(|n| *n > 0)
            .map(|n| (n as usize).min(LIMIT_MAX))
            .unwrap_or(default_limit);

        let non_negative = |key: &str| {
            params
                .get(key)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(0.0)
        };

        Self {
            platform: text("platform"),
            chain: text("chain"),
            stablecoin: text("stablecoin"),
            limit: limit.clamp(LIMIT_MIN, LIMIT_MAX),
            min_apy: non_negative("min_apy"),
            min_tvl: non_negative("min_tvl"),
        }
    }

    /// Cache key covering every parameter that affects pipeline output.
    pub fn cache_key(&self, prefix: &str) -> String {
        format!(
            "{}:p={}|c={}|s={}|l={}|a={}|t={}",
            prefix,
            self.platform.as_deref().unwrap_or("").to_lowercase(),
            self.chain.as_deref().unwrap_or("").to_lowercase(),
            self.stablecoin.as_deref().unwrap_or("").to_uppercase(),
            self.limit,
            self.min_apy,
            self.min_tvl,
        )
    }
}
