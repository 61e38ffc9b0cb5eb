pub mod pool;
pub mod query;

pub use pool::{LiquidityHealth, RiskLevel, Stablecoin, Trend, YieldPool};
pub use query::QuerySpec;
