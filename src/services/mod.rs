pub mod aggregator;
pub mod cache;
pub mod filter;
pub mod history;
pub mod normalizer;
pub mod risk;

pub use aggregator::{RiskPreference, YieldAggregator};
