//! In-memory Dynamic Liquidity Market Maker engine: discrete price bins,
//! LP share accounting, volatility-priced swap fees, pluggable reallocation
//! strategies, mock feeds and snapshot/WAL persistence.

pub mod config;
pub mod engine;
pub mod feeds;
pub mod persist;
pub mod telemetry;
