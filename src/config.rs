use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::warn;

use crate::engine::strategy::{ReallocationStrategy, TopUpThinnest, WidestBinSkim};
use crate::engine::types::{DlmmError, LiquidityBin, PoolParams};

/// Layered configuration: `dlmm.toml` if present, then `DLMM_`-prefixed
/// environment overrides (nested keys use `__`, e.g.
/// `DLMM_FEED__INTERVAL_MS=100`). `.env` is loaded first.
pub fn load() -> Result<DlmmConfig, ConfigError> {
    dotenvy::dotenv().ok();
    Config::builder()
        .add_source(File::with_name("dlmm").required(false))
        .add_source(Environment::with_prefix("DLMM").separator("__").try_parsing(true))
        .build()?
        .try_deserialize()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DlmmConfig {
    pub pool: PoolConfig,
    pub bins: BinLadderConfig,
    pub feed: FeedConfig,
    pub reallocation: ReallocationConfig,
    pub persistence: PersistenceConfig,
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub base_factor: f64,
    pub bin_step: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { base_factor: 0.0005, bin_step: 0.05 }
    }
}

impl PoolConfig {
    pub fn params(&self) -> PoolParams {
        PoolParams { base_factor: self.base_factor, bin_step: self.bin_step }
    }
}

/// Contiguous ladder of equally wide bins, ids starting at 1.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BinLadderConfig {
    pub start: f64,
    pub width: f64,
    pub count: u32,
    pub initial_liquidity: f64,
}

impl Default for BinLadderConfig {
    fn default() -> Self {
        Self { start: 0.0, width: 1.0, count: 3, initial_liquidity: 500_000.0 }
    }
}

impl BinLadderConfig {
    pub fn build(&self) -> Result<Vec<LiquidityBin>, DlmmError> {
        (0..self.count)
            .map(|i| {
                LiquidityBin::new(
                    i + 1,
                    self.start + f64::from(i) * self.width,
                    self.start + f64::from(i + 1) * self.width,
                    self.initial_liquidity,
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub interval_ms: u64,
    pub vol_min: f64,
    pub vol_max: f64,
    pub price_start: f64,
    pub price_step: f64,
    pub price_min: f64,
    pub price_max: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        // price walk defaults stay inside the default 3-bin ladder
        Self {
            interval_ms: 250,
            vol_min: 0.01,
            vol_max: 0.2,
            price_start: 1.5,
            price_step: 0.05,
            price_min: 0.05,
            price_max: 2.95,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReallocationConfig {
    pub strategy: String,
    pub vol_threshold: f64,
    pub skim_threshold: f64,
    pub skim_fraction: f64,
}

impl Default for ReallocationConfig {
    fn default() -> Self {
        Self {
            strategy: "widest-bin-skim".to_string(),
            vol_threshold: 0.15,
            skim_threshold: 100_000.0,
            skim_fraction: 0.1,
        }
    }
}

impl ReallocationConfig {
    pub fn strategy(&self) -> Box<dyn ReallocationStrategy> {
        match self.strategy.as_str() {
            "top-up-thinnest" => Box::new(TopUpThinnest::default()),
            "widest-bin-skim" => Box::new(WidestBinSkim {
                skim_threshold: self.skim_threshold,
                skim_fraction: self.skim_fraction,
            }),
            other => {
                warn!(strategy = other, "unknown strategy, using widest-bin-skim");
                Box::new(WidestBinSkim {
                    skim_threshold: self.skim_threshold,
                    skim_fraction: self.skim_fraction,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub data_dir: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data/dlmm") }
    }
}

/// Demo traffic pushed through the pool by the feed-driven service.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub amount: f64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { amount: 1_000.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_ladder() {
        let cfg = DlmmConfig::default();
        assert_eq!(cfg.pool.base_factor, 0.0005);
        assert_eq!(cfg.pool.bin_step, 0.05);

        let bins = cfg.bins.build().unwrap();
        assert_eq!(bins.len(), 3);
        assert_eq!(bins[0].lower, 0.0);
        assert_eq!(bins[2].upper, 3.0);
        assert!(bins.iter().all(|b| b.liquidity == 500_000.0));
    }

    #[test]
    fn ladder_is_contiguous_with_ascending_ids() {
        let ladder =
            BinLadderConfig { start: 10.0, width: 0.5, count: 8, initial_liquidity: 1.0 };
        let bins = ladder.build().unwrap();
        assert_eq!(bins.first().unwrap().id, 1);
        assert_eq!(bins.last().unwrap().id, 8);
        for pair in bins.windows(2) {
            assert_eq!(pair[0].upper, pair[1].lower);
        }
    }

    #[test]
    fn strategy_names_map_to_strategies() {
        let cfg = ReallocationConfig::default();
        assert_eq!(cfg.strategy().name(), "widest-bin-skim");

        let cfg = ReallocationConfig { strategy: "top-up-thinnest".into(), ..Default::default() };
        assert_eq!(cfg.strategy().name(), "top-up-thinnest");
    }

    #[test]
    fn unknown_strategy_name_falls_back_to_skim() {
        let cfg = ReallocationConfig { strategy: "does-not-exist".into(), ..Default::default() };
        assert_eq!(cfg.strategy().name(), "widest-bin-skim");
    }
}
