use itertools::Itertools;
use tracing::debug;

use crate::engine::pool::DlmmPool;

/// One planned liquidity movement between bins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shift {
    pub from: u32,
    pub to: u32,
    pub amount: f64,
}

/// Custom reallocation hook. Strategies only read the pool and return a
/// plan; the pool applies it under exclusive access and validates every
/// shift against the liquidity invariants.
pub trait ReallocationStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn plan(&self, pool: &DlmmPool, volatility: f64) -> Vec<Shift>;
}

/// Skims a fraction of every sufficiently deep bin into the widest bin.
/// Wide bins absorb the most price movement, so they get topped up first
/// when the market turns volatile.
#[derive(Debug, Clone, Copy)]
pub struct WidestBinSkim {
    pub skim_threshold: f64,
    pub skim_fraction: f64,
}

impl Default for WidestBinSkim {
    fn default() -> Self {
        Self { skim_threshold: 100_000.0, skim_fraction: 0.1 }
    }
}

impl ReallocationStrategy for WidestBinSkim {
    fn name(&self) -> &str {
        "widest-bin-skim"
    }

    fn plan(&self, pool: &DlmmPool, volatility: f64) -> Vec<Shift> {
        // lowest id wins ties, so the plan is stable across runs
        let mut widest: Option<(u32, f64)> = None;
        for bin in pool.bins() {
            match widest {
                Some((_, w)) if bin.width() <= w => {}
                _ => widest = Some((bin.id, bin.width())),
            }
        }
        let Some((target, _)) = widest else { return Vec::new() };

        let mut plan = Vec::new();
        for bin in pool.bins() {
            if bin.id != target && bin.liquidity > self.skim_threshold {
                let amount = bin.liquidity * self.skim_fraction;
                debug!(from = bin.id, to = target, amount, volatility, "planned skim");
                plan.push(Shift { from: bin.id, to: target, amount });
            }
        }
        plan
    }
}

/// Evens out depth by moving a fraction of the gap between the deepest and
/// shallowest bins. A single shift per round keeps rebalancing gentle.
#[derive(Debug, Clone, Copy)]
pub struct TopUpThinnest {
    pub fraction: f64,
}

impl Default for TopUpThinnest {
    fn default() -> Self {
        Self { fraction: 0.25 }
    }
}

impl ReallocationStrategy for TopUpThinnest {
    fn name(&self) -> &str {
        "top-up-thinnest"
    }

    fn plan(&self, pool: &DlmmPool, _volatility: f64) -> Vec<Shift> {
        let Some((thin, deep)) = pool
            .bins()
            .minmax_by(|a, b| a.liquidity.total_cmp(&b.liquidity))
            .into_option()
        else {
            return Vec::new();
        };
        let gap = deep.liquidity - thin.liquidity;
        let amount = gap * self.fraction;
        if deep.id == thin.id || amount <= 0.0 {
            return Vec::new();
        }
        vec![Shift { from: deep.id, to: thin.id, amount }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fees::VolatilityFee;
    use crate::engine::types::{LiquidityBin, PoolParams};

    fn pool_with(bins: Vec<LiquidityBin>) -> DlmmPool {
        DlmmPool::new(
            bins,
            PoolParams { base_factor: 0.0005, bin_step: 0.05 },
            Box::new(VolatilityFee),
        )
        .unwrap()
    }

    #[test]
    fn widest_bin_skim_moves_ten_percent_of_deep_bins() {
        // bin 3 is the widest and must receive from both deep bins
        let pool = pool_with(vec![
            LiquidityBin::new(1, 0.0, 1.0, 500_000.0).unwrap(),
            LiquidityBin::new(2, 1.0, 2.0, 500_000.0).unwrap(),
            LiquidityBin::new(3, 2.0, 4.0, 500_000.0).unwrap(),
        ]);
        let plan = WidestBinSkim::default().plan(&pool, 0.15);
        assert_eq!(
            plan,
            vec![
                Shift { from: 1, to: 3, amount: 50_000.0 },
                Shift { from: 2, to: 3, amount: 50_000.0 },
            ]
        );
    }

    #[test]
    fn widest_bin_skim_skips_shallow_bins() {
        let pool = pool_with(vec![
            LiquidityBin::new(1, 0.0, 1.0, 99_000.0).unwrap(),
            LiquidityBin::new(2, 1.0, 3.0, 10_000.0).unwrap(),
        ]);
        assert!(WidestBinSkim::default().plan(&pool, 0.15).is_empty());
    }

    #[test]
    fn widest_bin_skim_applied_conserves_liquidity() {
        let mut pool = pool_with(vec![
            LiquidityBin::new(1, 0.0, 1.0, 500_000.0).unwrap(),
            LiquidityBin::new(2, 1.0, 2.0, 50_000.0).unwrap(),
            LiquidityBin::new(3, 2.0, 4.0, 500_000.0).unwrap(),
        ]);
        let before = pool.total_liquidity();
        pool.reallocate(&WidestBinSkim::default(), 0.15).unwrap();
        assert_eq!(pool.total_liquidity(), before);
        assert_eq!(pool.bin(1).unwrap().liquidity, 450_000.0);
        assert_eq!(pool.bin(2).unwrap().liquidity, 50_000.0); // below threshold, untouched
        assert_eq!(pool.bin(3).unwrap().liquidity, 550_000.0);
    }

    #[test]
    fn top_up_thinnest_closes_a_quarter_of_the_gap() {
        let pool = pool_with(vec![
            LiquidityBin::new(1, 0.0, 1.0, 100_000.0).unwrap(),
            LiquidityBin::new(2, 1.0, 2.0, 500_000.0).unwrap(),
        ]);
        let plan = TopUpThinnest::default().plan(&pool, 0.05);
        assert_eq!(plan, vec![Shift { from: 2, to: 1, amount: 100_000.0 }]);
    }

    #[test]
    fn top_up_thinnest_is_quiet_when_balanced() {
        let pool = pool_with(vec![
            LiquidityBin::new(1, 0.0, 1.0, 500_000.0).unwrap(),
            LiquidityBin::new(2, 1.0, 2.0, 500_000.0).unwrap(),
        ]);
        assert!(TopUpThinnest::default().plan(&pool, 0.05).is_empty());
    }
}
