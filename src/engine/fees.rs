use crate::engine::types::PoolParams;

/// Fees never drop below this, regardless of how calm the market is.
pub const FEE_FLOOR: f64 = 1e-4;

/// Pluggable swap fee logic. Implementations get the execution price and the
/// current volatility reading and must return the absolute fee to charge.
pub trait FeeModel: Send + Sync {
    fn fee(&self, price: f64, volatility: f64, params: &PoolParams) -> f64;
}

/// Default fee hook: a flat base component plus a nonlinear volatility
/// component, floored at `FEE_FLOOR`.
///
/// base     = base_factor * bin_step
/// variable = bin_step * volatility^1.25
#[derive(Debug, Clone, Copy, Default)]
pub struct VolatilityFee;

impl FeeModel for VolatilityFee {
    fn fee(&self, _price: f64, volatility: f64, params: &PoolParams) -> f64 {
        let base = params.base_factor * params.bin_step;
        let variable = params.bin_step * volatility.max(0.0).powf(1.25);
        (base + variable).max(FEE_FLOOR)
    }
}

/// Fixed fee per swap. Handy for deterministic tests and replay checks.
#[derive(Debug, Clone, Copy)]
pub struct FlatFee(pub f64);

impl FeeModel for FlatFee {
    fn fee(&self, _price: f64, _volatility: f64, _params: &PoolParams) -> f64 {
        self.0
    }
}

/// Adapter so callers can plug an arbitrary closure as the fee hook.
pub struct FnFee<F>(pub F);

impl<F> FeeModel for FnFee<F>
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    fn fee(&self, price: f64, volatility: f64, _params: &PoolParams) -> f64 {
        (self.0)(price, volatility)
    }
}
