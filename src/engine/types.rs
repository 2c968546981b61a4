use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Pool-wide pricing parameters shared by the fee models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolParams {
    pub base_factor: f64,
    pub bin_step: f64,
}

// A discrete price range [lower, upper) holding liquidity and the LP
// share ledger for that range.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityBin {
    pub id: u32,
    pub lower: f64,
    pub upper: f64,
    pub liquidity: f64,
    pub lp_shares: AHashMap<String, f64>, // LP address -> shares
}

impl LiquidityBin {
    pub fn new(id: u32, lower: f64, upper: f64, liquidity: f64) -> Result<Self, DlmmError> {
        let bin = Self { id, lower, upper, liquidity, lp_shares: AHashMap::new() };
        bin.validate()?;
        Ok(bin)
    }

    /// Range and liquidity invariants. The fields are public, so the pool
    /// re-checks these on install rather than trusting the constructor ran.
    pub fn validate(&self) -> Result<(), DlmmError> {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.lower >= self.upper {
            return Err(DlmmError::InvalidBinRange { lower: self.lower, upper: self.upper });
        }
        if !self.liquidity.is_finite() || self.liquidity < 0.0 {
            return Err(DlmmError::InvalidAmount { amount: self.liquidity });
        }
        Ok(())
    }

    /// Width of the price range covered by this bin.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, price: f64) -> bool {
        self.lower <= price && price < self.upper
    }

    /// Apply a liquidity delta, rejecting any change that would drive the
    /// bin negative.
    pub fn adjust(&mut self, delta: f64) -> Result<(), DlmmError> {
        let next = self.liquidity + delta;
        if next < 0.0 {
            return Err(DlmmError::NegativeLiquidity { bin_id: self.id });
        }
        debug!(bin_id = self.id, delta, liquidity = next, "adjusted bin liquidity");
        self.liquidity = next;
        Ok(())
    }
}

// Per-LP accounting: aggregate shares, per-bin positions and the accrued
// fee rewards ledger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LpAccount {
    pub address: String,
    pub total_shares: f64,
    pub bin_positions: AHashMap<u32, f64>, // bin_id -> shares
    pub rewards: f64,
}

impl LpAccount {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into(), ..Default::default() }
    }
}

/// Result of a single swap against a bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwapOutcome {
    pub filled: f64,
    pub fee: f64,
    pub received: f64,
    pub bin_id: u32,
}

/// Serializable report for one LP, as returned by `lp_summary`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LpSummary {
    pub address: String,
    pub total_shares: f64,
    pub bin_positions: Vec<(u32, f64)>,
    pub rewards: f64,
}

// Every mutating pool operation reports what happened as events, so
// callers can log, persist or forward them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PoolEvent {
    LiquidityAdded { lp: String, bin_id: u32, amount: f64 },
    LiquidityRemoved { lp: String, bin_id: u32, amount: f64 },
    SwapExecuted { bin_id: u32, price: f64, amount: f64, fee: f64, received: f64 },
    FeesAccrued { lp: String, bin_id: u32, amount: f64 },
    LiquidityShifted { from_bin: u32, to_bin: u32, amount: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DlmmError {
    #[error("price {price} is outside every liquidity bin")]
    PriceOutOfRange { price: f64 },

    #[error("bin {bin_id} holds {available}, cannot fill {requested}")]
    InsufficientLiquidity { bin_id: u32, requested: f64, available: f64 },

    #[error("unknown bin {bin_id}")]
    UnknownBin { bin_id: u32 },

    #[error("unknown LP {address}")]
    UnknownLp { address: String },

    #[error("LP {address} holds {held} shares in bin {bin_id}, cannot burn {requested}")]
    InsufficientShares { address: String, bin_id: u32, requested: f64, held: f64 },

    #[error("operation would drive bin {bin_id} liquidity negative")]
    NegativeLiquidity { bin_id: u32 },

    #[error("invalid bin range [{lower}, {upper})")]
    InvalidBinRange { lower: f64, upper: f64 },

    #[error("bins {id_a} and {id_b} overlap")]
    OverlappingBins { id_a: u32, id_b: u32 },

    #[error("amount {amount} must be positive")]
    InvalidAmount { amount: f64 },

    #[error("{what} is not a finite number")]
    NonFiniteInput { what: &'static str },
}

/// Reject NaN and infinities before they reach the ledgers.
pub(crate) fn ensure_finite(what: &'static str, v: f64) -> Result<(), DlmmError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(DlmmError::NonFiniteInput { what })
    }
}

/// Positive and finite, the common case for amounts.
pub(crate) fn ensure_positive(what: &'static str, v: f64) -> Result<(), DlmmError> {
    ensure_finite(what, v)?;
    if v > 0.0 {
        Ok(())
    } else {
        Err(DlmmError::InvalidAmount { amount: v })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_rejects_inverted_range() {
        assert!(matches!(
            LiquidityBin::new(1, 2.0, 1.0, 0.0),
            Err(DlmmError::InvalidBinRange { .. })
        ));
    }

    #[test]
    fn bin_adjust_floors_at_zero() {
        let mut bin = LiquidityBin::new(1, 0.0, 1.0, 100.0).unwrap();
        bin.adjust(-40.0).unwrap();
        assert_eq!(bin.liquidity, 60.0);
        let err = bin.adjust(-100.0).unwrap_err();
        assert_eq!(err, DlmmError::NegativeLiquidity { bin_id: 1 });
        // failed adjust leaves the bin untouched
        assert_eq!(bin.liquidity, 60.0);
    }

    #[test]
    fn bin_contains_is_half_open() {
        let bin = LiquidityBin::new(7, 1.0, 2.0, 0.0).unwrap();
        assert!(bin.contains(1.0));
        assert!(bin.contains(1.999));
        assert!(!bin.contains(2.0));
        assert!(!bin.contains(0.999));
    }
}
