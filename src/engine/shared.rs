use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::engine::pool::DlmmPool;
use crate::engine::strategy::ReallocationStrategy;
use crate::engine::types::{DlmmError, LpSummary, PoolEvent, SwapOutcome};

/// Thread-safe handle around the pool. Clone it freely across tasks;
/// every mutating operation holds the write lock for its full duration,
/// read-only queries share the read lock.
#[derive(Clone)]
pub struct SharedPool {
    inner: Arc<RwLock<DlmmPool>>,
}

impl SharedPool {
    pub fn new(pool: DlmmPool) -> Self {
        Self { inner: Arc::new(RwLock::new(pool)) }
    }

    /// Read access for snapshots and reporting.
    pub fn read(&self) -> RwLockReadGuard<'_, DlmmPool> {
        self.inner.read()
    }

    /// Exclusive access for callers that need multi-step transactions.
    pub fn with_write<T>(&self, f: impl FnOnce(&mut DlmmPool) -> T) -> T {
        f(&mut self.inner.write())
    }

    pub fn swap(
        &self,
        price: f64,
        amount: f64,
        volatility: f64,
    ) -> Result<(SwapOutcome, Vec<PoolEvent>), DlmmError> {
        self.inner.write().swap(price, amount, volatility)
    }

    pub fn add_liquidity(
        &self,
        lp: &str,
        bin_id: u32,
        amount: f64,
    ) -> Result<Vec<PoolEvent>, DlmmError> {
        self.inner.write().add_liquidity(lp, bin_id, amount)
    }

    pub fn remove_liquidity(
        &self,
        lp: &str,
        bin_id: u32,
        amount: f64,
    ) -> Result<Vec<PoolEvent>, DlmmError> {
        self.inner.write().remove_liquidity(lp, bin_id, amount)
    }

    pub fn lp_summary(&self, lp: &str) -> Result<LpSummary, DlmmError> {
        self.inner.read().lp_summary(lp)
    }

    pub fn reallocate(
        &self,
        strategy: &dyn ReallocationStrategy,
        volatility: f64,
    ) -> Result<Vec<PoolEvent>, DlmmError> {
        self.inner.write().reallocate(strategy, volatility)
    }

    pub fn total_liquidity(&self) -> f64 {
        self.inner.read().total_liquidity()
    }
}
