use std::collections::BTreeMap;
use std::fmt;

use ahash::AHashMap;
use metrics::{counter, gauge, histogram};
use ordered_float::NotNan;
use tracing::{debug, info, instrument, warn};

use crate::engine::fees::FeeModel;
use crate::engine::strategy::ReallocationStrategy;
use crate::engine::types::{
    ensure_finite, ensure_positive, DlmmError, LiquidityBin, LpAccount, LpSummary, PoolEvent,
    PoolParams, SwapOutcome,
};

/// The DLMM pool: liquidity bins keyed by id, an ordered lower-bound index
/// for price lookup, and the LP accounting ledgers.
pub struct DlmmPool {
    params: PoolParams,
    bins: BTreeMap<u32, LiquidityBin>,
    by_lower: BTreeMap<NotNan<f64>, u32>,
    lp_accounts: AHashMap<String, LpAccount>,
    fee_model: Box<dyn FeeModel>,
}

impl fmt::Debug for DlmmPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DlmmPool")
            .field("params", &self.params)
            .field("bins", &self.bins.len())
            .field("lps", &self.lp_accounts.len())
            .finish_non_exhaustive()
    }
}

impl DlmmPool {
    pub fn new(
        bins: Vec<LiquidityBin>,
        params: PoolParams,
        fee_model: Box<dyn FeeModel>,
    ) -> Result<Self, DlmmError> {
        let mut pool = Self {
            params,
            bins: BTreeMap::new(),
            by_lower: BTreeMap::new(),
            lp_accounts: AHashMap::new(),
            fee_model,
        };
        pool.install_bins(bins)?;
        info!(bins = pool.bins.len(), "initialized DLMM pool");
        Ok(pool)
    }

    /// Validate and index a fresh bin set. Bins must have unique ids and
    /// non-overlapping price ranges.
    fn install_bins(&mut self, bins: Vec<LiquidityBin>) -> Result<(), DlmmError> {
        let mut by_id: BTreeMap<u32, LiquidityBin> = BTreeMap::new();
        let mut by_lower: BTreeMap<NotNan<f64>, u32> = BTreeMap::new();
        for bin in bins {
            bin.validate()?;
            if let Some(prev) = by_id.get(&bin.id) {
                return Err(DlmmError::OverlappingBins { id_a: prev.id, id_b: bin.id });
            }
            let lower = NotNan::new(bin.lower)
                .map_err(|_| DlmmError::NonFiniteInput { what: "bin lower bound" })?;
            // two bins sharing a lower bound collide on this key and would
            // dodge the neighbour check below
            if let Some(other) = by_lower.insert(lower, bin.id) {
                return Err(DlmmError::OverlappingBins { id_a: other, id_b: bin.id });
            }
            by_id.insert(bin.id, bin);
        }
        // ordered by lower bound, so overlap shows up between neighbours
        let ids: Vec<u32> = by_lower.values().copied().collect();
        for pair in ids.windows(2) {
            let a = &by_id[&pair[0]];
            let b = &by_id[&pair[1]];
            if a.upper > b.lower {
                return Err(DlmmError::OverlappingBins { id_a: a.id, id_b: b.id });
            }
        }
        self.bins = by_id;
        self.by_lower = by_lower;
        Ok(())
    }

    pub fn params(&self) -> &PoolParams {
        &self.params
    }

    pub fn bin(&self, id: u32) -> Option<&LiquidityBin> {
        self.bins.get(&id)
    }

    /// Bins in ascending id order.
    pub fn bins(&self) -> impl Iterator<Item = &LiquidityBin> {
        self.bins.values()
    }

    pub fn bin_ids(&self) -> Vec<u32> {
        self.bins.keys().copied().collect()
    }

    pub fn lps(&self) -> impl Iterator<Item = &LpAccount> {
        self.lp_accounts.values()
    }

    pub fn total_liquidity(&self) -> f64 {
        self.bins.values().map(|b| b.liquidity).sum()
    }

    /// The bin whose [lower, upper) range covers `price`, if any.
    pub fn find_bin(&self, price: f64) -> Option<&LiquidityBin> {
        let p = NotNan::new(price).ok()?;
        let (_, id) = self.by_lower.range(..=p).next_back()?;
        let bin = &self.bins[id];
        bin.contains(price).then_some(bin)
    }

    /// Swap against the bin covering `price`, charging a fee from the
    /// configured fee model at the given volatility reading.
    #[instrument(skip(self), fields(price, amount, volatility))]
    pub fn swap(
        &mut self,
        price: f64,
        amount: f64,
        volatility: f64,
    ) -> Result<(SwapOutcome, Vec<PoolEvent>), DlmmError> {
        ensure_finite("price", price)?;
        ensure_finite("volatility", volatility)?;
        ensure_positive("amount", amount)?;
        let fee = self.fee_model.fee(price, volatility, &self.params);
        self.swap_with_fee(price, amount, fee)
    }

    /// Swap with an explicit fee, bypassing the fee model. WAL replay uses
    /// this so recovery does not depend on a live volatility feed.
    pub fn swap_with_fee(
        &mut self,
        price: f64,
        amount: f64,
        fee: f64,
    ) -> Result<(SwapOutcome, Vec<PoolEvent>), DlmmError> {
        ensure_finite("price", price)?;
        ensure_finite("fee", fee)?;
        ensure_positive("amount", amount)?;

        let bin_id = match self.find_bin(price) {
            Some(bin) => bin.id,
            None => {
                warn!(price, "swap failed: no bin covers price");
                return Err(DlmmError::PriceOutOfRange { price });
            }
        };
        let bin = self.bins.get_mut(&bin_id).expect("indexed bin exists");
        if bin.liquidity < amount {
            warn!(
                bin_id,
                requested = amount,
                available = bin.liquidity,
                "swap failed: insufficient liquidity"
            );
            return Err(DlmmError::InsufficientLiquidity {
                bin_id,
                requested: amount,
                available: bin.liquidity,
            });
        }

        let received = amount - fee;
        bin.adjust(-amount)?;

        let mut events = vec![PoolEvent::SwapExecuted { bin_id, price, amount, fee, received }];
        self.accrue_fees(bin_id, fee, &mut events);

        counter!("dlmm_swaps_total").increment(1);
        histogram!("dlmm_swap_fee").record(fee);
        gauge!("dlmm_total_liquidity").set(self.total_liquidity());
        info!(bin_id, price, amount, fee, received, "swap executed");

        Ok((SwapOutcome { filled: amount, fee, received, bin_id }, events))
    }

    /// Distribute a collected fee pro-rata over the LPs holding shares in
    /// the bin. Goes to the rewards ledger, not back into bin liquidity.
    fn accrue_fees(&mut self, bin_id: u32, fee: f64, events: &mut Vec<PoolEvent>) {
        let bin = &self.bins[&bin_id];
        let total_shares: f64 = bin.lp_shares.values().sum();
        if total_shares == 0.0 {
            warn!(bin_id, fee, "no LP shares in bin, fee not distributed");
            return;
        }
        let holders: Vec<(String, f64)> =
            bin.lp_shares.iter().map(|(a, s)| (a.clone(), *s)).collect();
        for (address, shares) in holders {
            let portion = fee * shares / total_shares;
            if let Some(lp) = self.lp_accounts.get_mut(&address) {
                lp.rewards += portion;
                debug!(lp = %address, bin_id, portion, "accrued fees");
                events.push(PoolEvent::FeesAccrued { lp: address, bin_id, amount: portion });
            }
        }
    }

    #[instrument(skip(self), fields(lp, bin_id, amount))]
    pub fn add_liquidity(
        &mut self,
        lp: &str,
        bin_id: u32,
        amount: f64,
    ) -> Result<Vec<PoolEvent>, DlmmError> {
        ensure_positive("amount", amount)?;
        let bin = self.bins.get_mut(&bin_id).ok_or(DlmmError::UnknownBin { bin_id })?;
        bin.adjust(amount)?;
        *bin.lp_shares.entry(lp.to_string()).or_insert(0.0) += amount;

        let account = self
            .lp_accounts
            .entry(lp.to_string())
            .or_insert_with(|| LpAccount::new(lp));
        account.total_shares += amount;
        *account.bin_positions.entry(bin_id).or_insert(0.0) += amount;

        counter!("dlmm_liquidity_adds_total").increment(1);
        gauge!("dlmm_total_liquidity").set(self.total_liquidity());
        info!(lp, bin_id, amount, "liquidity added");
        Ok(vec![PoolEvent::LiquidityAdded { lp: lp.to_string(), bin_id, amount }])
    }

    #[instrument(skip(self), fields(lp, bin_id, amount))]
    pub fn remove_liquidity(
        &mut self,
        lp: &str,
        bin_id: u32,
        amount: f64,
    ) -> Result<Vec<PoolEvent>, DlmmError> {
        ensure_positive("amount", amount)?;
        let bin = self.bins.get_mut(&bin_id).ok_or(DlmmError::UnknownBin { bin_id })?;
        let held = bin.lp_shares.get(lp).copied().unwrap_or(0.0);
        if !self.lp_accounts.contains_key(lp) || held < amount {
            warn!(lp, bin_id, requested = amount, held, "remove failed: not enough shares");
            return Err(DlmmError::InsufficientShares {
                address: lp.to_string(),
                bin_id,
                requested: amount,
                held,
            });
        }
        bin.adjust(-amount)?;
        *bin.lp_shares.get_mut(lp).expect("held checked above") -= amount;

        let account = self.lp_accounts.get_mut(lp).expect("existence checked above");
        account.total_shares -= amount;
        *account.bin_positions.entry(bin_id).or_insert(0.0) -= amount;

        counter!("dlmm_liquidity_removes_total").increment(1);
        gauge!("dlmm_total_liquidity").set(self.total_liquidity());
        info!(lp, bin_id, amount, "liquidity removed");
        Ok(vec![PoolEvent::LiquidityRemoved { lp: lp.to_string(), bin_id, amount }])
    }

    pub fn lp_summary(&self, lp: &str) -> Result<LpSummary, DlmmError> {
        let account = self
            .lp_accounts
            .get(lp)
            .ok_or_else(|| DlmmError::UnknownLp { address: lp.to_string() })?;
        let mut bin_positions: Vec<(u32, f64)> =
            account.bin_positions.iter().map(|(id, s)| (*id, *s)).collect();
        bin_positions.sort_by_key(|(id, _)| *id);
        Ok(LpSummary {
            address: account.address.clone(),
            total_shares: account.total_shares,
            bin_positions,
            rewards: account.rewards,
        })
    }

    /// Move liquidity between two bins. The source keeps the non-negativity
    /// invariant, so strategies cannot over-draw a bin.
    pub fn shift_liquidity(
        &mut self,
        from: u32,
        to: u32,
        amount: f64,
    ) -> Result<PoolEvent, DlmmError> {
        ensure_positive("amount", amount)?;
        if !self.bins.contains_key(&from) {
            return Err(DlmmError::UnknownBin { bin_id: from });
        }
        if !self.bins.contains_key(&to) {
            return Err(DlmmError::UnknownBin { bin_id: to });
        }
        self.bins.get_mut(&from).expect("checked").adjust(-amount)?;
        self.bins.get_mut(&to).expect("checked").adjust(amount)?;
        info!(from_bin = from, to_bin = to, amount, "reallocated liquidity");
        Ok(PoolEvent::LiquidityShifted { from_bin: from, to_bin: to, amount })
    }

    /// Run a reallocation strategy under the pool's exclusive access. The
    /// plan is applied shift by shift; an invalid shift aborts the rest.
    #[instrument(skip(self, strategy), fields(strategy = strategy.name()))]
    pub fn reallocate(
        &mut self,
        strategy: &dyn ReallocationStrategy,
        volatility: f64,
    ) -> Result<Vec<PoolEvent>, DlmmError> {
        ensure_finite("volatility", volatility)?;
        let plan = strategy.plan(self, volatility);
        let mut events = Vec::with_capacity(plan.len());
        for shift in plan {
            events.push(self.shift_liquidity(shift.from, shift.to, shift.amount)?);
        }
        counter!("dlmm_reallocations_total").increment(1);
        info!(shifts = events.len(), "liquidity reallocation completed");
        Ok(events)
    }

    /// Swap the whole pool state for a restored one. Persistence uses this
    /// when applying a snapshot.
    pub(crate) fn replace_state(
        &mut self,
        params: PoolParams,
        bins: Vec<LiquidityBin>,
        lps: Vec<LpAccount>,
    ) -> Result<(), DlmmError> {
        self.install_bins(bins)?;
        self.params = params;
        self.lp_accounts = lps.into_iter().map(|lp| (lp.address.clone(), lp)).collect();
        Ok(())
    }
}
