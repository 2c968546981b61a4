//! Pure conversions between the in-memory pool and the serializable
//! snapshot types. No storage I/O lives here.

use crate::engine::pool::DlmmPool;
use crate::engine::types::{DlmmError, LiquidityBin, LpAccount};
use crate::persist::types::{
    PersistError, PersistResult, PoolSnapshot, SnapshotBin, SnapshotLp, WalOp,
    SNAPSHOT_SCHEMA_VERSION,
};

/// Capture the pool as a snapshot. `wal_high_watermark` is left at 0 here;
/// the store stamps it at save time.
pub fn from_pool(pool: &DlmmPool) -> PoolSnapshot {
    let bins = pool
        .bins()
        .map(|bin| {
            let mut lp_shares: Vec<(String, f64)> =
                bin.lp_shares.iter().map(|(addr, shares)| (addr.clone(), *shares)).collect();
            lp_shares.sort_by(|a, b| a.0.cmp(&b.0));
            SnapshotBin {
                id: bin.id,
                lower: bin.lower,
                upper: bin.upper,
                liquidity: bin.liquidity,
                lp_shares,
            }
        })
        .collect();

    let mut lps: Vec<SnapshotLp> = pool
        .lps()
        .map(|lp| {
            let mut bin_positions: Vec<(u32, f64)> =
                lp.bin_positions.iter().map(|(id, shares)| (*id, *shares)).collect();
            bin_positions.sort_by_key(|(id, _)| *id);
            SnapshotLp {
                address: lp.address.clone(),
                total_shares: lp.total_shares,
                bin_positions,
                rewards: lp.rewards,
            }
        })
        .collect();
    lps.sort_by(|a, b| a.address.cmp(&b.address));

    PoolSnapshot {
        version: SNAPSHOT_SCHEMA_VERSION,
        params: *pool.params(),
        bins,
        lps,
        wal_high_watermark: 0,
    }
}

/// Replace the pool's state with a previously captured snapshot. The pool
/// keeps its fee model; only bins, LP accounts and params are swapped.
pub fn apply_to_pool(pool: &mut DlmmPool, snap: &PoolSnapshot) -> PersistResult<()> {
    if snap.version != SNAPSHOT_SCHEMA_VERSION {
        return Err(PersistError::FormatMismatch {
            found: snap.version,
            expected: SNAPSHOT_SCHEMA_VERSION,
        });
    }
    let bins = snap
        .bins
        .iter()
        .map(|b| {
            let mut bin = LiquidityBin::new(b.id, b.lower, b.upper, b.liquidity)?;
            bin.lp_shares = b.lp_shares.iter().cloned().collect();
            Ok(bin)
        })
        .collect::<Result<Vec<_>, DlmmError>>()?;
    let lps = snap
        .lps
        .iter()
        .map(|lp| LpAccount {
            address: lp.address.clone(),
            total_shares: lp.total_shares,
            bin_positions: lp.bin_positions.iter().copied().collect(),
            rewards: lp.rewards,
        })
        .collect();
    pool.replace_state(snap.params, bins, lps)?;
    Ok(())
}

/// Apply a single WAL op during startup replay.
pub fn apply_op(pool: &mut DlmmPool, op: &WalOp) -> Result<(), DlmmError> {
    match op {
        WalOp::LiquidityAdded { lp, bin_id, amount } => {
            pool.add_liquidity(lp, *bin_id, *amount)?;
        }
        WalOp::LiquidityRemoved { lp, bin_id, amount } => {
            pool.remove_liquidity(lp, *bin_id, *amount)?;
        }
        WalOp::SwapExecuted { price, amount, fee } => {
            pool.swap_with_fee(*price, *amount, *fee)?;
        }
    }
    Ok(())
}
