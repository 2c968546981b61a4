pub mod sled;
pub mod snapshot;
pub mod types;
pub mod wal;
pub use types::*;

use async_trait::async_trait;
use tracing::{error, info};

use crate::engine::pool::DlmmPool;

#[async_trait]
pub trait SnapshotStore {
    async fn load_snapshot(&self) -> PersistResult<Option<PoolSnapshot>>;
    async fn save_snapshot(&mut self, snapshot: &PoolSnapshot) -> PersistResult<()>;
}

#[async_trait]
pub trait WalStore {
    async fn append_op(&mut self, op: &WalOp) -> PersistResult<u64>;
    async fn ops_since(&self, watermark: u64) -> PersistResult<Vec<(u64, WalOp)>>;
}

/// What startup recovery found and did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestoreOutcome {
    pub from_snapshot: bool,
    pub replayed: usize,
}

impl RestoreOutcome {
    pub fn is_empty(&self) -> bool {
        !self.from_snapshot && self.replayed == 0
    }
}

/// Startup recovery: apply the latest snapshot (if any), then replay every
/// WAL op recorded after its watermark. With no snapshot yet, the whole log
/// is replayed, so acknowledged writes survive a restart either way.
pub async fn restore_then_replay(
    pool: &mut DlmmPool,
    snapshots: &dyn SnapshotStore,
    wal: &dyn WalStore,
) -> PersistResult<RestoreOutcome> {
    let watermark = match snapshots.load_snapshot().await? {
        Some(snap) => {
            snapshot::apply_to_pool(pool, &snap)?;
            Some(snap.wal_high_watermark)
        }
        None => None,
    };
    let ops = wal.ops_since(watermark.unwrap_or(0)).await?;
    let replayed = ops.len();
    for (id, op) in ops {
        if let Err(err) = snapshot::apply_op(pool, &op) {
            error!(id, %err, "WAL replay stopped on invalid op");
            return Err(err.into());
        }
    }
    info!(watermark, replayed, "pool restored");
    Ok(RestoreOutcome { from_snapshot: watermark.is_some(), replayed })
}
