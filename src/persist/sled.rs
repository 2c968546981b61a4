use std::path::Path;

use async_trait::async_trait;
use sled::{Db, Tree};
use tracing::debug;

use crate::persist::types::{
    PersistError, PersistResult, PoolSnapshot, WalOp, SNAPSHOT_SCHEMA_VERSION,
};
use crate::persist::wal;
use crate::persist::{SnapshotStore, WalStore};

/// Embedded store backing both persistence traits: a `snapshot` tree of
/// JSON pool snapshots and a `wal` tree of JSON ops, each keyed by a
/// monotonically increasing big-endian u64.
pub struct SledStore {
    db: Db,
    snapshots: Tree,
    wal: Tree,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let db = sled::open(path)?;
        let snapshots = db.open_tree("snapshot")?;
        let wal = db.open_tree("wal")?;
        Ok(Self { db, snapshots, wal })
    }

    fn next_id(tree: &Tree) -> PersistResult<u64> {
        Ok(tree.last()?.map(|(key, _)| decode_key(&key) + 1).unwrap_or(1))
    }

    fn wal_high_watermark(&self) -> PersistResult<u64> {
        Ok(self.wal.last()?.map(|(key, _)| decode_key(&key)).unwrap_or(0))
    }
}

fn decode_key(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    if bytes.len() == 8 {
        buf.copy_from_slice(bytes);
    }
    u64::from_be_bytes(buf)
}

#[async_trait]
impl SnapshotStore for SledStore {
    async fn load_snapshot(&self) -> PersistResult<Option<PoolSnapshot>> {
        let Some((_, value)) = self.snapshots.last()? else {
            return Ok(None);
        };
        let snap: PoolSnapshot = serde_json::from_slice(&value)?;
        if snap.version != SNAPSHOT_SCHEMA_VERSION {
            return Err(PersistError::FormatMismatch {
                found: snap.version,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        Ok(Some(snap))
    }

    async fn save_snapshot(&mut self, snapshot: &PoolSnapshot) -> PersistResult<()> {
        // stamp the watermark at save time so replay starts exactly where
        // the snapshot left off
        let mut stamped = snapshot.clone();
        stamped.wal_high_watermark = self.wal_high_watermark()?;
        let id = Self::next_id(&self.snapshots)?;
        self.snapshots.insert(id.to_be_bytes(), serde_json::to_vec(&stamped)?)?;
        self.db.flush_async().await?;
        debug!(id, watermark = stamped.wal_high_watermark, "saved snapshot");
        Ok(())
    }
}

#[async_trait]
impl WalStore for SledStore {
    async fn append_op(&mut self, op: &WalOp) -> PersistResult<u64> {
        let id = Self::next_id(&self.wal)?;
        self.wal.insert(id.to_be_bytes(), wal::op_to_json(op)?.as_bytes())?;
        self.db.flush_async().await?;
        debug!(id, "appended WAL op");
        Ok(id)
    }

    async fn ops_since(&self, watermark: u64) -> PersistResult<Vec<(u64, WalOp)>> {
        let start = watermark.saturating_add(1).to_be_bytes();
        let mut ops = Vec::new();
        for entry in self.wal.range(start..) {
            let (key, value) = entry?;
            let id = decode_key(&key);
            let text = std::str::from_utf8(&value)
                .map_err(|_| PersistError::CorruptWalRecord { id })?;
            let op =
                wal::op_from_json(text).map_err(|_| PersistError::CorruptWalRecord { id })?;
            ops.push((id, op));
        }
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fees::FlatFee;
    use crate::engine::pool::DlmmPool;
    use crate::engine::types::{LiquidityBin, PoolParams};
    use crate::persist::{restore_then_replay, snapshot};

    fn ladder_pool() -> DlmmPool {
        DlmmPool::new(
            vec![
                LiquidityBin::new(1, 0.0, 1.0, 500_000.0).unwrap(),
                LiquidityBin::new(2, 1.0, 2.0, 500_000.0).unwrap(),
                LiquidityBin::new(3, 2.0, 3.0, 500_000.0).unwrap(),
            ],
            PoolParams { base_factor: 0.0005, bin_step: 0.05 },
            Box::new(FlatFee(100.0)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn empty_store_has_nothing_to_restore() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        assert!(store.load_snapshot().await.unwrap().is_none());
        assert!(store.ops_since(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn wal_replays_only_past_the_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SledStore::open(dir.path()).unwrap();
        store
            .append_op(&WalOp::LiquidityAdded { lp: "a".into(), bin_id: 1, amount: 1.0 })
            .await
            .unwrap();
        let cut = store
            .append_op(&WalOp::LiquidityAdded { lp: "a".into(), bin_id: 1, amount: 2.0 })
            .await
            .unwrap();
        store
            .append_op(&WalOp::LiquidityRemoved { lp: "a".into(), bin_id: 1, amount: 1.5 })
            .await
            .unwrap();

        let ops = store.ops_since(cut).await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].1, WalOp::LiquidityRemoved { lp: "a".into(), bin_id: 1, amount: 1.5 });
    }

    #[tokio::test]
    async fn snapshot_watermark_is_stamped_at_save_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SledStore::open(dir.path()).unwrap();
        store
            .append_op(&WalOp::LiquidityAdded { lp: "a".into(), bin_id: 1, amount: 1.0 })
            .await
            .unwrap();
        store
            .append_op(&WalOp::LiquidityAdded { lp: "b".into(), bin_id: 2, amount: 2.0 })
            .await
            .unwrap();

        store.save_snapshot(&snapshot::from_pool(&ladder_pool())).await.unwrap();
        let loaded = store.load_snapshot().await.unwrap().unwrap();
        assert_eq!(loaded.wal_high_watermark, 2);
    }

    #[tokio::test]
    async fn restore_then_replay_rebuilds_the_live_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut live = ladder_pool();
        {
            let mut store = SledStore::open(dir.path()).unwrap();

            live.add_liquidity("LP001", 1, 100_000.0).unwrap();
            store
                .append_op(&WalOp::LiquidityAdded {
                    lp: "LP001".into(),
                    bin_id: 1,
                    amount: 100_000.0,
                })
                .await
                .unwrap();
            store.save_snapshot(&snapshot::from_pool(&live)).await.unwrap();

            // one more op after the snapshot, so replay has work to do
            let (outcome, _) = live.swap(0.5, 10_000.0, 0.0).unwrap();
            store
                .append_op(&WalOp::SwapExecuted {
                    price: 0.5,
                    amount: 10_000.0,
                    fee: outcome.fee,
                })
                .await
                .unwrap();
        }

        // reopen from disk, as a restart would
        let store = SledStore::open(dir.path()).unwrap();
        let mut restored = ladder_pool();
        let outcome = restore_then_replay(&mut restored, &store, &store).await.unwrap();

        assert!(outcome.from_snapshot);
        assert_eq!(outcome.replayed, 1);
        assert_eq!(restored.total_liquidity(), live.total_liquidity());
        assert_eq!(restored.lp_summary("LP001").unwrap(), live.lp_summary("LP001").unwrap());
    }

    #[tokio::test]
    async fn wal_without_snapshot_is_replayed_in_full() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SledStore::open(dir.path()).unwrap();
        store
            .append_op(&WalOp::LiquidityAdded { lp: "LP001".into(), bin_id: 1, amount: 500.0 })
            .await
            .unwrap();
        store
            .append_op(&WalOp::LiquidityAdded { lp: "LP001".into(), bin_id: 2, amount: 250.0 })
            .await
            .unwrap();

        let mut restored = ladder_pool();
        let outcome = restore_then_replay(&mut restored, &store, &store).await.unwrap();

        assert!(!outcome.from_snapshot);
        assert_eq!(outcome.replayed, 2);
        assert_eq!(restored.lp_summary("LP001").unwrap().total_shares, 750.0);
    }
}
