use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::types::{DlmmError, PoolParams};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage I/O failure: {0}")]
    Io(#[from] sled::Error),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot schema v{found} does not match v{expected}")]
    FormatMismatch { found: u32, expected: u32 },

    #[error("corrupt WAL record {id}")]
    CorruptWalRecord { id: u64 },

    #[error("no snapshot recorded")]
    NotFound,

    #[error("engine rejected replayed operation: {0}")]
    Engine(#[from] DlmmError),
}

pub type PersistResult<T> = Result<T, PersistError>;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub version: u32,
    pub params: PoolParams,
    pub bins: Vec<SnapshotBin>,
    pub lps: Vec<SnapshotLp>,
    pub wal_high_watermark: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotBin {
    pub id: u32,
    pub lower: f64,
    pub upper: f64,
    pub liquidity: f64,
    pub lp_shares: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotLp {
    pub address: String,
    pub total_shares: f64,
    pub bin_positions: Vec<(u32, f64)>,
    pub rewards: f64,
}

// Durable record of one mutating pool operation. Swaps carry the charged
// fee so replay does not depend on a volatility reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalOp {
    LiquidityAdded { lp: String, bin_id: u32, amount: f64 },
    LiquidityRemoved { lp: String, bin_id: u32, amount: f64 },
    SwapExecuted { price: f64, amount: f64, fee: f64 },
}
