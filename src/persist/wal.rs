use crate::persist::types::{PersistResult, WalOp};

/// Serialize a WAL op for storage.
pub fn op_to_json(op: &WalOp) -> PersistResult<String> {
    Ok(serde_json::to_string(op)?)
}

/// Parse a stored WAL record back into a `WalOp`.
pub fn op_from_json(s: &str) -> PersistResult<WalOp> {
    Ok(serde_json::from_str(s)?)
}
