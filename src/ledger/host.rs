// src/ledger/host.rs
//! Host ledger interface seen by the engine during one transaction.

use crate::error::EngineError;
use chrono::{DateTime, Utc};

/// Separator used inside composite keys.
const KEY_SEPARATOR: char = '\u{0}';

/// Transaction context exposed by the host ledger.
///
/// Every engine operation runs inside exactly one transaction. Reads observe
/// the committed state plus the transaction's own writes; writes become
/// visible to others only when the host commits.
pub trait LedgerHost {
    /// Reads the value stored under `key`.
    fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, EngineError>;

    /// Buffers a write of `value` under `key`.
    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), EngineError>;

    /// All `(key, value)` pairs whose key belongs to `namespace`, in the
    /// ledger's iteration order.
    fn iterate_by_prefix(&mut self, namespace: &str)
        -> Result<Vec<(String, Vec<u8>)>, EngineError>;

    /// Buffers a notification for off-ledger listeners.
    fn emit_event(&mut self, name: &str, payload: Vec<u8>) -> Result<(), EngineError>;

    /// Unique identifier of the running transaction.
    fn tx_id(&self) -> &str;

    /// Deterministic timestamp assigned to the transaction by the host.
    fn tx_timestamp(&self) -> DateTime<Utc>;
}

/// Builds a composite key `\0namespace\0part\0part\0...`.
///
/// # Errors
/// `EngineError::Validation` if the namespace or a part is empty or contains
/// the separator character
pub fn composite_key(namespace: &str, parts: &[&str]) -> Result<String, EngineError> {
    if namespace.is_empty() {
        return Err(EngineError::Validation("key namespace is empty".into()));
    }
    let mut key = String::new();
    key.push(KEY_SEPARATOR);
    for segment in std::iter::once(namespace).chain(parts.iter().copied()) {
        if segment.is_empty() || segment.contains(KEY_SEPARATOR) {
            return Err(EngineError::Validation(format!(
                "invalid key segment `{}`",
                segment.escape_debug()
            )));
        }
        key.push_str(segment);
        key.push(KEY_SEPARATOR);
    }
    Ok(key)
}

/// Key prefix shared by every composite key in `namespace`.
pub fn namespace_prefix(namespace: &str) -> String {
    format!("{sep}{namespace}{sep}", sep = KEY_SEPARATOR)
}
