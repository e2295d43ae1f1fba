// src/ledger/memory.rs
//! In-process ledger host with multi-version concurrency control.
//!
//! Committed state lives in a `BTreeMap`, so prefix iteration has a
//! deterministic order. Each transaction buffers its writes and remembers the
//! version of every key it read; commit re-validates those versions and
//! aborts with `EngineError::Conflict` if another transaction committed a
//! change in between.

use crate::contracts::verification_log::{AUDIT_NAMESPACES, REJECTION_EVENT};
use crate::error::EngineError;
use crate::ledger::host::{namespace_prefix, LedgerHost};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Source of transaction timestamps.
pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone)]
struct VersionedValue {
    value: Vec<u8>,
    version: u64,
}

/// A committed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEvent {
    pub tx_id: String,
    pub name: String,
    pub payload: Vec<u8>,
}

impl LedgerEvent {
    /// Payload parsed as JSON.
    pub fn payload_json(&self) -> Result<serde_json::Value, EngineError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

#[derive(Default)]
struct WorldState {
    entries: BTreeMap<String, VersionedValue>,
    height: u64,
    events: Vec<LedgerEvent>,
}

/// Shared in-memory ledger.
///
/// Cheap to share behind an `Arc`; all interior state is lock-protected.
pub struct MemoryLedger {
    state: RwLock<WorldState>,
    next_tx: AtomicU64,
    clock: Clock,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Creates an empty ledger stamping transactions with the host clock.
    pub fn new() -> Self {
        Self::with_clock(Box::new(Utc::now))
    }

    /// Creates an empty ledger with a custom timestamp source.
    pub fn with_clock(clock: Clock) -> Self {
        MemoryLedger {
            state: RwLock::new(WorldState::default()),
            next_tx: AtomicU64::new(1),
            clock,
        }
    }

    /// Opens a transaction with a fresh id and the host timestamp.
    ///
    /// Ids come from a per-ledger counter and are never reused, so every
    /// verification record keyed by transaction id is unique.
    pub fn begin(&self) -> LedgerTransaction<'_> {
        let sequence = self.next_tx.fetch_add(1, Ordering::SeqCst);
        LedgerTransaction {
            ledger: self,
            tx_id: format!("{:016x}", sequence),
            timestamp: (self.clock)(),
            read_set: BTreeMap::new(),
            write_set: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Runs `operation` in a new transaction and commits it.
    ///
    /// # Commit policy
    /// - `Ok`: every write and event is committed atomically
    /// - recorded verification rejections: only audit-namespace writes and
    ///   rejection events are committed, then the error is returned
    /// - any other error: nothing is committed
    pub fn submit<T>(
        &self,
        operation: impl FnOnce(&mut dyn LedgerHost) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut tx = self.begin();
        let host: &mut dyn LedgerHost = &mut tx;
        match operation(host) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) if err.is_recorded_rejection() => {
                tx.retain_audit_trail();
                if tx.is_empty() {
                    return Err(err);
                }
                if let Err(commit_err) = tx.commit() {
                    warn!("Rejection audit record dropped: {}", commit_err);
                }
                Err(err)
            }
            Err(err) => {
                debug!("Transaction {} discarded: {}", tx.tx_id, err);
                Err(err)
            }
        }
    }

    /// Runs a read-only `operation`; buffered writes are discarded.
    pub fn evaluate<T>(
        &self,
        operation: impl FnOnce(&mut dyn LedgerHost) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut tx = self.begin();
        let host: &mut dyn LedgerHost = &mut tx;
        operation(host)
    }

    /// Number of committed transactions.
    pub fn height(&self) -> u64 {
        self.read_state(|state| state.height)
    }

    /// Every committed event, in commit order.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.read_state(|state| state.events.clone())
    }

    fn read_state<T>(&self, f: impl FnOnce(&WorldState) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }
}

/// A running transaction against a [`MemoryLedger`].
pub struct LedgerTransaction<'a> {
    ledger: &'a MemoryLedger,
    tx_id: String,
    timestamp: DateTime<Utc>,
    /// Key -> version observed (0 when absent)
    read_set: BTreeMap<String, u64>,
    write_set: BTreeMap<String, Vec<u8>>,
    events: Vec<(String, Vec<u8>)>,
}

impl<'a> LedgerTransaction<'a> {
    /// Validates the read set and applies the write set atomically.
    ///
    /// # Errors
    /// `EngineError::Conflict` naming the first key whose committed version
    /// changed since it was read
    pub fn commit(self) -> Result<(), EngineError> {
        let mut state = self
            .ledger
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for (key, seen) in &self.read_set {
            let current = state.entries.get(key).map_or(0, |entry| entry.version);
            if current != *seen {
                return Err(EngineError::Conflict { key: key.clone() });
            }
        }

        state.height += 1;
        let version = state.height;
        for (key, value) in self.write_set {
            state.entries.insert(key, VersionedValue { value, version });
        }
        for (name, payload) in self.events {
            state.events.push(LedgerEvent {
                tx_id: self.tx_id.clone(),
                name,
                payload,
            });
        }
        debug!("Committed transaction {} at height {}", self.tx_id, version);
        Ok(())
    }

    /// Drops every buffered write and event except the audit trail.
    fn retain_audit_trail(&mut self) {
        let prefixes: Vec<String> = AUDIT_NAMESPACES.iter().map(|ns| namespace_prefix(ns)).collect();
        self.write_set
            .retain(|key, _| prefixes.iter().any(|prefix| key.starts_with(prefix.as_str())));
        self.events.retain(|(name, _)| name == REJECTION_EVENT);
    }

    /// Whether the transaction has nothing to commit.
    pub fn is_empty(&self) -> bool {
        self.write_set.is_empty() && self.events.is_empty()
    }

    fn observe(&mut self, key: &str, version: u64) {
        self.read_set.entry(key.to_string()).or_insert(version);
    }
}

impl<'a> LedgerHost for LedgerTransaction<'a> {
    fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, EngineError> {
        if let Some(value) = self.write_set.get(key) {
            return Ok(Some(value.clone()));
        }
        let committed = self
            .ledger
            .read_state(|state| state.entries.get(key).cloned());
        self.observe(key, committed.as_ref().map_or(0, |entry| entry.version));
        Ok(committed.map(|entry| entry.value))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), EngineError> {
        if key.is_empty() {
            return Err(EngineError::Validation("ledger key is empty".into()));
        }
        self.write_set.insert(key.to_string(), value);
        Ok(())
    }

    fn iterate_by_prefix(
        &mut self,
        namespace: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, EngineError> {
        let prefix = namespace_prefix(namespace);
        let committed: Vec<(String, VersionedValue)> = self.ledger.read_state(|state| {
            state
                .entries
                .range(prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(&prefix))
                .map(|(key, entry)| (key.clone(), entry.clone()))
                .collect()
        });

        let mut merged: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for (key, entry) in committed {
            self.observe(&key, entry.version);
            merged.insert(key, entry.value);
        }
        for (key, value) in self.write_set.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            merged.insert(key.clone(), value.clone());
        }
        Ok(merged.into_iter().collect())
    }

    fn emit_event(&mut self, name: &str, payload: Vec<u8>) -> Result<(), EngineError> {
        self.events.push((name.to_string(), payload));
        Ok(())
    }

    fn tx_id(&self) -> &str {
        &self.tx_id
    }

    fn tx_timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::host::composite_key;
    use chrono::TimeZone;

    fn fixed_ledger() -> MemoryLedger {
        MemoryLedger::with_clock(Box::new(|| Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()))
    }

    #[test]
    fn test_commit_makes_writes_visible() {
        let ledger = fixed_ledger();
        ledger
            .submit(|host| host.put_state("k", b"v".to_vec()))
            .unwrap();
        let value = ledger.evaluate(|host| host.get_state("k")).unwrap();
        assert_eq!(value, Some(b"v".to_vec()));
        assert_eq!(ledger.height(), 1);
    }

    #[test]
    fn test_failed_operation_discards_writes() {
        let ledger = fixed_ledger();
        let result: Result<(), _> = ledger.submit(|host| {
            host.put_state("k", b"v".to_vec())?;
            host.emit_event("Something", b"{}".to_vec())?;
            Err(EngineError::Validation("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(ledger.evaluate(|host| host.get_state("k")).unwrap(), None);
        assert!(ledger.events().is_empty());
        assert_eq!(ledger.height(), 0);
    }

    #[test]
    fn test_rejection_keeps_only_audit_trail() {
        let ledger = fixed_ledger();
        let audit_key = composite_key("verification", &["u1", "tx"]).unwrap();
        let other_key = composite_key("credential", &["u1"]).unwrap();
        let result: Result<(), _> = ledger.submit(|host| {
            host.put_state(&other_key, b"x".to_vec())?;
            host.put_state(&audit_key, b"{}".to_vec())?;
            host.emit_event(REJECTION_EVENT, b"{}".to_vec())?;
            host.emit_event("CredentialIssued", b"{}".to_vec())?;
            Err(EngineError::RootMismatch { holder_id: "u1".into() })
        });
        assert!(result.is_err());
        assert!(ledger.evaluate(|host| host.get_state(&audit_key)).unwrap().is_some());
        assert!(ledger.evaluate(|host| host.get_state(&other_key)).unwrap().is_none());
        let events = ledger.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, REJECTION_EVENT);
    }

    #[test]
    fn test_read_write_conflict_detected_at_commit() {
        let ledger = fixed_ledger();
        let mut first = ledger.begin();
        let mut second = ledger.begin();
        assert!(first.get_state("holder").unwrap().is_none());
        assert!(second.get_state("holder").unwrap().is_none());
        first.put_state("holder", b"a".to_vec()).unwrap();
        second.put_state("holder", b"b".to_vec()).unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(matches!(err, EngineError::Conflict { ref key } if key == "holder"));
        assert_eq!(
            ledger.evaluate(|host| host.get_state("holder")).unwrap(),
            Some(b"a".to_vec())
        );
    }

    #[test]
    fn test_prefix_iteration_is_ordered_and_sees_own_writes() {
        let ledger = fixed_ledger();
        let b = composite_key("verification", &["b", "1"]).unwrap();
        let a = composite_key("verification", &["a", "1"]).unwrap();
        let other = composite_key("ageVerification", &["a", "1"]).unwrap();
        ledger
            .submit(|host| {
                host.put_state(&b, b"2".to_vec())?;
                host.put_state(&other, b"3".to_vec())
            })
            .unwrap();

        let entries = ledger
            .evaluate(|host| {
                host.put_state(&a, b"1".to_vec())?;
                host.iterate_by_prefix("verification")
            })
            .unwrap();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec![a.as_str(), b.as_str()]);
    }

    #[test]
    fn test_transaction_ids_are_unique_and_time_comes_from_host() {
        let ledger = fixed_ledger();
        let first = ledger.begin();
        let second = ledger.begin();
        assert_ne!(first.tx_id(), second.tx_id());
        assert_eq!(
            first.tx_timestamp(),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_submitted_transactions_never_share_an_id() {
        let ledger = fixed_ledger();
        let mut ids = Vec::new();
        for n in 0..5u8 {
            let id = ledger
                .submit(|host| {
                    host.emit_event("Tick", vec![n])?;
                    Ok(host.tx_id().to_string())
                })
                .unwrap();
            ids.push(id);
        }
        ids.push(ledger.evaluate(|host| Ok(host.tx_id().to_string())).unwrap());

        let mut distinct = ids.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), ids.len());

        let event_ids: Vec<String> = ledger.events().into_iter().map(|e| e.tx_id).collect();
        assert_eq!(event_ids, ids[..5].to_vec());
    }
}
