// src/contracts/verification_log.rs
//! Append-only audit log of verification attempts.
//!
//! Records are keyed `(namespace, [holderId, transactionId])` and are never
//! mutated or deleted. Query order is ledger iteration order, which is not
//! guaranteed to be chronological.

use crate::error::EngineError;
use crate::ledger::host::{composite_key, LedgerHost};
use crate::models::credential::VerificationRecord;

/// Namespace for generic proof verifications.
pub const VERIFICATION_NAMESPACE: &str = "verification";
/// Namespace for age-predicate verifications.
pub const AGE_VERIFICATION_NAMESPACE: &str = "ageVerification";
/// Namespaces whose writes survive a rejected verification attempt.
pub const AUDIT_NAMESPACES: [&str; 2] = [VERIFICATION_NAMESPACE, AGE_VERIFICATION_NAMESPACE];

pub const ACCEPTED_EVENT: &str = "VerificationAccepted";
pub const REJECTION_EVENT: &str = "VerificationRejected";

/// Which audit trail a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditNamespace {
    Verification,
    AgeVerification,
}

impl AuditNamespace {
    /// Ledger namespace string for this trail.
    ///
    /// # Returns
    /// `"verification"` or `"ageVerification"`, used as the first segment of
    /// every record key
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditNamespace::Verification => VERIFICATION_NAMESPACE,
            AuditNamespace::AgeVerification => AGE_VERIFICATION_NAMESPACE,
        }
    }
}

/// Appends `record` to the audit trail.
///
/// # Errors
/// `EngineError::AlreadyExists` if a record for the same holder and
/// transaction is already present
pub fn append(
    host: &mut dyn LedgerHost,
    namespace: AuditNamespace,
    record: &VerificationRecord,
) -> Result<(), EngineError> {
    let key = composite_key(
        namespace.as_str(),
        &[record.holder_id.as_str(), record.transaction_id.as_str()],
    )?;
    if host.get_state(&key)?.is_some() {
        return Err(EngineError::AlreadyExists {
            holder_id: record.holder_id.clone(),
        });
    }
    host.put_state(&key, serde_json::to_vec(record)?)
}

/// Returns every record in `namespace`.
pub fn query_all(
    host: &mut dyn LedgerHost,
    namespace: AuditNamespace,
) -> Result<Vec<VerificationRecord>, EngineError> {
    host.iterate_by_prefix(namespace.as_str())?
        .into_iter()
        .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(EngineError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::MemoryLedger;
    use crate::models::field::FieldElement;
    use chrono::Utc;

    fn record(holder: &str, tx: &str, accepted: bool) -> VerificationRecord {
        VerificationRecord {
            holder_id: holder.into(),
            transaction_id: tx.into(),
            timestamp: Utc::now(),
            accepted,
            public_signals: vec![FieldElement::from(1u64)],
            minimum_age: None,
            bound_root_hash: None,
            rejection_reason: None,
        }
    }

    #[test]
    fn test_append_and_query_by_namespace() {
        let ledger = MemoryLedger::new();
        ledger
            .submit(|host| {
                append(host, AuditNamespace::Verification, &record("u1", "t1", true))?;
                append(host, AuditNamespace::Verification, &record("u2", "t2", false))?;
                append(host, AuditNamespace::AgeVerification, &record("u1", "t3", true))
            })
            .unwrap();

        let generic = ledger
            .evaluate(|host| query_all(host, AuditNamespace::Verification))
            .unwrap();
        assert_eq!(generic.len(), 2);
        assert!(generic.iter().any(|r| r.holder_id == "u2" && !r.accepted));

        let age = ledger
            .evaluate(|host| query_all(host, AuditNamespace::AgeVerification))
            .unwrap();
        assert_eq!(age.len(), 1);
        assert_eq!(age[0].transaction_id, "t3");
    }

    #[test]
    fn test_records_are_never_overwritten() {
        let ledger = MemoryLedger::new();
        ledger
            .submit(|host| append(host, AuditNamespace::Verification, &record("u1", "t1", true)))
            .unwrap();
        let err = ledger
            .submit(|host| append(host, AuditNamespace::Verification, &record("u1", "t1", false)))
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyExists { .. }));
        let all = ledger
            .evaluate(|host| query_all(host, AuditNamespace::Verification))
            .unwrap();
        assert!(all[0].accepted);
    }

    #[test]
    fn test_empty_log() {
        let ledger = MemoryLedger::new();
        let all = ledger
            .evaluate(|host| query_all(host, AuditNamespace::AgeVerification))
            .unwrap();
        assert!(all.is_empty());
    }
}
