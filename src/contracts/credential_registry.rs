// src/contracts/credential_registry.rs
//! Credential Registry: ledger-resident lifecycle of anchored credentials.
//!
//! Credentials live under the composite key `("credential", [holderId])`.
//! Issuance is write-once per holder and revocation is one-way. Every
//! operation runs inside the caller's ledger transaction, so concurrent
//! issuance for the same holder is resolved by the ledger's commit-time
//! conflict detection.

use crate::error::EngineError;
use crate::ledger::host::{composite_key, LedgerHost};
use crate::models::credential::Credential;
use crate::models::field::FieldElement;
use log::info;
use serde_json::json;

/// Key namespace for anchored credentials.
pub const CREDENTIAL_NAMESPACE: &str = "credential";

pub const ISSUED_EVENT: &str = "CredentialIssued";
pub const REVOKED_EVENT: &str = "CredentialRevoked";

fn credential_key(holder_id: &str) -> Result<String, EngineError> {
    composite_key(CREDENTIAL_NAMESPACE, &[holder_id])
}

fn require_holder(holder_id: &str) -> Result<(), EngineError> {
    if holder_id.trim().is_empty() {
        return Err(EngineError::Validation("holderId must not be empty".into()));
    }
    Ok(())
}

/// Anchors a new credential for `holder_id`.
///
/// # Arguments
/// * `host` - Running ledger transaction
/// * `holder_id` - Holder identity
/// * `credential_hash` - Merkle root over the holder's attributes
/// * `issuer` - Issuing authority
///
/// # Returns
/// The stored credential, stamped with the transaction timestamp
///
/// # Errors
/// `EngineError::AlreadyExists` if the holder already has a credential
pub fn issue(
    host: &mut dyn LedgerHost,
    holder_id: &str,
    credential_hash: FieldElement,
    issuer: &str,
) -> Result<Credential, EngineError> {
    require_holder(holder_id)?;
    if issuer.trim().is_empty() {
        return Err(EngineError::Validation("issuer must not be empty".into()));
    }

    let key = credential_key(holder_id)?;
    if host.get_state(&key)?.is_some() {
        return Err(EngineError::AlreadyExists {
            holder_id: holder_id.to_string(),
        });
    }

    let credential = Credential::issued(
        holder_id.to_string(),
        credential_hash,
        issuer.to_string(),
        host.tx_timestamp(),
    );
    host.put_state(&key, serde_json::to_vec(&credential)?)?;

    let event = json!({
        "holderId": holder_id,
        "credentialHash": credential.credential_hash,
        "issuer": issuer,
        "transactionId": host.tx_id(),
    });
    host.emit_event(ISSUED_EVENT, serde_json::to_vec(&event)?)?;

    info!("Credential issued for holder {} by {}", holder_id, issuer);
    Ok(credential)
}

/// Reads the credential anchored for `holder_id`.
///
/// # Errors
/// `EngineError::NotFound` if none exists
pub fn get(host: &mut dyn LedgerHost, holder_id: &str) -> Result<Credential, EngineError> {
    require_holder(holder_id)?;
    let bytes = host
        .get_state(&credential_key(holder_id)?)?
        .ok_or_else(|| EngineError::NotFound {
            holder_id: holder_id.to_string(),
        })?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Revokes the credential anchored for `holder_id`.
///
/// The first revocation's timestamp and reason are kept; revoking an already
/// revoked credential fails instead of overwriting them.
///
/// # Errors
/// - `EngineError::NotFound` if none exists
/// - `EngineError::RevokedCredential` if it is already revoked
pub fn revoke(
    host: &mut dyn LedgerHost,
    holder_id: &str,
    reason: &str,
) -> Result<Credential, EngineError> {
    let mut credential = get(host, holder_id)?;
    if !credential.valid {
        return Err(EngineError::RevokedCredential {
            holder_id: holder_id.to_string(),
        });
    }

    credential.valid = false;
    credential.revoked_at = Some(host.tx_timestamp());
    credential.revocation_reason = Some(reason.to_string());
    host.put_state(&credential_key(holder_id)?, serde_json::to_vec(&credential)?)?;

    let event = json!({
        "holderId": holder_id,
        "reason": reason,
        "transactionId": host.tx_id(),
    });
    host.emit_event(REVOKED_EVENT, serde_json::to_vec(&event)?)?;

    info!("Credential revoked for holder {}", holder_id);
    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ledger::memory::MemoryLedger;

    fn root(n: u64) -> FieldElement {
        FieldElement::from(n)
    }

    #[test]
    fn test_issue_then_get() {
        let ledger = MemoryLedger::new();
        let issued = ledger
            .submit(|host| issue(host, "u1", root(42), "TrustedIssuer"))
            .unwrap();
        assert!(issued.valid);

        let fetched = ledger.evaluate(|host| get(host, "u1")).unwrap();
        assert_eq!(fetched, issued);
        assert_eq!(ledger.events()[0].name, ISSUED_EVENT);
    }

    #[test]
    fn test_issue_is_write_once() {
        let ledger = MemoryLedger::new();
        ledger
            .submit(|host| issue(host, "u1", root(1), "A"))
            .unwrap();
        let err = ledger
            .submit(|host| issue(host, "u1", root(2), "B"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExistsError);

        let kept = ledger.evaluate(|host| get(host, "u1")).unwrap();
        assert_eq!(kept.credential_hash, root(1));
        assert_eq!(kept.issuer, "A");
    }

    #[test]
    fn test_concurrent_issue_surfaces_already_exists_class() {
        let ledger = MemoryLedger::new();
        let mut first = ledger.begin();
        let mut second = ledger.begin();
        issue(&mut first, "u1", root(1), "A").unwrap();
        issue(&mut second, "u1", root(2), "B").unwrap();
        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExistsError);
    }

    #[test]
    fn test_get_missing() {
        let ledger = MemoryLedger::new();
        let err = ledger.evaluate(|host| get(host, "ghost")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFoundError);
    }

    #[test]
    fn test_revoke_is_one_way() {
        let ledger = MemoryLedger::new();
        ledger
            .submit(|host| issue(host, "u1", root(1), "A"))
            .unwrap();
        let revoked = ledger
            .submit(|host| revoke(host, "u1", "compromised"))
            .unwrap();
        assert!(!revoked.valid);
        assert_eq!(revoked.revocation_reason.as_deref(), Some("compromised"));
        assert!(revoked.revoked_at.is_some());

        let events = ledger.events();
        let revocations: Vec<_> = events.iter().filter(|e| e.name == REVOKED_EVENT).collect();
        assert_eq!(revocations.len(), 1);
        let payload = revocations[0].payload_json().unwrap();
        assert_eq!(payload["holderId"], "u1");
        assert_eq!(payload["reason"], "compromised");
        assert_eq!(payload["transactionId"], revocations[0].tx_id.as_str());

        let err = ledger
            .submit(|host| revoke(host, "u1", "again"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RevokedCredentialError);
        let kept = ledger.evaluate(|host| get(host, "u1")).unwrap();
        assert_eq!(kept.revocation_reason.as_deref(), Some("compromised"));
        let revocations = ledger
            .events()
            .iter()
            .filter(|e| e.name == REVOKED_EVENT)
            .count();
        assert_eq!(revocations, 1);
    }

    #[test]
    fn test_revoke_missing() {
        let ledger = MemoryLedger::new();
        let err = ledger
            .submit(|host| revoke(host, "ghost", "x"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFoundError);
    }

    #[test]
    fn test_empty_arguments_rejected() {
        let ledger = MemoryLedger::new();
        let err = ledger
            .submit(|host| issue(host, " ", root(1), "A"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        let err = ledger
            .submit(|host| issue(host, "u1", root(1), ""))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }
}
