// src/models/credential.rs
//! Ledger-resident data model: anchored credentials and verification records.
//!
//! Both types are stored as JSON with camelCase field names so that off-ledger
//! audit tooling can read them without this crate.

use crate::models::field::FieldElement;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A credential anchored on the ledger, one per holder identity.
///
/// Only the Merkle root of the holder's attributes is stored; attribute
/// values never reach the ledger.
///
/// # Lifecycle
/// `valid` is `true` from issuance until revocation and never returns to
/// `true` afterwards. `revoked_at` and `revocation_reason` are present only
/// after revocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Opaque unique holder identifier
    pub holder_id: String,

    /// Root of the Merkle tree over the holder's attributes
    pub credential_hash: FieldElement,

    /// Identifier of the issuing authority
    pub issuer: String,

    /// Transaction timestamp of the issuance
    pub issued_at: DateTime<Utc>,

    pub valid: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_reason: Option<String>,
}

impl Credential {
    /// Creates a freshly issued, valid credential.
    pub fn issued(
        holder_id: String,
        credential_hash: FieldElement,
        issuer: String,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Credential {
            holder_id,
            credential_hash,
            issuer,
            issued_at,
            valid: true,
            revoked_at: None,
            revocation_reason: None,
        }
    }
}

/// One verification attempt, accepted or rejected. Append-only.
///
/// Holds hashes and public signals only, never raw attribute values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub holder_id: String,

    /// Transaction that performed the attempt; unique per attempt
    pub transaction_id: String,

    pub timestamp: DateTime<Utc>,

    pub accepted: bool,

    /// Public signals as presented, in canonical decimal form
    pub public_signals: Vec<FieldElement>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_age: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_root_hash: Option<FieldElement>,

    /// Error kind and message for rejected attempts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_credential_json_layout() {
        let issued_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let credential = Credential::issued(
            "u1".into(),
            FieldElement::from(7u64),
            "TrustedIssuer".into(),
            issued_at,
        );
        let json = serde_json::to_value(&credential).unwrap();
        assert_eq!(json["holderId"], "u1");
        assert_eq!(json["credentialHash"], "7");
        assert_eq!(json["valid"], true);
        assert!(json.get("revokedAt").is_none());

        let back: Credential = serde_json::from_value(json).unwrap();
        assert_eq!(back, credential);
    }
}
