// src/services/verifier.rs
//! Proof/binding verification service.
//!
//! Combines an external zero-knowledge verification with an on-ledger binding
//! check. Each attempt walks a fixed sequence of stages:
//!
//! `Received -> ProofChecked -> SignalsValidated -> RootBound -> Accepted`
//!
//! and may be rejected at any transition. Rejections from `ProofChecked`
//! onwards are written to the audit log before the error is returned; the
//! orchestrator performs no other ledger write before every check has passed.

use crate::contracts::credential_registry;
use crate::contracts::verification_log::{
    self, AuditNamespace, ACCEPTED_EVENT, REJECTION_EVENT,
};
use crate::error::EngineError;
use crate::ledger::host::LedgerHost;
use crate::models::credential::VerificationRecord;
use crate::models::field::{parse_integer, FieldElement};
use crate::zkp::proof_verification::{Groth16Proof, ZkVerifier};
use crate::zkp::signals::{interpret_age_signals, parse_public_signals, SignalConvention};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// Stages of one verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerificationStage {
    Received,
    ProofChecked,
    SignalsValidated,
    RootBound,
    Accepted,
}

impl fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Generic proof submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofSubmission {
    pub holder_id: String,
    /// snarkjs proof JSON
    pub proof: String,
    /// JSON array of public signals
    pub public_signals: String,
    /// Root the proof claims to be bound to, decimal or hex
    pub root_hash: String,
}

/// Age-predicate proof submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeProofSubmission {
    pub holder_id: String,
    pub proof: String,
    pub public_signals: String,
    /// Threshold requested by the relying party
    pub minimum_age: String,
    /// Declared signal convention, `v1` or `v2`
    pub signal_version: String,
    /// Caller-asserted root; required for `v1`
    #[serde(default)]
    pub root_hash: Option<String>,
}

/// Result of an accepted verification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub holder_id: String,
    pub transaction_id: String,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_of_age: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_age: Option<u64>,
    pub bound_root_hash: FieldElement,
}

/// Everything parsed in the `Received` stage.
struct Attempt {
    holder_id: String,
    proof: Groth16Proof,
    signals: Vec<FieldElement>,
    minimum_age: Option<u64>,
    claimed_root: Option<FieldElement>,
    namespace: AuditNamespace,
}

/// Verification orchestrator.
///
/// Holds only the injected zero-knowledge verifier; all state lives in the
/// ledger transaction passed to each call.
#[derive(Clone)]
pub struct Verifier {
    zk: Arc<dyn ZkVerifier>,
}

impl Verifier {
    /// Creates an orchestrator around an external verifier.
    ///
    /// # Arguments
    /// * `zk` - Zero-knowledge verifier, shared with every other request
    pub fn new(zk: Arc<dyn ZkVerifier>) -> Self {
        Verifier { zk }
    }

    /// Verifies a generic proof bound to a caller-supplied root.
    ///
    /// # Errors
    /// - `MalformedPayload` if the submission cannot be parsed
    /// - `KeyUnavailable` if no verification key is loaded
    /// - `ProofInvalid`, `NotFound`, `RevokedCredential`, `RootMismatch` on
    ///   rejection (recorded in the audit log)
    pub fn verify_proof(
        &self,
        host: &mut dyn LedgerHost,
        submission: &ProofSubmission,
    ) -> Result<VerificationOutcome, EngineError> {
        let attempt = Attempt {
            holder_id: require_holder(&submission.holder_id)?,
            proof: Groth16Proof::parse(&submission.proof)?,
            signals: parse_public_signals(&submission.public_signals)?,
            minimum_age: None,
            claimed_root: Some(parse_root(&submission.root_hash)?),
            namespace: AuditNamespace::Verification,
        };

        self.run(host, attempt, |attempt| {
            let root = attempt
                .claimed_root
                .ok_or_else(|| EngineError::MalformedPayload("rootHash is required".into()))?;
            Ok((root, None))
        })
    }

    /// Verifies an age-predicate proof under the declared signal convention.
    ///
    /// # Errors
    /// As [`Verifier::verify_proof`], plus `SignalMismatch` naming the failed
    /// sub-check
    pub fn verify_age(
        &self,
        host: &mut dyn LedgerHost,
        submission: &AgeProofSubmission,
    ) -> Result<VerificationOutcome, EngineError> {
        let convention: SignalConvention = submission
            .signal_version
            .parse()
            .map_err(|e: EngineError| EngineError::MalformedPayload(e.to_string()))?;
        let minimum_age = parse_minimum_age(&submission.minimum_age)?;
        let caller_root = submission
            .root_hash
            .as_deref()
            .map(parse_root)
            .transpose()?;
        if convention == SignalConvention::AdultFlag && caller_root.is_none() {
            return Err(EngineError::MalformedPayload(
                "v1 signals require a caller-supplied rootHash".into(),
            ));
        }
        let signals = parse_public_signals(&submission.public_signals)?;

        let claimed_root = match convention {
            SignalConvention::AgeBinding if signals.len() == 3 => Some(signals[1]),
            _ => caller_root,
        };

        let attempt = Attempt {
            holder_id: require_holder(&submission.holder_id)?,
            proof: Groth16Proof::parse(&submission.proof)?,
            signals,
            minimum_age: Some(minimum_age),
            claimed_root,
            namespace: AuditNamespace::AgeVerification,
        };

        self.run(host, attempt, |attempt| {
            let claim =
                interpret_age_signals(convention, &attempt.signals, minimum_age, caller_root)?;
            Ok((claim.bound_root, Some(claim.is_of_age)))
        })
    }

    /// Drives an attempt from `Received` to `Accepted`.
    ///
    /// `validate_signals` implements the `SignalsValidated` stage and returns
    /// the root to bind plus the predicate result, if any.
    fn run(
        &self,
        host: &mut dyn LedgerHost,
        attempt: Attempt,
        validate_signals: impl FnOnce(&Attempt) -> Result<(FieldElement, Option<bool>), EngineError>,
    ) -> Result<VerificationOutcome, EngineError> {
        let mut reached = VerificationStage::Received;
        let result = self.check_proof(&attempt).and_then(|_| {
            reached = VerificationStage::ProofChecked;
            let (root, predicate) = validate_signals(&attempt)?;
            reached = VerificationStage::SignalsValidated;
            bind_root(&mut *host, &attempt.holder_id, &root)?;
            reached = VerificationStage::RootBound;
            Ok((root, predicate))
        });

        match result {
            Ok((root, predicate)) => {
                let record = self.record(host, &attempt, true, Some(root), None);
                verification_log::append(host, attempt.namespace, &record)?;
                let event = json!({
                    "holderId": attempt.holder_id,
                    "transactionId": host.tx_id(),
                    "namespace": attempt.namespace.as_str(),
                    "isOfAge": predicate,
                });
                host.emit_event(ACCEPTED_EVENT, serde_json::to_vec(&event)?)?;
                info!(
                    "Verification {} for holder {} in transaction {}",
                    VerificationStage::Accepted,
                    attempt.holder_id,
                    host.tx_id()
                );

                Ok(VerificationOutcome {
                    holder_id: attempt.holder_id,
                    transaction_id: host.tx_id().to_string(),
                    accepted: true,
                    is_of_age: predicate,
                    minimum_age: attempt.minimum_age,
                    bound_root_hash: root,
                })
            }
            Err(err) if err.is_recorded_rejection() => {
                let reason = format!("{}: {}", err.kind(), err);
                warn!(
                    "Verification rejected after {} for holder {} in transaction {}: {}",
                    reached,
                    attempt.holder_id,
                    host.tx_id(),
                    reason
                );
                let record =
                    self.record(host, &attempt, false, attempt.claimed_root, Some(reason));
                verification_log::append(host, attempt.namespace, &record)?;
                let event = json!({
                    "holderId": attempt.holder_id,
                    "transactionId": host.tx_id(),
                    "namespace": attempt.namespace.as_str(),
                    "reason": err.kind(),
                });
                host.emit_event(REJECTION_EVENT, serde_json::to_vec(&event)?)?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// `ProofChecked` stage.
    fn check_proof(&self, attempt: &Attempt) -> Result<(), EngineError> {
        match self.zk.verify(&attempt.proof, &attempt.signals) {
            Ok(true) => Ok(()),
            Ok(false) => Err(EngineError::ProofInvalid(
                "verifier rejected the proof".into(),
            )),
            Err(EngineError::KeyUnavailable(reason)) => Err(EngineError::KeyUnavailable(reason)),
            Err(EngineError::ProofInvalid(reason)) => Err(EngineError::ProofInvalid(reason)),
            Err(other) => Err(EngineError::ProofInvalid(other.to_string())),
        }
    }

    fn record(
        &self,
        host: &dyn LedgerHost,
        attempt: &Attempt,
        accepted: bool,
        bound_root_hash: Option<FieldElement>,
        rejection_reason: Option<String>,
    ) -> VerificationRecord {
        VerificationRecord {
            holder_id: attempt.holder_id.clone(),
            transaction_id: host.tx_id().to_string(),
            timestamp: host.tx_timestamp(),
            accepted,
            public_signals: attempt.signals.clone(),
            minimum_age: attempt.minimum_age,
            bound_root_hash,
            rejection_reason,
        }
    }
}

/// `RootBound` stage: the credential must exist, be valid, and carry `root`.
fn bind_root(
    host: &mut dyn LedgerHost,
    holder_id: &str,
    root: &FieldElement,
) -> Result<(), EngineError> {
    let credential = credential_registry::get(host, holder_id)?;
    if !credential.valid {
        return Err(EngineError::RevokedCredential {
            holder_id: holder_id.to_string(),
        });
    }
    // Both sides are canonical field elements, so hex and decimal inputs of
    // the same integer compare equal.
    if credential.credential_hash != *root {
        return Err(EngineError::RootMismatch {
            holder_id: holder_id.to_string(),
        });
    }
    Ok(())
}

fn require_holder(holder_id: &str) -> Result<String, EngineError> {
    if holder_id.trim().is_empty() {
        return Err(EngineError::MalformedPayload("holderId is required".into()));
    }
    Ok(holder_id.to_string())
}

fn parse_root(text: &str) -> Result<FieldElement, EngineError> {
    text.parse()
        .map_err(|_| EngineError::MalformedPayload(format!("rootHash `{}` is not a field element", text)))
}

fn parse_minimum_age(text: &str) -> Result<u64, EngineError> {
    parse_integer(text)
        .and_then(|value| u64::try_from(&value).ok())
        .ok_or_else(|| EngineError::MalformedPayload(format!("minimumAge `{}` is not a number", text)))
}
