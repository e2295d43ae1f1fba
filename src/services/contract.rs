// src/services/contract.rs
//! Contract surface of the credential anchor.
//!
//! `CredentialContract` lists the operations callable inside a ledger
//! transaction. `OperationTable` binds their stable names to handler
//! functions taking string arguments and returning JSON, the shape a ledger
//! host uses to invoke chaincode.

use crate::contracts::credential_registry;
use crate::contracts::verification_log::{self, AuditNamespace};
use crate::error::EngineError;
use crate::ledger::host::LedgerHost;
use crate::models::credential::{Credential, VerificationRecord};
use crate::models::field::FieldElement;
use crate::services::verifier::{
    AgeProofSubmission, ProofSubmission, VerificationOutcome, Verifier,
};
use crate::zkp::proof_verification::ZkVerifier;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Operations exposed to the ledger host.
pub trait CredentialContract {
    fn issue_credential(
        &self,
        host: &mut dyn LedgerHost,
        holder_id: &str,
        credential_hash: &str,
        issuer: &str,
    ) -> Result<Credential, EngineError>;

    fn get_credential(
        &self,
        host: &mut dyn LedgerHost,
        holder_id: &str,
    ) -> Result<Credential, EngineError>;

    fn revoke_credential(
        &self,
        host: &mut dyn LedgerHost,
        holder_id: &str,
        reason: &str,
    ) -> Result<Credential, EngineError>;

    fn verify_proof(
        &self,
        host: &mut dyn LedgerHost,
        submission: &ProofSubmission,
    ) -> Result<VerificationOutcome, EngineError>;

    fn verify_age(
        &self,
        host: &mut dyn LedgerHost,
        submission: &AgeProofSubmission,
    ) -> Result<VerificationOutcome, EngineError>;

    fn query_verifications(
        &self,
        host: &mut dyn LedgerHost,
    ) -> Result<Vec<VerificationRecord>, EngineError>;

    fn query_age_verifications(
        &self,
        host: &mut dyn LedgerHost,
    ) -> Result<Vec<VerificationRecord>, EngineError>;
}

/// Stateless contract implementation; all state lives on the ledger.
#[derive(Clone)]
pub struct CredentialHandler {
    verifier: Verifier,
}

impl CredentialHandler {
    /// Creates the handler.
    ///
    /// # Arguments
    /// * `zk` - Verifier used by `VerifyProof` and `VerifyAge`
    pub fn new(zk: Arc<dyn ZkVerifier>) -> Self {
        CredentialHandler {
            verifier: Verifier::new(zk),
        }
    }
}

impl CredentialContract for CredentialHandler {
    fn issue_credential(
        &self,
        host: &mut dyn LedgerHost,
        holder_id: &str,
        credential_hash: &str,
        issuer: &str,
    ) -> Result<Credential, EngineError> {
        let credential_hash: FieldElement = credential_hash.parse()?;
        credential_registry::issue(host, holder_id, credential_hash, issuer)
    }

    fn get_credential(
        &self,
        host: &mut dyn LedgerHost,
        holder_id: &str,
    ) -> Result<Credential, EngineError> {
        credential_registry::get(host, holder_id)
    }

    fn revoke_credential(
        &self,
        host: &mut dyn LedgerHost,
        holder_id: &str,
        reason: &str,
    ) -> Result<Credential, EngineError> {
        credential_registry::revoke(host, holder_id, reason)
    }

    fn verify_proof(
        &self,
        host: &mut dyn LedgerHost,
        submission: &ProofSubmission,
    ) -> Result<VerificationOutcome, EngineError> {
        self.verifier.verify_proof(host, submission)
    }

    fn verify_age(
        &self,
        host: &mut dyn LedgerHost,
        submission: &AgeProofSubmission,
    ) -> Result<VerificationOutcome, EngineError> {
        self.verifier.verify_age(host, submission)
    }

    fn query_verifications(
        &self,
        host: &mut dyn LedgerHost,
    ) -> Result<Vec<VerificationRecord>, EngineError> {
        verification_log::query_all(host, AuditNamespace::Verification)
    }

    fn query_age_verifications(
        &self,
        host: &mut dyn LedgerHost,
    ) -> Result<Vec<VerificationRecord>, EngineError> {
        verification_log::query_all(host, AuditNamespace::AgeVerification)
    }
}

/// Handler bound to an operation name.
pub type Operation =
    fn(&CredentialHandler, &mut dyn LedgerHost, &[String]) -> Result<String, EngineError>;

/// Name-to-handler routing for ledger invocations.
pub struct OperationTable {
    operations: HashMap<&'static str, Operation>,
}

impl Default for OperationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationTable {
    /// Builds the table with every contract operation registered.
    pub fn new() -> Self {
        let mut operations: HashMap<&'static str, Operation> = HashMap::new();
        operations.insert("IssueCredential", issue_credential_op);
        operations.insert("GetCredential", get_credential_op);
        operations.insert("RevokeCredential", revoke_credential_op);
        operations.insert("VerifyProof", verify_proof_op);
        operations.insert("VerifyAge", verify_age_op);
        operations.insert("QueryVerifications", query_verifications_op);
        operations.insert("QueryAgeVerifications", query_age_verifications_op);
        OperationTable { operations }
    }

    /// Sorted operation names.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.operations.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Runs the operation called `name` with positional string arguments.
    ///
    /// # Errors
    /// `EngineError::Validation` for an unknown name or a wrong argument
    /// count, otherwise whatever the operation returns
    pub fn invoke(
        &self,
        handler: &CredentialHandler,
        name: &str,
        host: &mut dyn LedgerHost,
        args: &[String],
    ) -> Result<String, EngineError> {
        let operation = self
            .operations
            .get(name)
            .ok_or_else(|| EngineError::Validation(format!("unknown operation `{}`", name)))?;
        operation(handler, host, args)
    }
}

fn expect_args(name: &str, args: &[String], allowed: &[usize]) -> Result<(), EngineError> {
    if allowed.contains(&args.len()) {
        Ok(())
    } else {
        Err(EngineError::Validation(format!(
            "{} expects {:?} arguments, got {}",
            name,
            allowed,
            args.len()
        )))
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, EngineError> {
    Ok(serde_json::to_string(value)?)
}

fn issue_credential_op(
    handler: &CredentialHandler,
    host: &mut dyn LedgerHost,
    args: &[String],
) -> Result<String, EngineError> {
    expect_args("IssueCredential", args, &[3])?;
    to_json(&handler.issue_credential(host, &args[0], &args[1], &args[2])?)
}

fn get_credential_op(
    handler: &CredentialHandler,
    host: &mut dyn LedgerHost,
    args: &[String],
) -> Result<String, EngineError> {
    expect_args("GetCredential", args, &[1])?;
    to_json(&handler.get_credential(host, &args[0])?)
}

fn revoke_credential_op(
    handler: &CredentialHandler,
    host: &mut dyn LedgerHost,
    args: &[String],
) -> Result<String, EngineError> {
    expect_args("RevokeCredential", args, &[2])?;
    to_json(&handler.revoke_credential(host, &args[0], &args[1])?)
}

fn verify_proof_op(
    handler: &CredentialHandler,
    host: &mut dyn LedgerHost,
    args: &[String],
) -> Result<String, EngineError> {
    expect_args("VerifyProof", args, &[4])?;
    let submission = ProofSubmission {
        holder_id: args[0].clone(),
        proof: args[1].clone(),
        public_signals: args[2].clone(),
        root_hash: args[3].clone(),
    };
    to_json(&handler.verify_proof(host, &submission)?)
}

fn verify_age_op(
    handler: &CredentialHandler,
    host: &mut dyn LedgerHost,
    args: &[String],
) -> Result<String, EngineError> {
    expect_args("VerifyAge", args, &[5, 6])?;
    let submission = AgeProofSubmission {
        holder_id: args[0].clone(),
        proof: args[1].clone(),
        public_signals: args[2].clone(),
        minimum_age: args[3].clone(),
        signal_version: args[4].clone(),
        // An empty trailing argument means no root was asserted.
        root_hash: args.get(5).filter(|root| !root.is_empty()).cloned(),
    };
    to_json(&handler.verify_age(host, &submission)?)
}

fn query_verifications_op(
    handler: &CredentialHandler,
    host: &mut dyn LedgerHost,
    args: &[String],
) -> Result<String, EngineError> {
    expect_args("QueryVerifications", args, &[0])?;
    to_json(&handler.query_verifications(host)?)
}

fn query_age_verifications_op(
    handler: &CredentialHandler,
    host: &mut dyn LedgerHost,
    args: &[String],
) -> Result<String, EngineError> {
    expect_args("QueryAgeVerifications", args, &[0])?;
    to_json(&handler.query_age_verifications(host)?)
}
