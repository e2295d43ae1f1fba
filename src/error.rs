// src/error.rs
//! Error taxonomy for the credential anchoring engine.
//!
//! Every failure is fatal to the current invocation only. The engine never
//! retries; the caller decides whether to resubmit. Each variant maps onto a
//! stable [`ErrorKind`] so callers (and tests) can tell rejections apart
//! without matching on message text.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which business-rule check rejected a set of public signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalCheck {
    /// Declared convention and actual signal count disagree
    SignalCount,
    /// `[isAdult]` was not the literal one
    AdultFlag,
    /// `isOfAgeFlag` in the three-signal convention was not truthy
    OfAgeFlag,
    /// Signal threshold differs from the caller's `minimumAge`
    MinimumAge,
    /// Signal-carried root differs from the caller-supplied root
    RootConsistency,
}

impl fmt::Display for SignalCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalCheck::SignalCount => "signal count",
            SignalCheck::AdultFlag => "adult flag",
            SignalCheck::OfAgeFlag => "of-age flag",
            SignalCheck::MinimumAge => "minimum age",
            SignalCheck::RootConsistency => "root consistency",
        };
        f.write_str(name)
    }
}

/// Errors raised by the engine, its ledger host and its verifier adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or malformed operation arguments
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("cannot encode attribute value: {0}")]
    Encoding(String),

    #[error("cannot build a Merkle tree from zero leaves")]
    EmptyInput,

    #[error("leaf index {index} out of range for a tree of {leaf_count} leaves")]
    IndexOutOfRange { index: usize, leaf_count: usize },

    #[error("malformed Merkle proof: {elements} path elements but {indices} path indices")]
    MalformedProof { elements: usize, indices: usize },

    #[error("attribute `{0}` named in the field order is missing")]
    MissingField(String),

    /// Proof or public signals could not be parsed
    #[error("malformed verification payload: {0}")]
    MalformedPayload(String),

    #[error("credential already exists for holder `{holder_id}`")]
    AlreadyExists { holder_id: String },

    /// Commit-time read-set conflict reported by the ledger
    #[error("transaction conflicted on key `{key}`")]
    Conflict { key: String },

    #[error("no credential found for holder `{holder_id}`")]
    NotFound { holder_id: String },

    #[error("credential for holder `{holder_id}` has been revoked")]
    RevokedCredential { holder_id: String },

    #[error("zero-knowledge proof rejected: {0}")]
    ProofInvalid(String),

    #[error("public signal check failed ({check}): {detail}")]
    SignalMismatch { check: SignalCheck, detail: String },

    #[error("bound root hash does not match the credential issued to `{holder_id}`")]
    RootMismatch { holder_id: String },

    #[error("verification key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("ledger value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stable, serializable classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ValidationError,
    EncodingError,
    EmptyInputError,
    IndexOutOfRangeError,
    MalformedProofError,
    MissingFieldError,
    MalformedPayloadError,
    AlreadyExistsError,
    NotFoundError,
    RevokedCredentialError,
    ProofInvalidError,
    SignalMismatchError,
    RootMismatchError,
    KeyUnavailableError,
    SerializationError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl EngineError {
    /// Returns the kind of this error.
    ///
    /// A ledger [`EngineError::Conflict`] is reported as
    /// [`ErrorKind::AlreadyExistsError`]: the only write the engine races on is
    /// the write-once credential key.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::ValidationError,
            EngineError::Encoding(_) => ErrorKind::EncodingError,
            EngineError::EmptyInput => ErrorKind::EmptyInputError,
            EngineError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRangeError,
            EngineError::MalformedProof { .. } => ErrorKind::MalformedProofError,
            EngineError::MissingField(_) => ErrorKind::MissingFieldError,
            EngineError::MalformedPayload(_) => ErrorKind::MalformedPayloadError,
            EngineError::AlreadyExists { .. } | EngineError::Conflict { .. } => {
                ErrorKind::AlreadyExistsError
            }
            EngineError::NotFound { .. } => ErrorKind::NotFoundError,
            EngineError::RevokedCredential { .. } => ErrorKind::RevokedCredentialError,
            EngineError::ProofInvalid(_) => ErrorKind::ProofInvalidError,
            EngineError::SignalMismatch { .. } => ErrorKind::SignalMismatchError,
            EngineError::RootMismatch { .. } => ErrorKind::RootMismatchError,
            EngineError::KeyUnavailable(_) => ErrorKind::KeyUnavailableError,
            EngineError::Serialization(_) => ErrorKind::SerializationError,
        }
    }

    /// Whether this error is a verification rejection whose audit record
    /// should survive the aborted transaction.
    pub fn is_recorded_rejection(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFoundError
                | ErrorKind::RevokedCredentialError
                | ErrorKind::ProofInvalidError
                | ErrorKind::SignalMismatchError
                | ErrorKind::RootMismatchError
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_already_exists_class() {
        let err = EngineError::Conflict { key: "k".into() };
        assert_eq!(err.kind(), ErrorKind::AlreadyExistsError);
    }

    #[test]
    fn test_signal_mismatch_names_sub_check() {
        let err = EngineError::SignalMismatch {
            check: SignalCheck::MinimumAge,
            detail: "expected 18, got 21".into(),
        };
        assert!(err.to_string().contains("minimum age"));
        assert!(err.is_recorded_rejection());
    }

    #[test]
    fn test_payload_errors_are_not_recorded() {
        assert!(!EngineError::MalformedPayload("bad".into()).is_recorded_rejection());
        assert!(!EngineError::KeyUnavailable("gone".into()).is_recorded_rejection());
    }
}
