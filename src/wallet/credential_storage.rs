// src/wallet/credential_storage.rs
//! Holder-side credential storage.
//!
//! The holder keeps the plaintext attributes and field order of each
//! credential in memory. Only the root ever reaches the ledger; the wallet
//! recomputes it on demand and produces selective-disclosure proofs for
//! single attributes. Nothing here talks to the ledger.

use crate::error::EngineError;
use crate::models::field::FieldElement;
use crate::zkp::merkle_tree::{compute_credential_root, CredentialRoot, MerkleProof};
use crate::zkp::merkle_verifier;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Attributes of one credential as held by its holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    pub attributes: BTreeMap<String, Value>,
    pub field_order: Vec<String>,
}

impl StoredCredential {
    /// Recomputes the root over the stored attributes.
    pub fn root(&self) -> Result<CredentialRoot, EngineError> {
        compute_credential_root(&self.attributes, &self.field_order)
    }
}

/// Proof that one attribute is part of a credential root.
///
/// Reveals the attribute's leaf hash, never the other attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDisclosure {
    pub field: String,
    pub leaf_index: usize,
    pub leaf: FieldElement,
    pub proof: MerkleProof,
    pub root: FieldElement,
}

/// In-memory holder wallet keyed by credential id.
#[derive(Debug, Default)]
pub struct HolderWallet {
    credentials: HashMap<String, StoredCredential>,
}

impl HolderWallet {
    /// Creates an empty wallet.
    pub fn new() -> Self {
        HolderWallet {
            credentials: HashMap::new(),
        }
    }

    /// Stores a credential and returns its root.
    ///
    /// The attributes are validated by computing the root before anything is
    /// stored, so an unencodable credential never enters the wallet. An
    /// existing entry under the same id is replaced.
    ///
    /// # Errors
    /// Whatever root computation fails with: `MissingField`, `Encoding` or
    /// `EmptyInput`
    pub fn store_credential(
        &mut self,
        id: &str,
        attributes: BTreeMap<String, Value>,
        field_order: Vec<String>,
    ) -> Result<FieldElement, EngineError> {
        let stored = StoredCredential {
            attributes,
            field_order,
        };
        let root = stored.root()?.root;
        self.credentials.insert(id.to_string(), stored);
        Ok(root)
    }

    /// Looks up a stored credential.
    ///
    /// # Arguments
    /// * `id` - Credential identifier used at storage time
    ///
    /// # Returns
    /// - `Some(&StoredCredential)` if held
    /// - `None` otherwise
    pub fn get_credential(&self, id: &str) -> Option<&StoredCredential> {
        self.credentials.get(id)
    }

    /// Returns the number of stored credentials.
    ///
    /// # Returns
    /// usize representing the count of held credentials
    pub fn count_credentials(&self) -> usize {
        self.credentials.len()
    }

    /// Checks whether a credential is held under `id`.
    ///
    /// # Arguments
    /// * `id` - Credential identifier to check
    ///
    /// # Returns
    /// `true` if present, `false` otherwise
    pub fn contains_credential(&self, id: &str) -> bool {
        self.credentials.contains_key(id)
    }

    /// Removes a credential; `false` if none was stored under `id`.
    pub fn remove_credential(&mut self, id: &str) -> bool {
        self.credentials.remove(id).is_some()
    }

    /// Root of the credential stored under `id`.
    ///
    /// # Errors
    /// `EngineError::NotFound` if no such credential is held
    pub fn credential_root(&self, id: &str) -> Result<FieldElement, EngineError> {
        Ok(self.stored(id)?.root()?.root)
    }

    /// Builds a disclosure proof for the attribute `field`.
    ///
    /// # Errors
    /// - `EngineError::NotFound` if no such credential is held
    /// - `EngineError::MissingField` if `field` is not in the field order
    pub fn disclose(&self, id: &str, field: &str) -> Result<AttributeDisclosure, EngineError> {
        let stored = self.stored(id)?;
        let leaf_index = stored
            .field_order
            .iter()
            .position(|name| name == field)
            .ok_or_else(|| EngineError::MissingField(field.to_string()))?;

        let computed = stored.root()?;
        let proof = computed.tree.generate_proof(leaf_index)?;
        Ok(AttributeDisclosure {
            field: field.to_string(),
            leaf_index,
            leaf: computed.leaves[leaf_index],
            proof,
            root: computed.root,
        })
    }

    fn stored(&self, id: &str) -> Result<&StoredCredential, EngineError> {
        self.credentials.get(id).ok_or_else(|| EngineError::NotFound {
            holder_id: id.to_string(),
        })
    }
}

/// Checks a disclosure against `expected_root`.
///
/// The disclosure's own `root` field is not trusted; only `expected_root`,
/// typically read from the ledger, is compared against.
pub fn verify_disclosure(
    disclosure: &AttributeDisclosure,
    expected_root: &FieldElement,
) -> Result<bool, EngineError> {
    merkle_verifier::verify(&disclosure.leaf, &disclosure.proof, expected_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zkp::merkle_tree::attribute_leaf;
    use serde_json::json;

    fn attributes() -> (BTreeMap<String, Value>, Vec<String>) {
        let mut attributes = BTreeMap::new();
        attributes.insert("name".to_string(), json!("Alice"));
        attributes.insert("dob".to_string(), json!("2000-01-01"));
        attributes.insert("nationality".to_string(), json!("US"));
        let order = vec!["name".to_string(), "dob".to_string(), "nationality".to_string()];
        (attributes, order)
    }

    #[test]
    fn test_store_returns_root() {
        let mut wallet = HolderWallet::new();
        let (attrs, order) = attributes();
        let expected = compute_credential_root(&attrs, &order).unwrap().root;
        let root = wallet.store_credential("id-card", attrs, order).unwrap();
        assert_eq!(root, expected);
        assert_eq!(wallet.credential_root("id-card").unwrap(), expected);
    }

    #[test]
    fn test_unencodable_credential_is_not_stored() {
        let mut wallet = HolderWallet::new();
        let (mut attrs, order) = attributes();
        attrs.insert("dob".to_string(), Value::Null);
        let err = wallet.store_credential("id-card", attrs, order).unwrap_err();
        assert!(matches!(err, EngineError::Encoding(_)));
        assert!(!wallet.contains_credential("id-card"));
    }

    #[test]
    fn test_disclose_single_attribute() {
        let mut wallet = HolderWallet::new();
        let (attrs, order) = attributes();
        let root = wallet.store_credential("id-card", attrs, order).unwrap();

        let disclosure = wallet.disclose("id-card", "dob").unwrap();
        assert_eq!(disclosure.leaf_index, 1);
        assert_eq!(disclosure.leaf, attribute_leaf(&json!("2000-01-01")).unwrap());
        assert!(verify_disclosure(&disclosure, &root).unwrap());

        let other = wallet.disclose("id-card", "nationality").unwrap();
        assert!(verify_disclosure(&other, &root).unwrap());
    }

    #[test]
    fn test_disclosure_rejected_against_other_root() {
        let mut wallet = HolderWallet::new();
        let (attrs, order) = attributes();
        wallet.store_credential("id-card", attrs, order).unwrap();
        let disclosure = wallet.disclose("id-card", "name").unwrap();
        assert!(!verify_disclosure(&disclosure, &FieldElement::from(7u64)).unwrap());
    }

    #[test]
    fn test_disclose_errors() {
        let mut wallet = HolderWallet::new();
        let (attrs, order) = attributes();
        wallet.store_credential("id-card", attrs, order).unwrap();

        let err = wallet.disclose("id-card", "email").unwrap_err();
        assert!(matches!(err, EngineError::MissingField(_)));
        let err = wallet.disclose("passport", "name").unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn test_remove_credential() {
        let mut wallet = HolderWallet::new();
        let (attrs, order) = attributes();
        wallet.store_credential("temporary-pass", attrs, order).unwrap();
        assert_eq!(wallet.count_credentials(), 1);

        assert!(wallet.remove_credential("temporary-pass"));
        assert!(!wallet.contains_credential("temporary-pass"));
        assert!(wallet.get_credential("temporary-pass").is_none());
        assert!(!wallet.remove_credential("temporary-pass"));
    }
}
