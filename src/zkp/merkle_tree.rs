// src/zkp/merkle_tree.rs
//! Field-ordered Merkle tree over credential attributes.
//!
//! The tree is ephemeral: it is rebuilt on demand from the attributes and
//! never persisted. Only its root is anchored on the ledger.
//!
//! ## Odd layers
//! An unpaired last node at an odd-length layer is hashed with a copy of
//! itself (`hash2(x, x)`), never with zero padding. The proof for that node
//! uses the node itself as its sibling.

use crate::error::EngineError;
use crate::models::field::FieldElement;
use crate::zkp::field_encoder::encode_value;
use crate::zkp::poseidon::{hash1, hash2};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Sibling path for one leaf.
///
/// `path_indices[level]` is `0` when the running node is the left child at
/// that level and `1` when it is the right child.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof {
    pub path_elements: Vec<FieldElement>,
    pub path_indices: Vec<u8>,
}

/// Binary Poseidon Merkle tree.
///
/// `layers[0]` holds the leaves and the last layer holds exactly one element,
/// the root. `layers[i + 1][j] = hash2(layers[i][2j], layers[i][2j + 1])`,
/// with the left child duplicated when `2j + 1` is out of bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    layers: Vec<Vec<FieldElement>>,
}

impl MerkleTree {
    /// Builds a tree bottom-up from ordered leaf hashes.
    ///
    /// # Errors
    /// `EngineError::EmptyInput` if `leaves` is empty
    pub fn build(leaves: Vec<FieldElement>) -> Result<Self, EngineError> {
        if leaves.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let mut layers = vec![leaves];
        while let Some(current) = layers.last().filter(|layer| layer.len() > 1) {
            let next: Vec<FieldElement> = current
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    let right = pair.get(1).unwrap_or(left);
                    hash2(left, right)
                })
                .collect();
            layers.push(next);
        }

        Ok(MerkleTree { layers })
    }

    /// The tree root, `layers[last][0]`.
    pub fn root(&self) -> FieldElement {
        // `build` guarantees at least one layer with exactly one element on top.
        self.layers[self.layers.len() - 1][0]
    }

    /// Leaf hashes in field order.
    ///
    /// # Returns
    /// The bottom layer, `layers[0]`, as passed to [`MerkleTree::build`]
    pub fn leaves(&self) -> &[FieldElement] {
        &self.layers[0]
    }

    /// Number of leaves.
    ///
    /// # Returns
    /// Always at least 1; valid proof indices are `0..leaf_count()`
    pub fn leaf_count(&self) -> usize {
        self.layers[0].len()
    }

    /// Number of hashing levels, `ceil(log2(leaf_count))`.
    pub fn height(&self) -> usize {
        self.layers.len() - 1
    }

    /// Every layer from the leaves up to the root.
    ///
    /// # Returns
    /// `height() + 1` layers; the last one holds only the root
    pub fn layers(&self) -> &[Vec<FieldElement>] {
        &self.layers
    }

    /// Generates the sibling path for the leaf at `leaf_index`.
    ///
    /// At each level the sibling is the node at `index ^ 1`, or the node
    /// itself when that position does not exist.
    ///
    /// # Errors
    /// `EngineError::IndexOutOfRange` if `leaf_index >= leaf_count`
    pub fn generate_proof(&self, leaf_index: usize) -> Result<MerkleProof, EngineError> {
        if leaf_index >= self.leaf_count() {
            return Err(EngineError::IndexOutOfRange {
                index: leaf_index,
                leaf_count: self.leaf_count(),
            });
        }

        let mut path_elements = Vec::with_capacity(self.height());
        let mut path_indices = Vec::with_capacity(self.height());
        let mut index = leaf_index;

        for layer in &self.layers[..self.height()] {
            let sibling = layer.get(index ^ 1).unwrap_or(&layer[index]);
            path_elements.push(*sibling);
            path_indices.push((index & 1) as u8);
            index >>= 1;
        }

        Ok(MerkleProof {
            path_elements,
            path_indices,
        })
    }
}

/// Root, tree and leaves computed for one holder's attributes.
#[derive(Debug, Clone)]
pub struct CredentialRoot {
    pub root: FieldElement,
    pub tree: MerkleTree,
    pub leaves: Vec<FieldElement>,
}

/// Leaf hash for one attribute value: `hash1(encode(value))`.
pub fn attribute_leaf(value: &Value) -> Result<FieldElement, EngineError> {
    Ok(hash1(&encode_value(value)?))
}

/// Computes the credential root over `attributes` in `field_order`.
///
/// The field order is part of the credential's identity: the same values in
/// a different order produce an unrelated root. Attributes not named in
/// `field_order` are ignored.
///
/// # Errors
/// - `EngineError::MissingField` if a named field is absent
/// - `EngineError::Encoding` if a value cannot be encoded
/// - `EngineError::EmptyInput` if `field_order` is empty
pub fn compute_credential_root(
    attributes: &BTreeMap<String, Value>,
    field_order: &[String],
) -> Result<CredentialRoot, EngineError> {
    let leaves = field_order
        .iter()
        .map(|name| {
            let value = attributes
                .get(name)
                .ok_or_else(|| EngineError::MissingField(name.clone()))?;
            attribute_leaf(value)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let tree = MerkleTree::build(leaves.clone())?;
    Ok(CredentialRoot {
        root: tree.root(),
        tree,
        leaves,
    })
}
