// src/zkp/merkle_verifier.rs
//! Merkle sibling-path verification.
//!
//! Pure function of its inputs; safe to call from any number of threads.

use crate::error::EngineError;
use crate::models::field::FieldElement;
use crate::zkp::merkle_tree::MerkleProof;
use crate::zkp::poseidon::hash2;

/// Recomputes the root from `leaf` and `proof`.
///
/// # Errors
/// - `EngineError::MalformedProof` if the path arrays differ in length
/// - `EngineError::Validation` if a path index is neither 0 nor 1
pub fn compute_root(leaf: &FieldElement, proof: &MerkleProof) -> Result<FieldElement, EngineError> {
    if proof.path_elements.len() != proof.path_indices.len() {
        return Err(EngineError::MalformedProof {
            elements: proof.path_elements.len(),
            indices: proof.path_indices.len(),
        });
    }

    let mut running = *leaf;
    for (sibling, index) in proof.path_elements.iter().zip(proof.path_indices.iter()) {
        // Determine hash order based on path index
        running = match index {
            0 => hash2(&running, sibling),
            1 => hash2(sibling, &running),
            other => {
                return Err(EngineError::Validation(format!(
                    "path index must be 0 or 1, got {}",
                    other
                )))
            }
        };
    }
    Ok(running)
}

/// Verifies that `proof` links `leaf` to `expected_root`.
///
/// # Returns
/// - `Ok(true)` if the recomputed root equals `expected_root`
/// - `Ok(false)` otherwise
pub fn verify(
    leaf: &FieldElement,
    proof: &MerkleProof,
    expected_root: &FieldElement,
) -> Result<bool, EngineError> {
    Ok(compute_root(leaf, proof)? == *expected_root)
}
