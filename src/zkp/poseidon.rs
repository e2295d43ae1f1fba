// src/zkp/poseidon.rs
//! Poseidon hashing over the BN254 scalar field.
//!
//! Provides the one- and two-input hashes used for credential leaves and
//! Merkle tree nodes. The permutation itself comes from
//! `ark-crypto-primitives`; this module only fixes its parameters.

use ark_bn254::Fr as Bn254Fr;
use ark_crypto_primitives::sponge::poseidon::{
    find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge,
};
use ark_crypto_primitives::sponge::CryptographicSponge;
use ark_ff::PrimeField;
use once_cell::sync::Lazy;

use crate::models::field::FieldElement;

const FULL_ROUNDS: usize = 8;
const PARTIAL_ROUNDS: usize = 57;
const ALPHA: u64 = 5;
const RATE: usize = 2;
const CAPACITY: usize = 1;

/// Process-wide Poseidon configuration for BN254.
///
/// Derived once with the Grain LFSR, so every replica computes identical
/// round constants and MDS matrix without shipping them on disk.
///
/// ## Parameters
/// - Full rounds: 8
/// - Partial rounds: 57
/// - Alpha (S-box): 5
/// - Rate: 2
/// - Capacity: 1
static POSEIDON_CONFIG: Lazy<PoseidonConfig<Bn254Fr>> = Lazy::new(generate_poseidon_config);

/// Derives the Poseidon parameters for BN254.
pub fn generate_poseidon_config() -> PoseidonConfig<Bn254Fr> {
    let (ark, mds) = find_poseidon_ark_and_mds::<Bn254Fr>(
        Bn254Fr::MODULUS_BIT_SIZE as u64,
        RATE,
        FULL_ROUNDS as u64,
        PARTIAL_ROUNDS as u64,
        0,
    );
    PoseidonConfig::new(FULL_ROUNDS, PARTIAL_ROUNDS, ALPHA, mds, ark, RATE, CAPACITY)
}

/// Retrieves the global Poseidon configuration.
pub fn poseidon_config() -> &'static PoseidonConfig<Bn254Fr> {
    &POSEIDON_CONFIG
}

fn sponge_hash(inputs: &[Bn254Fr]) -> FieldElement {
    let mut sponge = PoseidonSponge::<Bn254Fr>::new(poseidon_config());
    sponge.absorb(&inputs.to_vec());
    let squeezed = sponge.squeeze_field_elements::<Bn254Fr>(1);
    FieldElement::new(squeezed[0])
}

/// Hashes a single field element (used for credential leaves).
pub fn hash1(value: &FieldElement) -> FieldElement {
    sponge_hash(&[value.inner()])
}

/// Hashes an ordered pair of field elements (used for tree nodes).
///
/// Not commutative: `hash2(a, b) != hash2(b, a)` for `a != b`.
pub fn hash2(left: &FieldElement, right: &FieldElement) -> FieldElement {
    sponge_hash(&[left.inner(), right.inner()])
}
