// src/zkp/mod.rs
//! Cryptographic core: field encoding, Poseidon hashing, the credential
//! Merkle tree and the Groth16 verifier adapter.

pub mod field_encoder;
pub mod merkle_tree;
pub mod merkle_verifier;
pub mod poseidon;
pub mod proof_verification;
pub mod signals;
