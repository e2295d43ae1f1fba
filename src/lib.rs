// src/lib.rs
//! # Credential Anchor
//!
//! Anchors Merkle roots of holder credentials on a permissioned ledger and
//! verifies zero-knowledge proofs of attribute predicates against them.
//!
//! ## Layers
//! 1. **Cryptography**: field encoding, Poseidon, Merkle tree, Groth16 adapter (`zkp`)
//! 2. **Ledger**: host transaction interface and an in-memory MVCC ledger (`ledger`)
//! 3. **Contracts**: credential registry and verification audit log (`contracts`)
//! 4. **Services**: operation table, verification orchestrator, REST API (`services`)
//! 5. **Wallet**: holder-side attribute storage and disclosures (`wallet`)

pub mod contracts;
pub mod error;
pub mod ledger;
pub mod models;
pub mod services;
pub mod settings;
pub mod wallet;
pub mod zkp;

pub use error::{EngineError, ErrorKind};
