// src/contracts/mod.rs
//! Ledger-resident state owned by the engine.

pub mod credential_registry;
pub mod verification_log;
