// src/wallet/mod.rs
//! Holder-side state kept off the ledger.

pub mod credential_storage;
