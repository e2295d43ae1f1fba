// src/ledger/mod.rs
//! Host ledger abstraction and its in-process implementation.

pub mod host;
pub mod memory;
