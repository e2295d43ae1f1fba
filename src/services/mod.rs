// src/services/mod.rs
//! Contract operations, the verification orchestrator and the REST front end.

pub mod api_server;
pub mod contract;
pub mod verifier;
