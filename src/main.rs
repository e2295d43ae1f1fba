// src/main.rs

//! # Credential Anchor - Main Entry Point
//!
//! Initializes the ledger, the Groth16 verifier and the contract handler,
//! then starts the API server.
//!
//! ## Configuration
//! - `.env` is loaded first if present
//! - `config/default.{toml,json,yaml}` (optional)
//! - `ANCHOR__SERVER__HOST`, `ANCHOR__SERVER__PORT`
//! - `ANCHOR__VERIFICATION__KEY_PATH`: snarkjs verification key (default: verification_key.json)
//! - `RUST_LOG`: log level filter

use anyhow::Context;
use credential_anchor::ledger::memory::MemoryLedger;
use credential_anchor::services::api_server::ApiServer;
use credential_anchor::services::contract::CredentialHandler;
use credential_anchor::settings::Settings;
use credential_anchor::zkp::proof_verification::Groth16Verifier;
use dotenv::dotenv;
use log::{info, warn};
use std::sync::Arc;

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load environment and settings
/// 2. Load the verification key once (a missing key leaves verification
///    disabled but keeps issuance and queries working)
/// 3. Create the ledger and contract handler
/// 4. Start API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings = Settings::load().context("failed to read settings")?;
    let addr = settings.bind_addr()?;

    let verifier = Groth16Verifier::load(&settings.verification.key_path);
    if !verifier.is_available() {
        warn!(
            "Proof verification disabled: no usable key at {}",
            settings.verification.key_path
        );
    }

    let ledger = Arc::new(MemoryLedger::new());
    let handler = CredentialHandler::new(Arc::new(verifier));
    let api_server = Arc::new(ApiServer::new(ledger, handler));

    info!("Available endpoints:");
    info!("- POST /credentials");
    info!("- POST /credentials/root");
    info!("- GET  /credentials/:holder_id");
    info!("- POST /credentials/:holder_id/revoke");
    info!("- POST /verify-proof");
    info!("- POST /verify-age");
    info!("- GET  /verifications");
    info!("- GET  /age-verifications");

    api_server.run(addr).await.context("API server failed")?;
    Ok(())
}
