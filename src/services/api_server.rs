// src/services/api_server.rs
//! REST front end for the credential anchor.
//!
//! Every mutating route runs one ledger transaction through the operation
//! table; read-only routes evaluate without committing. Routes:
//! - `POST /credentials`, `GET /credentials/:holder_id`
//! - `POST /credentials/:holder_id/revoke`
//! - `POST /credentials/root` (off-ledger helper for issuers)
//! - `POST /verify-proof`, `POST /verify-age`
//! - `GET /verifications`, `GET /age-verifications`

use crate::error::{EngineError, ErrorKind};
use crate::ledger::memory::MemoryLedger;
use crate::services::contract::{CredentialHandler, OperationTable};
use crate::zkp::merkle_tree::compute_credential_root;
use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task;

/// Request payload for anchoring a credential
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueCredentialRequest {
    holder_id: String,
    credential_hash: String,
    issuer: String,
}

/// Request payload for revoking a credential
#[derive(Serialize, Deserialize)]
struct RevokeCredentialRequest {
    reason: String,
}

/// Request payload for computing a credential root off-ledger
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRootRequest {
    attributes: BTreeMap<String, Value>,
    field_order: Vec<String>,
}

/// Request payload for a generic proof verification.
///
/// `proof` and `publicSignals` are taken either as the snarkjs JSON values
/// themselves or as strings holding that JSON.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyProofRequest {
    holder_id: String,
    proof: Value,
    public_signals: Value,
    root_hash: String,
}

/// Request payload for an age-predicate verification
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyAgeRequest {
    holder_id: String,
    proof: Value,
    public_signals: Value,
    minimum_age: Value,
    signal_version: String,
    #[serde(default)]
    root_hash: Option<String>,
}

/// Errors returned by the API, rendered as `{error, message}`.
#[derive(Debug)]
pub enum ApiError {
    /// Engine error; the status is chosen by its kind
    Engine(EngineError),
    /// Failure of the server itself, such as a panicked worker task
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Engine(EngineError::MalformedPayload(rejection.body_text()))
    }
}

/// Maps an error kind to its HTTP status.
///
/// # Arguments
/// * `kind` - Classification of the engine error
///
/// # Returns
/// 400 for malformed input, 404, 409, 422 for verification rejections,
/// 503 when no verification key is loaded
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationError
        | ErrorKind::EncodingError
        | ErrorKind::EmptyInputError
        | ErrorKind::IndexOutOfRangeError
        | ErrorKind::MalformedProofError
        | ErrorKind::MissingFieldError
        | ErrorKind::MalformedPayloadError => StatusCode::BAD_REQUEST,
        ErrorKind::NotFoundError => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExistsError => StatusCode::CONFLICT,
        ErrorKind::RevokedCredentialError
        | ErrorKind::ProofInvalidError
        | ErrorKind::SignalMismatchError
        | ErrorKind::RootMismatchError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::KeyUnavailableError => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::SerializationError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Engine(err) => {
                let kind = err.kind();
                (
                    status_for(kind),
                    json!({ "error": kind, "message": err.to_string() }),
                )
            }
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "InternalError", "message": message }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

/// Unwraps a JSON body, turning extractor rejections into `MalformedPayload`.
fn extract_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(ApiError::from)
}

/// Text form of a JSON-valued argument: strings pass through unchanged,
/// anything else is serialized.
fn json_argument(value: Value) -> Result<String, ApiError> {
    match value {
        Value::String(text) => Ok(text),
        other => Ok(serde_json::to_string(&other).map_err(EngineError::from)?),
    }
}

/// Text form of a numeric argument given as a JSON number or string.
fn scalar_argument(value: Value) -> Result<String, ApiError> {
    match value {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(EngineError::MalformedPayload(format!("expected a number, got {}", other)).into()),
    }
}

/// Runs blocking engine work on the blocking thread pool.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    match task::spawn_blocking(work).await {
        Ok(result) => Ok(result?),
        Err(join_err) => {
            error!("Engine task failed: {}", join_err);
            Err(ApiError::Internal(format!("engine task failed: {}", join_err)))
        }
    }
}

/// API server state shared by all handlers
pub struct ApiServer {
    /// Ledger holding credentials and audit records
    ledger: Arc<MemoryLedger>,

    /// Stateless contract implementation
    handler: CredentialHandler,

    /// Name-to-operation routing
    operations: OperationTable,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `ledger` - Shared ledger
    /// * `handler` - Contract handler carrying the ZK verifier
    pub fn new(ledger: Arc<MemoryLedger>, handler: CredentialHandler) -> Self {
        ApiServer {
            ledger,
            handler,
            operations: OperationTable::new(),
        }
    }

    /// Builds the router with all routes bound to this server.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/credentials", post(Self::issue_credential_handler))
            .route("/credentials/root", post(Self::credential_root_handler))
            .route("/credentials/:holder_id", get(Self::get_credential_handler))
            .route(
                "/credentials/:holder_id/revoke",
                post(Self::revoke_credential_handler),
            )
            .route("/verify-proof", post(Self::verify_proof_handler))
            .route("/verify-age", post(Self::verify_age_handler))
            .route("/verifications", get(Self::verifications_handler))
            .route("/age-verifications", get(Self::age_verifications_handler))
            .with_state(self)
    }

    /// Starts the API server and serves until the listener fails
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(self: Arc<Self>, addr: SocketAddr) -> std::io::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server listening on http://{}", addr);
        axum::serve(listener, app).await
    }

    /// Runs `name` in a committed transaction off the async runtime.
    async fn submit(self: Arc<Self>, name: &'static str, args: Vec<String>) -> ApiResult {
        debug!("Submitting {}", name);
        let json = run_blocking(move || {
            self.ledger
                .submit(|host| self.operations.invoke(&self.handler, name, host, &args))
        })
        .await?;
        Ok(Json(serde_json::from_str(&json).map_err(EngineError::from)?))
    }

    /// Runs `name` against committed state without committing.
    async fn evaluate(self: Arc<Self>, name: &'static str, args: Vec<String>) -> ApiResult {
        let json = run_blocking(move || {
            self.ledger
                .evaluate(|host| self.operations.invoke(&self.handler, name, host, &args))
        })
        .await?;
        Ok(Json(serde_json::from_str(&json).map_err(EngineError::from)?))
    }

    // =====================
    // Credential Handlers
    // =====================

    /// POST /credentials
    async fn issue_credential_handler(
        State(state): State<Arc<ApiServer>>,
        body: Result<Json<IssueCredentialRequest>, JsonRejection>,
    ) -> ApiResult {
        let payload = extract_json(body)?;
        state
            .submit(
                "IssueCredential",
                vec![payload.holder_id, payload.credential_hash, payload.issuer],
            )
            .await
    }

    /// GET /credentials/:holder_id
    async fn get_credential_handler(
        State(state): State<Arc<ApiServer>>,
        Path(holder_id): Path<String>,
    ) -> ApiResult {
        state.evaluate("GetCredential", vec![holder_id]).await
    }

    /// POST /credentials/:holder_id/revoke
    async fn revoke_credential_handler(
        State(state): State<Arc<ApiServer>>,
        Path(holder_id): Path<String>,
        body: Result<Json<RevokeCredentialRequest>, JsonRejection>,
    ) -> ApiResult {
        let payload = extract_json(body)?;
        state
            .submit("RevokeCredential", vec![holder_id, payload.reason])
            .await
    }

    /// POST /credentials/root
    ///
    /// Computes the root an issuer would anchor for the given attributes.
    /// Touches no ledger state.
    async fn credential_root_handler(
        body: Result<Json<CredentialRootRequest>, JsonRejection>,
    ) -> ApiResult {
        let payload = extract_json(body)?;
        let computed = run_blocking(move || {
            compute_credential_root(&payload.attributes, &payload.field_order)
        })
        .await?;
        Ok(Json(json!({
            "root": computed.root,
            "leaves": computed.leaves,
        })))
    }

    // =====================
    // Verification Handlers
    // =====================

    /// POST /verify-proof
    async fn verify_proof_handler(
        State(state): State<Arc<ApiServer>>,
        body: Result<Json<VerifyProofRequest>, JsonRejection>,
    ) -> ApiResult {
        let payload = extract_json(body)?;
        let args = vec![
            payload.holder_id,
            json_argument(payload.proof)?,
            json_argument(payload.public_signals)?,
            payload.root_hash,
        ];
        state.submit("VerifyProof", args).await
    }

    /// POST /verify-age
    async fn verify_age_handler(
        State(state): State<Arc<ApiServer>>,
        body: Result<Json<VerifyAgeRequest>, JsonRejection>,
    ) -> ApiResult {
        let payload = extract_json(body)?;
        let mut args = vec![
            payload.holder_id,
            json_argument(payload.proof)?,
            json_argument(payload.public_signals)?,
            scalar_argument(payload.minimum_age)?,
            payload.signal_version,
        ];
        args.extend(payload.root_hash);
        state.submit("VerifyAge", args).await
    }

    /// GET /verifications
    async fn verifications_handler(State(state): State<Arc<ApiServer>>) -> ApiResult {
        state.evaluate("QueryVerifications", Vec::new()).await
    }

    /// GET /age-verifications
    async fn age_verifications_handler(State(state): State<Arc<ApiServer>>) -> ApiResult {
        state.evaluate("QueryAgeVerifications", Vec::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::MalformedPayloadError), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFoundError), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::AlreadyExistsError), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::RootMismatchError),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(ErrorKind::KeyUnavailableError),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_json_arguments_accept_values_and_strings() {
        assert_eq!(json_argument(json!(["1", 2])).unwrap(), r#"["1",2]"#);
        assert_eq!(json_argument(json!("[\"1\"]")).unwrap(), r#"["1"]"#);
        assert_eq!(scalar_argument(json!(18)).unwrap(), "18");
        assert_eq!(scalar_argument(json!("0x12")).unwrap(), "0x12");
        assert!(scalar_argument(json!([18])).is_err());
    }

    #[tokio::test]
    async fn test_blocking_work_runs_off_the_runtime() {
        let value = run_blocking(|| Ok::<_, EngineError>(7)).await.ok();
        assert_eq!(value, Some(7));

        let err = run_blocking(|| Err::<u8, _>(EngineError::EmptyInput)).await;
        assert!(matches!(err, Err(ApiError::Engine(EngineError::EmptyInput))));

        let panicked = run_blocking(|| -> Result<u8, EngineError> { panic!("worker died") }).await;
        assert!(matches!(panicked, Err(ApiError::Internal(_))));
    }
}
