//! Gateway notification endpoint.
//!
//! The body is taken as raw bytes: the signature covers the exact payload,
//! so it must be verified before any parsing.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use engine::EngineError;

use crate::{ServerError, server::ServerState};

const SIGNATURE_HEADERS: [&str; 2] = ["x-paystack-signature", "x-signature"];

/// Acknowledge with `200` whenever retrying cannot help; only bad
/// signatures and transient failures are refused so the gateway retries.
pub async fn receive(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ServerError> {
    let signature = SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok());

    match state
        .engine
        .handle_gateway_notification(&body, signature)
        .await
    {
        Ok(_) => Ok(StatusCode::OK),
        Err(
            err @ (EngineError::Unauthorized(_)
            | EngineError::Database(_)
            | EngineError::Conflict(_)),
        ) => Err(err.into()),
        Err(err) => {
            tracing::warn!(error = %err, "gateway notification acknowledged without effect");
            Ok(StatusCode::OK)
        }
    }
}
