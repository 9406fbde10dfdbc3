//! Electricity purchase endpoints

use api_types::payment::{MeterVerify, MeterView, PurchaseNew, PurchaseResult};
use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::{PurchaseCmd, TransactionStatus};

use crate::{ServerError, server::ServerState, transactions::map_status, user};

pub async fn verify(
    _: Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<MeterVerify>,
) -> Result<Json<MeterView>, ServerError> {
    let info = state
        .engine
        .verify_meter(&payload.provider_id, &payload.meter_id)
        .await?;
    Ok(Json(MeterView {
        customer_name: info.customer_name,
        meter_type: info.meter_type,
        outstanding_debt: info.outstanding_debt,
    }))
}

/// Submit a purchase.
///
/// `200` when units were delivered, `202` while the biller has not
/// confirmed, `400` when it declined. The body always carries the
/// reference.
pub async fn purchase(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<PurchaseNew>,
) -> Result<(StatusCode, Json<PurchaseResult>), ServerError> {
    let mut cmd = PurchaseCmd::new(
        user.account_id,
        payload.provider_id,
        payload.meter_id,
        payload.amount_minor,
    );
    if let Some(key) = payload.idempotency_key {
        cmd = cmd.idempotency_key(key);
    }
    if let Some(phone) = payload.phone {
        cmd = cmd.phone(phone);
    }

    let outcome = state.engine.purchase(cmd).await?;
    let status = match outcome.status() {
        TransactionStatus::Success => StatusCode::OK,
        TransactionStatus::Pending => StatusCode::ACCEPTED,
        TransactionStatus::Failed => StatusCode::BAD_REQUEST,
    };
    Ok((
        status,
        Json(PurchaseResult {
            status: map_status(outcome.status()),
            message: outcome.message().to_string(),
            reference: outcome.transaction.reference.clone(),
            provider_token: outcome.transaction.token.clone(),
            replayed: outcome.replayed,
        }),
    ))
}
