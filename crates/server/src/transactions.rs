//! Transactions API endpoints

use api_types::transaction::{
    TransactionKind as ApiKind, TransactionList, TransactionListResponse,
    TransactionStatus as ApiStatus, TransactionView,
};
use axum::{
    Extension, Json,
    extract::{Query, State},
};

use crate::{ServerError, server::ServerState, user};

pub(crate) fn map_kind(kind: engine::TransactionKind) -> ApiKind {
    match kind {
        engine::TransactionKind::Topup => ApiKind::Topup,
        engine::TransactionKind::Purchase => ApiKind::Purchase,
    }
}

pub(crate) fn map_status(status: engine::TransactionStatus) -> ApiStatus {
    match status {
        engine::TransactionStatus::Pending => ApiStatus::Pending,
        engine::TransactionStatus::Success => ApiStatus::Success,
        engine::TransactionStatus::Failed => ApiStatus::Failed,
    }
}

fn view(tx: engine::Transaction) -> TransactionView {
    TransactionView {
        id: tx.id,
        kind: map_kind(tx.kind),
        status: map_status(tx.status),
        amount_minor: tx.amount_minor,
        reference: tx.reference,
        provider_id: tx.provider_id,
        meter_id: tx.meter_id,
        token: tx.token,
        created_at: tx.created_at,
        finalized_at: tx.finalized_at,
    }
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Query(query): Query<TransactionList>,
) -> Result<Json<TransactionListResponse>, ServerError> {
    let limit = query.limit.unwrap_or(50);
    let txs = state.engine.transactions(&user.account_id, limit).await?;

    Ok(Json(TransactionListResponse {
        transactions: txs.into_iter().map(view).collect(),
    }))
}
