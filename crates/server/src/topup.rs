//! Wallet funding endpoint

use api_types::topup::{TopupCheckout, TopupNew};
use axum::{Extension, Json, extract::State};

use crate::{ServerError, server::ServerState, user};

pub async fn initiate(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<TopupNew>,
) -> Result<Json<TopupCheckout>, ServerError> {
    let init = state
        .engine
        .initiate_topup(&user.account_id, payload.amount_minor)
        .await?;
    Ok(Json(TopupCheckout {
        reference: init.reference,
        authorization_url: init.authorization_url,
    }))
}
