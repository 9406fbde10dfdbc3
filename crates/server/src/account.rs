//! Account API endpoint

use api_types::account::AccountView;
use axum::{Extension, Json, extract::State};

use crate::{ServerError, server::ServerState, user};

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<AccountView>, ServerError> {
    let account = state.engine.account(&user.account_id).await?;
    Ok(Json(AccountView {
        available_minor: account.available_minor(),
        id: account.id,
        email: account.email,
        balance_minor: account.balance_minor,
        held_minor: account.held_minor,
    }))
}
