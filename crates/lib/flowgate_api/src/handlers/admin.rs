//! Admin request handlers.

use axum::Json;
use axum::extract::{Path, State};

use crate::AppState;
use crate::dto::RevokeResponse;
use crate::error::AppResult;

/// `POST /admin/users/{external_id}/revoke-tokens` — revoke every
/// refresh token of a user. Admin only.
pub async fn revoke_user_tokens_handler(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> AppResult<Json<RevokeResponse>> {
    let revoked = state.tokens.revoke_all(&external_id).await?;
    Ok(Json(RevokeResponse {
        success: true,
        revoked,
    }))
}
