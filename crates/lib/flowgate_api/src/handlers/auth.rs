//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, header};

use flowgate_core::models::auth::{ClientInfo, ShadowProfile};

use crate::AppState;
use crate::dto::{
    AuthUser, LoginRequest, RefreshRequest, RevokeRequest, RevokeResponse, TokenResponse,
};
use crate::error::{AppError, AppResult};

/// Client metadata recorded on issued refresh tokens.
fn client_info(headers: &HeaderMap) -> ClientInfo {
    ClientInfo {
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ip: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|s| s.trim().to_string()),
    }
}

/// `POST /auth/login` — delegate credentials to the identity provider,
/// shadow-sync the user, and issue a token pair.
pub async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let identity = state.identity.login(&body.username, &body.password).await?;
    if !identity.active {
        return Err(AppError::Unauthorized("Account disabled".into()));
    }

    let user = state
        .users
        .upsert_from_profile(&ShadowProfile {
            external_id: identity.id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: Some(identity.role.clone()),
        })
        .await?;

    let pair = state.tokens.login(&user, &client_info(&headers)).await?;
    Ok(Json(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "Bearer".into(),
        expires_in: pair.expires_in,
        user: AuthUser::from(&user),
    }))
}

/// `POST /auth/refresh` — exchange a refresh token for a new pair.
/// Single-use: the presented token is dead afterwards either way.
pub async fn refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = state
        .tokens
        .refresh(&body.refresh_token, &client_info(&headers))
        .await?;

    // The subject was re-checked during rotation; read it back for the
    // response body.
    let claims = state
        .codec
        .verify(&pair.access_token, flowgate_core::models::auth::TokenKind::Access)
        .ok_or_else(|| AppError::Internal("issued token failed verification".into()))?;
    let user = state
        .users
        .find_by_external_id(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Internal("rotated token for unknown user".into()))?;

    Ok(Json(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "Bearer".into(),
        expires_in: pair.expires_in,
        user: AuthUser::from(&user),
    }))
}

/// `POST /auth/revoke` — revoke refresh tokens. With no body (or
/// `all_tokens`), revokes the whole family implied by the caller's
/// access token; with `token_id`, revokes that record. Admins may
/// revoke records they do not own.
pub async fn revoke_handler(
    State(state): State<AppState>,
    axum::Extension(principal): axum::Extension<flowgate_core::models::auth::Principal>,
    body: Option<Json<RevokeRequest>>,
) -> AppResult<Json<RevokeResponse>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let revoked = match (&body.token_id, body.all_tokens) {
        (Some(token_id), false) => {
            let revoked = if principal.is_admin() {
                state.tokens.revoke(token_id).await?
            } else {
                state.tokens.revoke_owned(token_id, &principal.user_id).await?
            };
            u64::from(revoked)
        }
        _ => state.tokens.revoke_all(&principal.user_id).await?,
    };

    Ok(Json(RevokeResponse {
        success: true,
        revoked,
    }))
}
