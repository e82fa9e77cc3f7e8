//! Authentication middleware — bearer extraction, token verification,
//! and shadow sync of the local user record.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use flowgate_core::models::auth::{Principal, ShadowProfile, TokenKind};
use flowgate_core::users::DEFAULT_ROLE;

use crate::AppState;
use crate::error::AppError;

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies
/// it as an access token, upserts the local shadow user from its
/// claims, and injects a [`Principal`] into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let claims = state
        .codec
        .verify(token, TokenKind::Access)
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;

    // Shadow sync. Authentication already succeeded on the signature
    // alone, so a store failure here is logged and swallowed.
    let profile = ShadowProfile {
        external_id: claims.sub.clone(),
        email: claims.email.clone(),
        name: claims.name.clone(),
        role: claims.role.clone(),
    };
    if let Err(e) = state.users.upsert_from_profile(&profile).await {
        warn!(user_id = %claims.sub, error = %e, "shadow user sync failed");
    }

    let principal = Principal {
        user_id: claims.sub,
        role: claims.role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        token: token.to_string(),
    };
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// 403 unless the request carries an authenticated principal holding
/// `role`. Must run inside [`require_auth`]; the 403 is distinct from
/// the 401 of a missing or invalid token.
pub fn require_role(request: &Request, role: &str) -> Result<(), AppError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .ok_or_else(|| AppError::Internal("role gate reached without principal".into()))?;
    if !principal.has_role(role) {
        return Err(AppError::Forbidden(format!("{role} role required")));
    }
    Ok(())
}

/// Axum middleware: requires an authenticated admin.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(&request, "admin")?;
    Ok(next.run(request).await)
}
