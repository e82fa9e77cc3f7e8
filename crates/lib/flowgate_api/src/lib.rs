//! # flowgate_api
//!
//! HTTP API library for Flowgate.

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use flowgate_core::auth::codec::TokenCodec;
use flowgate_core::auth::service::TokenService;
use flowgate_core::clients::engine::UpstreamEngine;
use flowgate_core::clients::identity::IdentityProvider;
use flowgate_core::credits::CreditGate;
use flowgate_core::relay::StreamRelay;
use flowgate_core::users::UserStore;

use crate::config::ApiConfig;

/// Shared application state passed to all handlers. Every collaborator
/// is an injected trait object; there are no ambient singletons.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub codec: TokenCodec,
    pub tokens: Arc<TokenService>,
    pub users: Arc<dyn UserStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub credits: Arc<CreditGate>,
    pub engine: Arc<dyn UpstreamEngine>,
    pub relay: Arc<StreamRelay>,
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/healthz", get(handlers::health::healthz_handler))
        .route("/auth/login", post(handlers::auth::login_handler))
        .route("/auth/refresh", post(handlers::auth::refresh_handler));

    // Protected routes (require a valid access token)
    let protected = Router::new()
        .route("/auth/revoke", post(handlers::auth::revoke_handler))
        .route("/chat/predict", post(handlers::chat::predict_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    // Admin routes (role gate inside the auth gate)
    let admin = Router::new()
        .route(
            "/admin/users/{external_id}/revoke-tokens",
            post(handlers::admin::revoke_user_tokens_handler),
        )
        .layer(axum::middleware::from_fn(middleware::auth::require_admin))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(admin)
        .layer(cors)
        .with_state(state)
}
