//! Request and response bodies for the HTTP surface.

use serde::{Deserialize, Serialize};

use flowgate_core::models::auth::User;
use flowgate_core::models::chat::Upload;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RevokeRequest {
    pub token_id: Option<String>,
    #[serde(default)]
    pub all_tokens: bool,
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub success: bool,
    pub revoked: u64,
}

/// User fields exposed to clients.
#[derive(Debug, Serialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: String,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.external_id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: AuthUser,
}

#[derive(Debug, Deserialize)]
pub struct PredictionBody {
    pub question: String,
    #[serde(alias = "flowId")]
    pub flow_id: String,
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
    #[serde(rename = "overrideConfig")]
    pub override_config: Option<serde_json::Value>,
    #[serde(default)]
    pub uploads: Vec<Upload>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
