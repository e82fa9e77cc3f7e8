//! Identity provider client.
//!
//! The provider owns credentials and user records; the gateway only
//! delegates logins and reads profiles to shadow-sync locally.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Identity provider errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("Identity provider protocol error: {0}")]
    Protocol(String),
}

/// A user as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// External identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticate a username/password pair.
    async fn login(&self, username: &str, password: &str) -> Result<IdentityUser, IdentityError>;

    /// Look up a user by subject id. `None` when the provider does not
    /// know the id.
    async fn get_user(&self, external_id: &str) -> Result<Option<IdentityUser>, IdentityError>;
}

/// HTTP identity provider client.
pub struct HttpIdentityProvider {
    base_url: Url,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

impl HttpIdentityProvider {
    pub fn new(base_url: Url, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityError> {
        self.base_url
            .join(path)
            .map_err(|e| IdentityError::Protocol(format!("bad endpoint {path}: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn login(&self, username: &str, password: &str) -> Result<IdentityUser, IdentityError> {
        let response = self
            .client
            .post(self.endpoint("auth/login")?)
            .json(&LoginBody { username, password })
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(IdentityError::InvalidCredentials)
            }
            status if status.is_success() => response
                .json::<IdentityUser>()
                .await
                .map_err(|e| IdentityError::Protocol(format!("login response: {e}"))),
            status => Err(IdentityError::Unavailable(format!(
                "login returned status {status}"
            ))),
        }
    }

    async fn get_user(&self, external_id: &str) -> Result<Option<IdentityUser>, IdentityError> {
        let response = self
            .client
            .get(self.endpoint(&format!("users/{external_id}"))?)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<IdentityUser>()
                .await
                .map(Some)
                .map_err(|e| IdentityError::Protocol(format!("user response: {e}"))),
            status => Err(IdentityError::Unavailable(format!(
                "user lookup returned status {status}"
            ))),
        }
    }
}
