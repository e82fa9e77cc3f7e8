//! Shared test fixtures: in-memory stores, scripted collaborators, and
//! request helpers for driving the router with `tower::ServiceExt`.
#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use tower::ServiceExt;

use flowgate_api::config::{ApiConfig, ValidationMode};
use flowgate_api::{AppState, router};
use flowgate_core::auth::codec::TokenCodec;
use flowgate_core::auth::service::TokenService;
use flowgate_core::auth::store::MemoryRefreshTokenStore;
use flowgate_core::clients::engine::{EngineChunk, EngineError, EngineStream, UpstreamEngine};
use flowgate_core::clients::identity::{IdentityError, IdentityProvider, IdentityUser};
use flowgate_core::clients::ledger::{CreditLedger, LedgerError};
use flowgate_core::credits::{CreditGate, OperationCosts};
use flowgate_core::history::MemoryMessageStore;
use flowgate_core::models::billing::TransactionRecord;
use flowgate_core::models::chat::PredictionRequest;
use flowgate_core::models::auth::{ShadowProfile, User};
use flowgate_core::relay::StreamRelay;
use flowgate_core::users::{MemoryUserStore, UserError, UserStore};

/// Identity provider with a fixed user table.
pub struct ScriptedIdentity {
    users: Vec<(IdentityUser, String)>,
}

impl ScriptedIdentity {
    pub fn with_default_users() -> Self {
        Self {
            users: vec![
                (
                    IdentityUser {
                        id: "user-alice".into(),
                        username: "alice".into(),
                        email: Some("alice@example.com".into()),
                        name: Some("Alice".into()),
                        role: "enduser".into(),
                        active: true,
                    },
                    "wonderland".into(),
                ),
                (
                    IdentityUser {
                        id: "user-root".into(),
                        username: "root".into(),
                        email: Some("root@example.com".into()),
                        name: Some("Root".into()),
                        role: "admin".into(),
                        active: true,
                    },
                    "toor".into(),
                ),
            ],
        }
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentity {
    async fn login(&self, username: &str, password: &str) -> Result<IdentityUser, IdentityError> {
        self.users
            .iter()
            .find(|(user, pw)| user.username == username && pw == password)
            .map(|(user, _)| user.clone())
            .ok_or(IdentityError::InvalidCredentials)
    }

    async fn get_user(&self, external_id: &str) -> Result<Option<IdentityUser>, IdentityError> {
        Ok(self
            .users
            .iter()
            .find(|(user, _)| user.id == external_id)
            .map(|(user, _)| user.clone()))
    }
}

/// Ledger with an atomic balance and full call accounting.
pub struct ScriptedLedger {
    pub balance: AtomicI64,
    pub deducts: AtomicU64,
    pub transactions: Mutex<Vec<TransactionRecord>>,
}

impl ScriptedLedger {
    pub fn with_balance(balance: i64) -> Self {
        Self {
            balance: AtomicI64::new(balance),
            deducts: AtomicU64::new(0),
            transactions: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CreditLedger for ScriptedLedger {
    async fn get_balance(&self, _token: &str) -> Result<i64, LedgerError> {
        Ok(self.balance.load(Ordering::SeqCst))
    }

    async fn deduct(&self, _token: &str, amount: i64, _reason: &str) -> Result<(), LedgerError> {
        self.deducts.fetch_add(1, Ordering::SeqCst);
        self.balance.fetch_sub(amount, Ordering::SeqCst);
        Ok(())
    }

    async fn log_transaction(&self, record: &TransactionRecord) -> Result<(), LedgerError> {
        self.transactions.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Engine that plays back a scripted chunk sequence once.
pub struct ScriptedEngine {
    chunks: Mutex<Option<Vec<Result<EngineChunk, EngineError>>>>,
    pub stream_calls: AtomicU64,
    known_flows: Vec<String>,
}

impl ScriptedEngine {
    pub fn with_chunks(chunks: Vec<Result<EngineChunk, EngineError>>) -> Self {
        Self {
            chunks: Mutex::new(Some(chunks)),
            stream_calls: AtomicU64::new(0),
            known_flows: vec!["flow-1".into()],
        }
    }
}

#[async_trait]
impl UpstreamEngine for ScriptedEngine {
    async fn stream_prediction(
        &self,
        _req: &PredictionRequest,
    ) -> Result<EngineStream, EngineError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        match self.chunks.lock().unwrap().take() {
            Some(chunks) => Ok(Box::pin(futures_util::stream::iter(chunks))),
            None => Err(EngineError::Unavailable("no scripted chunks".into())),
        }
    }

    async fn direct_prediction(
        &self,
        _req: &PredictionRequest,
    ) -> Result<serde_json::Value, EngineError> {
        Err(EngineError::Unavailable("direct transport not scripted".into()))
    }

    async fn flow_exists(&self, flow_id: &str) -> Result<bool, EngineError> {
        Ok(self.known_flows.iter().any(|f| f == flow_id))
    }
}

/// A raw SSE `data:` frame carrying a token event.
pub fn token_frame(data: &str) -> Result<EngineChunk, EngineError> {
    Ok(EngineChunk::Raw(format!(
        r#"{{"event":"token","data":"{data}"}}"#
    )))
}

/// User store whose writes always fail. Drives the swallowed
/// shadow-sync path in the auth middleware.
pub struct FailingUserStore;

#[async_trait]
impl UserStore for FailingUserStore {
    async fn upsert_from_profile(&self, _profile: &ShadowProfile) -> Result<User, UserError> {
        Err(UserError::Internal("user store offline".into()))
    }

    async fn find_by_external_id(&self, _external_id: &str) -> Result<Option<User>, UserError> {
        Err(UserError::Internal("user store offline".into()))
    }
}

/// A fully wired router over memory stores and scripted collaborators,
/// with handles kept for assertions.
pub struct TestHarness {
    pub app: Router,
    pub ledger: Arc<ScriptedLedger>,
    pub engine: Arc<ScriptedEngine>,
    pub history: Arc<MemoryMessageStore>,
    pub users: Arc<MemoryUserStore>,
}

pub fn harness(balance: i64, chunks: Vec<Result<EngineChunk, EngineError>>) -> TestHarness {
    let users = Arc::new(MemoryUserStore::new());
    let (app, ledger, engine, history) = wire(balance, chunks, users.clone());
    TestHarness {
        app,
        ledger,
        engine,
        history,
        users,
    }
}

/// Like [`harness`], but every shadow-sync write fails.
pub fn harness_with_failing_sync(
    balance: i64,
    chunks: Vec<Result<EngineChunk, EngineError>>,
) -> Router {
    wire(balance, chunks, Arc::new(FailingUserStore)).0
}

/// Access token minted directly against the harness codec, bypassing
/// the login flow.
pub fn mint_access_token(external_id: &str, role: &str) -> String {
    use chrono::Utc;
    let codec = TokenCodec::new(
        "test-access-secret",
        "test-refresh-secret",
        "flowgate",
        "flowgate-clients",
    );
    let user = User {
        id: flowgate_core::id::uuidv7(),
        external_id: external_id.into(),
        email: None,
        name: None,
        role: role.into(),
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    codec.issue_access(&user).unwrap()
}

fn wire(
    balance: i64,
    chunks: Vec<Result<EngineChunk, EngineError>>,
    users: Arc<dyn UserStore>,
) -> (
    Router,
    Arc<ScriptedLedger>,
    Arc<ScriptedEngine>,
    Arc<MemoryMessageStore>,
) {
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        database_url: "postgres://unused".into(),
        access_token_secret: "test-access-secret".into(),
        refresh_token_secret: "test-refresh-secret".into(),
        token_issuer: "flowgate".into(),
        token_audience: "flowgate-clients".into(),
        identity_base_url: "http://unused/".into(),
        ledger_base_url: "http://unused/".into(),
        engine_base_url: "http://unused/".into(),
        engine_api_key: None,
        prediction_cost: 1,
        admission_timeout_ms: 1000,
        flow_validation: ValidationMode::FailClosed,
    };
    let codec = TokenCodec::new(
        &config.access_token_secret,
        &config.refresh_token_secret,
        &config.token_issuer,
        &config.token_audience,
    );

    let refresh_store = Arc::new(MemoryRefreshTokenStore::new());
    let ledger = Arc::new(ScriptedLedger::with_balance(balance));
    let engine = Arc::new(ScriptedEngine::with_chunks(chunks));
    let history = Arc::new(MemoryMessageStore::new());

    let tokens = Arc::new(TokenService::new(
        codec.clone(),
        refresh_store,
        users.clone(),
    ));
    let credits = Arc::new(CreditGate::new(
        ledger.clone(),
        OperationCosts {
            prediction: config.prediction_cost,
        },
        Duration::from_millis(config.admission_timeout_ms),
    ));
    let relay = Arc::new(StreamRelay::new(
        engine.clone(),
        ledger.clone(),
        history.clone(),
    ));

    let state = AppState {
        config,
        codec,
        tokens,
        users,
        identity: Arc::new(ScriptedIdentity::with_default_users()),
        credits,
        engine: engine.clone(),
        relay,
    };

    (router(state), ledger, engine, history)
}

/// POST a JSON body, optionally with a bearer token.
pub async fn post_json(
    app: &Router,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// POST with no body at all.
pub async fn post_empty(app: &Router, uri: &str, token: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder.body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Read a response body as JSON.
pub async fn read_json(response: Response<Body>) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Read a streaming response body as newline-delimited JSON events.
pub async fn read_event_lines(response: Response<Body>) -> Vec<serde_json::Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Log in through the router and return (access_token, refresh_token).
pub async fn login(app: &Router, username: &str, password: &str) -> (String, String) {
    let response = post_json(
        app,
        "/auth/login",
        None,
        serde_json::json!({"username": username, "password": password}),
    )
    .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["refresh_token"].as_str().unwrap().to_string(),
    )
}
