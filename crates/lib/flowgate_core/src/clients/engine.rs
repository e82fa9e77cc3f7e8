//! Upstream flow-engine client.
//!
//! The engine executes chat flows and streams its output as SSE
//! frames. The gateway treats it as a black box with two transports:
//! a streaming call (primary) and a direct, non-streaming call used as
//! fallback when the stream dies before producing anything.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::models::chat::{PredictionRequest, Upload};

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    #[error("Engine returned status {0}")]
    Status(u16),

    #[error("Engine stream error: {0}")]
    Stream(String),

    #[error("Engine protocol error: {0}")]
    Protocol(String),
}

/// One unit of upstream output. Raw frames are the `data:` payload of
/// an SSE event; parsed chunks are whole JSON values (the direct
/// transport produces exactly one of those).
#[derive(Debug, Clone)]
pub enum EngineChunk {
    Parsed(serde_json::Value),
    Raw(String),
}

/// Streaming engine output.
pub type EngineStream = Pin<Box<dyn Stream<Item = Result<EngineChunk, EngineError>> + Send>>;

/// External flow-execution engine.
#[async_trait]
pub trait UpstreamEngine: Send + Sync {
    /// Open a streaming prediction call.
    async fn stream_prediction(&self, req: &PredictionRequest) -> Result<EngineStream, EngineError>;

    /// Run the same logical prediction over the direct transport,
    /// returning the complete response object.
    async fn direct_prediction(
        &self,
        req: &PredictionRequest,
    ) -> Result<serde_json::Value, EngineError>;

    /// Whether the engine knows the given flow.
    async fn flow_exists(&self, flow_id: &str) -> Result<bool, EngineError>;
}

/// HTTP engine client.
pub struct HttpUpstreamEngine {
    base_url: Url,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct PredictionBody<'a> {
    question: &'a str,
    #[serde(rename = "chatId")]
    chat_id: &'a str,
    streaming: bool,
    #[serde(rename = "overrideConfig", skip_serializing_if = "Option::is_none")]
    override_config: Option<&'a serde_json::Value>,
    uploads: &'a [Upload],
}

impl HttpUpstreamEngine {
    pub fn new(base_url: Url, api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            base_url,
            api_key,
            client,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, EngineError> {
        self.base_url
            .join(path)
            .map_err(|e| EngineError::Protocol(format!("bad endpoint {path}: {e}")))
    }

    fn prediction_request(
        &self,
        req: &PredictionRequest,
        streaming: bool,
    ) -> Result<reqwest::RequestBuilder, EngineError> {
        let url = self.endpoint(&format!("api/v1/prediction/{}", req.flow_id))?;
        let mut builder = self.client.post(url).json(&PredictionBody {
            question: &req.question,
            chat_id: &req.session_id,
            streaming,
            override_config: req.override_config.as_ref(),
            uploads: &req.uploads,
        });
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        Ok(builder)
    }
}

#[async_trait]
impl UpstreamEngine for HttpUpstreamEngine {
    async fn stream_prediction(&self, req: &PredictionRequest) -> Result<EngineStream, EngineError> {
        let response = self
            .prediction_request(req, true)?
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(EngineError::UnknownFlow(req.flow_id.clone())),
            status if !status.is_success() => return Err(EngineError::Status(status.as_u16())),
            _ => {}
        }

        let sse = sse_stream::SseStream::from_byte_stream(response.bytes_stream());
        let chunks = sse.filter_map(|item| async move {
            match item {
                Ok(frame) => frame.data.map(|data| Ok(EngineChunk::Raw(data))),
                Err(e) => Some(Err(EngineError::Stream(e.to_string()))),
            }
        });
        Ok(Box::pin(chunks))
    }

    async fn direct_prediction(
        &self,
        req: &PredictionRequest,
    ) -> Result<serde_json::Value, EngineError> {
        let response = self
            .prediction_request(req, false)?
            .send()
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(EngineError::UnknownFlow(req.flow_id.clone())),
            status if !status.is_success() => return Err(EngineError::Status(status.as_u16())),
            _ => {}
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| EngineError::Protocol(format!("prediction response: {e}")))
    }

    async fn flow_exists(&self, flow_id: &str) -> Result<bool, EngineError> {
        let url = self.endpoint(&format!("api/v1/chatflows/{flow_id}"))?;
        let mut builder = self.client.get(url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(EngineError::Status(status.as_u16())),
        }
    }
}
