//! Streaming prediction handler.
//!
//! Control flow per request: authenticated principal → flow validation
//! → credit gate → relay. Everything up to the gate is an ordinary
//! HTTP error; once the stream response starts, failures arrive as
//! in-band events.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::Response;
use axum::Json;
use futures_util::StreamExt;
use tracing::warn;

use flowgate_core::credits::BillableOperation;
use flowgate_core::id::uuidv7;
use flowgate_core::models::auth::Principal;
use flowgate_core::models::chat::PredictionRequest;
use flowgate_core::relay::{RelayEvent, RelayRequest};

use crate::AppState;
use crate::config::ValidationMode;
use crate::dto::PredictionBody;
use crate::error::AppError;

/// `POST /chat/predict` — run a flow prediction and stream its output
/// as newline-delimited JSON events.
pub async fn predict_handler(
    State(state): State<AppState>,
    axum::Extension(principal): axum::Extension<Principal>,
    Json(body): Json<PredictionBody>,
) -> Result<Response, AppError> {
    if body.question.trim().is_empty() {
        return Err(AppError::Validation("question must not be empty".into()));
    }
    if body.flow_id.trim().is_empty() {
        return Err(AppError::Validation("flow_id must not be empty".into()));
    }

    match state.engine.flow_exists(&body.flow_id).await {
        Ok(true) => {}
        Ok(false) => {
            return Err(AppError::NotFound(format!("Unknown flow: {}", body.flow_id)));
        }
        Err(e) => match state.config.flow_validation {
            ValidationMode::FailOpen => {
                warn!(flow_id = %body.flow_id, error = %e, "flow validation unavailable, proceeding");
            }
            ValidationMode::FailClosed => {
                return Err(AppError::UpstreamUnavailable(
                    "Flow validation unavailable".into(),
                ));
            }
        },
    }

    // Admission: deduct before any upstream work. Past this point the
    // operation is billed, success or not.
    let admission = state
        .credits
        .check_and_deduct(&principal, BillableOperation::Prediction)
        .await?;

    let session_id = body
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuidv7().to_string());

    let events = state.relay.stream(RelayRequest {
        user_id: principal.user_id.clone(),
        prediction: PredictionRequest {
            flow_id: body.flow_id,
            session_id,
            question: body.question,
            override_config: body.override_config,
            uploads: body.uploads,
        },
        cost: admission.cost,
    });

    let frames = futures_util::stream::unfold(events, |mut events| async move {
        events.recv().await.map(|event| (event, events))
    })
    .map(|event: RelayEvent| {
        let mut frame = serde_json::to_vec(&event).unwrap_or_else(|_| b"{}".to_vec());
        frame.push(b'\n');
        Ok::<_, Infallible>(Bytes::from(frame))
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(frames))
        .map_err(|e| AppError::Internal(format!("response build failed: {e}")))
}
