//! Liveness handler.

use axum::Json;

/// `GET /healthz` — liveness probe.
pub async fn healthz_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": flowgate_core::version(),
    }))
}
