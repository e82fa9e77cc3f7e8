//! Chat / prediction domain models.

use serde::{Deserialize, Serialize};

/// A file or image attached to a prediction request, forwarded to the
/// upstream engine untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

/// A prediction request as forwarded to the upstream engine.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub flow_id: String,
    pub session_id: String,
    pub question: String,
    pub override_config: Option<serde_json::Value>,
    pub uploads: Vec<Upload>,
}
