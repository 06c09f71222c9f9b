//! Service info and health payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub model: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
    pub endpoints: EndpointMap,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointMap {
    pub health: String,
    pub model: String,
    pub predict_v1: String,
    pub predict: String,
}

impl EndpointMap {
    pub fn for_model(model_name: &str) -> Self {
        Self {
            health: "/health".to_string(),
            model: format!("/v1/models/{}", model_name),
            predict_v1: format!("/v1/models/{}:predict", model_name),
            predict: "/predict".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub name: String,
    pub ready: bool,
    pub status: String,
}
