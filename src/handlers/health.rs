//! Service info and readiness handlers

use axum::{
    extract::{Path, State},
    Json,
};

use crate::models::{EndpointMap, HealthResponse, ServiceInfo};
use crate::{AppError, AppResult, AppState};

pub const SERVICE_NAME: &str = "Iris Model Server";

/// Service info, always 200
pub async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    let model = state.model.ready();

    Json(ServiceInfo {
        name: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: match model {
            Some(m) => format!("Iris Classifier ({})", m.kind()),
            None => "Iris Classifier".to_string(),
        },
        status: if model.is_some() { "ready" } else { "not ready" }.to_string(),
        source: model.map(|m| m.source().to_string()),
        loaded_at: model.map(|m| m.loaded_at()),
        endpoints: EndpointMap::for_model(&state.config.model_name),
    })
}

/// Readiness probe
pub async fn check(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    ready_response(&state)
}

/// KServe model status: same payload as /health, for the served model only
pub async fn model_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<HealthResponse>> {
    let response = ready_response(&state)?;
    if name != state.config.model_name {
        return Err(AppError::NotFound(format!("Model '{}' not found", name)));
    }
    Ok(response)
}

fn ready_response(state: &AppState) -> AppResult<Json<HealthResponse>> {
    if !state.model.is_ready() {
        return Err(AppError::NotReady);
    }

    Ok(Json(HealthResponse {
        name: state.config.model_name.clone(),
        ready: true,
        status: "healthy".to_string(),
    }))
}
