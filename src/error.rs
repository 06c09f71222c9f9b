//! Error handling

use axum::{
    extract::rejection::JsonRejection,
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::classifier::ModelError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Lifecycle errors
    NotReady,

    // Client errors
    ValidationError(String),
    NotFound(String),

    // Model/service mismatch
    ModelContract(String),

    // Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            AppError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "Model not loaded"),
            AppError::ValidationError(msg) => {
                tracing::warn!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.as_str())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            AppError::ModelContract(msg) => {
                tracing::error!("Model contract violation: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Prediction failed: model output inconsistent with configured classes")
            }
            AppError::InternalError(msg) => {
                tracing::error!("Prediction error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Prediction failed")
            }
        };

        let body = Json(json!({
            "detail": detail,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::ClassOutOfRange { .. } | ModelError::OutputLength { .. } => {
                AppError::ModelContract(err.to_string())
            }
            // Shapes are validated before inference, so a mismatch here is the
            // model disagreeing with the configured feature count
            ModelError::FeatureMismatch { .. } | ModelError::Malformed(_) => {
                AppError::InternalError(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        AppError::ValidationError(err.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}
