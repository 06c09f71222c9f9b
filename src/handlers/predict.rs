//! Prediction handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use validator::Validate;

use crate::classifier::FEATURE_COUNT;
use crate::loader::LoadedModel;
use crate::models::{PredictRequest, PredictResponse};
use crate::{AppError, AppResult, AppState};

/// POST /v1/models/{name}:predict
pub async fn predict_v1(
    State(state): State<AppState>,
    Path(target): Path<String>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let model = state.model.ready().ok_or(AppError::NotReady)?;

    let name = target
        .strip_suffix(":predict")
        .ok_or_else(|| AppError::NotFound(format!("Unknown model route '{}'", target)))?;
    if name != state.config.model_name {
        return Err(AppError::NotFound(format!("Model '{}' not found", name)));
    }

    run_prediction(model, payload)
}

/// POST /predict, alias of the v1 endpoint for the served model
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let model = state.model.ready().ok_or(AppError::NotReady)?;
    run_prediction(model, payload)
}

fn run_prediction(
    model: &LoadedModel,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let Json(req) = payload?;
    req.validate()?;
    let batch = req
        .feature_matrix(FEATURE_COUNT)
        .map_err(AppError::ValidationError)?;

    let result = model.classify(batch.view())?;

    tracing::info!(
        "Predicted {} instances: {:?} -> {:?}",
        batch.nrows(),
        result.indices,
        result.names
    );

    Ok(Json(PredictResponse {
        predictions: result.indices,
        class_names: result.names,
    }))
}
