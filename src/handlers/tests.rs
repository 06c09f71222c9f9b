//! Router tests: the full HTTP surface driven in-process

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use crate::classifier::mock::ScriptedClassifier;
use crate::config::Config;
use crate::loader::{Lifecycle, LoadError, LoadedModel, LoaderSettings, ModelHandle, ModelSource};
use crate::models::{HealthResponse, PredictResponse, ServiceInfo};
use crate::{create_router, AppState};

const TWO_SAMPLES: &str = r#"{"instances": [[5.1, 3.5, 1.4, 0.2], [6.7, 3.0, 5.2, 2.3]]}"#;

fn state_with(handle: ModelHandle) -> AppState {
    AppState {
        model: Arc::new(handle),
        config: Config::default(),
    }
}

fn fallback_state() -> AppState {
    let dir = tempfile::tempdir().unwrap();
    let handle = ModelHandle::new();
    handle
        .initialize(&LoaderSettings {
            model_path: dir.path().join("model"),
            allow_fallback: true,
        })
        .unwrap();
    state_with(handle)
}

fn scripted_state(classifier: ScriptedClassifier) -> AppState {
    let handle = ModelHandle::new();
    handle
        .initialize_with(|| Ok(LoadedModel::new(Box::new(classifier), ModelSource::Artifact)))
        .unwrap();
    state_with(handle)
}

async fn call(state: &AppState, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Bytes) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = create_router(state.clone())
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes)
}

fn detail(bytes: &Bytes) -> String {
    let value: Value = serde_json::from_slice(bytes).unwrap();
    value["detail"].as_str().unwrap().to_string()
}

// ============================================================================
// READINESS
// ============================================================================

#[tokio::test]
async fn test_health_before_initialize_is_unavailable() {
    let state = state_with(ModelHandle::new());

    for uri in ["/health", "/v1/models/iris-model"] {
        let (status, body) = call(&state, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(detail(&body), "Model not loaded");
    }

    let (status, body) = call(&state, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    let info: ServiceInfo = serde_json::from_slice(&body).unwrap();
    assert_eq!(info.status, "not ready");
    assert!(info.source.is_none());
}

#[tokio::test]
async fn test_predict_before_initialize_checks_readiness_first() {
    let state = state_with(ModelHandle::new());

    // Invalid body still reports not-ready
    let (status, body) = call(&state, Method::POST, "/predict", Some(r#"{"instances": [[1.0]]}"#)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(detail(&body), "Model not loaded");

    let (status, _) = call(&state, Method::POST, "/v1/models/other:predict", Some(TWO_SAMPLES)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_not_ready_while_loading() {
    let handle = Arc::new(ModelHandle::new());
    let state = AppState {
        model: handle.clone(),
        config: Config::default(),
    };

    let (loading_tx, loading_rx) = tokio::sync::oneshot::channel::<()>();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

    // Hold the loader inside its load step until the requests below are done
    let loader = {
        let handle = handle.clone();
        tokio::task::spawn_blocking(move || {
            handle
                .initialize_with(|| {
                    let _ = loading_tx.send(());
                    let _ = release_rx.recv();
                    Ok(LoadedModel::new(
                        Box::new(ScriptedClassifier::new(vec![0])),
                        ModelSource::Artifact,
                    ))
                })
                .map(|_| ())
        })
    };

    loading_rx.await.unwrap();
    assert_eq!(handle.lifecycle(), Lifecycle::Loading);

    for uri in ["/health", "/v1/models/iris-model"] {
        let (status, body) = call(&state, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(detail(&body), "Model not loaded");
    }
    let (status, body) = call(&state, Method::POST, "/predict", Some(TWO_SAMPLES)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(detail(&body), "Model not loaded");

    release_tx.send(()).unwrap();
    loader.await.unwrap().unwrap();

    assert_eq!(handle.lifecycle(), Lifecycle::Ready);
    let (status, _) = call(&state, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_failed_initialize_never_reports_ready() {
    let handle = ModelHandle::new();
    let _ = handle.initialize_with(|| Err(LoadError::AlreadyInitialized));
    let state = state_with(handle);

    let (status, _) = call(&state, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = call(&state, Method::POST, "/predict", Some(TWO_SAMPLES)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_fallback_model_is_healthy() {
    let state = fallback_state();

    let (status, body) = call(&state, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert!(health.ready);
    assert_eq!(health.name, "iris-model");
    assert_eq!(health.status, "healthy");

    let (status, v1_body) = call(&state, Method::GET, "/v1/models/iris-model", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v1_body, body);

    let (_, body) = call(&state, Method::GET, "/", None).await;
    let info: ServiceInfo = serde_json::from_slice(&body).unwrap();
    assert_eq!(info.status, "ready");
    assert_eq!(info.source.as_deref(), Some("fallback"));
    assert!(info.loaded_at.is_some());
    assert_eq!(info.endpoints.predict_v1, "/v1/models/iris-model:predict");
}

#[tokio::test]
async fn test_unknown_model_name_is_not_found() {
    let state = fallback_state();

    let (status, body) = call(&state, Method::GET, "/v1/models/resnet", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(detail(&body), "Model 'resnet' not found");

    let (status, _) = call(&state, Method::POST, "/v1/models/resnet:predict", Some(TWO_SAMPLES)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&state, Method::POST, "/v1/models/iris-model", Some(TWO_SAMPLES)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// PREDICTION
// ============================================================================

#[tokio::test]
async fn test_predict_single_instance() {
    let state = fallback_state();

    let (status, body) = call(
        &state,
        Method::POST,
        "/predict",
        Some(r#"{"instances": [[5.1, 3.5, 1.4, 0.2]]}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let response: PredictResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(response.predictions, vec![0]);
    assert_eq!(response.class_names, vec!["setosa".to_string()]);
}

#[tokio::test]
async fn test_predict_batch_preserves_order() {
    let state = fallback_state();

    let (status, body) = call(&state, Method::POST, "/predict", Some(TWO_SAMPLES)).await;
    assert_eq!(status, StatusCode::OK);

    let response: PredictResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(response.predictions, vec![0, 2]);
    assert_eq!(response.class_names, vec!["setosa".to_string(), "virginica".to_string()]);

    let reversed = r#"{"instances": [[6.7, 3.0, 5.2, 2.3], [5.1, 3.5, 1.4, 0.2]]}"#;
    let (_, body) = call(&state, Method::POST, "/predict", Some(reversed)).await;
    let response: PredictResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(response.predictions, vec![2, 0]);
}

#[tokio::test]
async fn test_v1_and_alias_are_byte_identical() {
    let state = fallback_state();

    let (v1_status, v1_body) =
        call(&state, Method::POST, "/v1/models/iris-model:predict", Some(TWO_SAMPLES)).await;
    let (alias_status, alias_body) = call(&state, Method::POST, "/predict", Some(TWO_SAMPLES)).await;

    assert_eq!(v1_status, StatusCode::OK);
    assert_eq!(alias_status, StatusCode::OK);
    assert_eq!(v1_body, alias_body);
}

#[tokio::test]
async fn test_predict_is_idempotent() {
    let state = fallback_state();

    let (_, first) = call(&state, Method::POST, "/predict", Some(TWO_SAMPLES)).await;
    let (_, second) = call(&state, Method::POST, "/predict", Some(TWO_SAMPLES)).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_model_called_once_per_batch() {
    let classifier = ScriptedClassifier::new(vec![2, 1, 0]);
    let state = scripted_state(classifier.clone());
    let after_self_test = classifier.call_count();

    let body = r#"{"instances": [[1,1,1,1],[2,2,2,2],[3,3,3,3],[4,4,4,4]]}"#;
    let (status, bytes) = call(&state, Method::POST, "/predict", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(classifier.call_count(), after_self_test + 1);

    let response: PredictResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(response.predictions, vec![2, 1, 0, 2]);
    assert_eq!(response.class_names, vec!["virginica", "versicolor", "setosa", "virginica"]);
}

#[tokio::test]
async fn test_concurrent_predictions_agree() {
    let state = fallback_state();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let state = state.clone();
        tasks.push(tokio::spawn(async move {
            call(&state, Method::POST, "/predict", Some(TWO_SAMPLES)).await
        }));
    }

    let mut bodies = Vec::new();
    for task in tasks {
        let (status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        bodies.push(body);
    }
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
}

// ============================================================================
// ERRORS
// ============================================================================

#[tokio::test]
async fn test_wrong_feature_count_is_validation_error() {
    let classifier = ScriptedClassifier::new(vec![0]);
    let state = scripted_state(classifier.clone());
    let before = classifier.call_count();

    let (status, body) = call(
        &state,
        Method::POST,
        "/predict",
        Some(r#"{"instances": [[1.0, 2.0, 3.0]]}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(detail(&body).contains("Expected 4 features, got 3"));

    // One bad row fails the whole batch without touching the model
    let mixed = r#"{"instances": [[5.1, 3.5, 1.4, 0.2], [1.0, 2.0, 3.0, 4.0, 5.0]]}"#;
    let (status, body) = call(&state, Method::POST, "/v1/models/iris-model:predict", Some(mixed)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(detail(&body).contains("Expected 4 features, got 5 (instance 1)"));

    assert_eq!(classifier.call_count(), before);
}

#[tokio::test]
async fn test_malformed_bodies_are_validation_errors() {
    let state = fallback_state();

    let cases = [
        r#"{"instances": []}"#,
        r#"{"instances": [["a", "b", "c", "d"]]}"#,
        r#"{"rows": [[5.1, 3.5, 1.4, 0.2]]}"#,
        r#"not json"#,
    ];
    for body in cases {
        let (status, bytes) = call(&state, Method::POST, "/predict", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert!(!detail(&bytes).is_empty());
    }

    let (status, _) = call(&state, Method::POST, "/predict", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_class_is_internal_error() {
    // Row 0 (the self-test) is fine, row 1 is not
    let state = scripted_state(ScriptedClassifier::new(vec![0, 9]));

    let (status, body) = call(&state, Method::POST, "/predict", Some(TWO_SAMPLES)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let detail = detail(&body);
    assert!(detail.starts_with("Prediction failed"));
    assert!(!detail.contains('9'));
}
