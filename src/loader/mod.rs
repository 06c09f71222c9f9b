//! Model Loader - one-shot model initialization
//!
//! Resolves the artifact, falls back to a model fit on the embedded
//! reference set when no artifact is mounted, runs one self-test
//! prediction and publishes the result exactly once.


use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView2};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::classifier::{
    dataset, Classifier, DecisionTree, ModelArtifact, ModelError, CLASS_NAMES, FEATURE_COUNT,
    REFERENCE_SAMPLE,
};

// ============================================================================
// ERRORS
// ============================================================================

/// Startup-fatal loader failures
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model artifact not found at {0} and fallback is disabled")]
    ArtifactMissing(PathBuf),

    #[error("failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode model artifact {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: ModelError,
    },

    #[error("artifact expects {features} features and {classes} classes, server is configured for {expected_features} and {expected_classes}")]
    Incompatible {
        features: usize,
        classes: usize,
        expected_features: usize,
        expected_classes: usize,
    },

    #[error("failed to fit fallback model: {0}")]
    Fallback(#[source] ModelError),

    #[error("self-test prediction failed: {0}")]
    SelfTest(#[source] ModelError),

    #[error("model loader already ran")]
    AlreadyInitialized,
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Uninitialized = 0,
    Loading = 1,
    Ready = 2,
    Failed = 3,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Lifecycle::Loading,
            2 => Lifecycle::Ready,
            3 => Lifecycle::Failed,
            _ => Lifecycle::Uninitialized,
        }
    }
}

/// Where the served model came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    Artifact,
    Fallback,
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Artifact => f.write_str("artifact"),
            ModelSource::Fallback => f.write_str("fallback"),
        }
    }
}

/// Loader inputs, resolved from the server config
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub model_path: PathBuf,
    pub allow_fallback: bool,
}

// ============================================================================
// LOADED MODEL
// ============================================================================

/// A ready model and the class names it predicts into. Never mutated
/// after publication.
#[derive(Debug)]
pub struct LoadedModel {
    classifier: Box<dyn Classifier>,
    class_names: Vec<String>,
    source: ModelSource,
    loaded_at: DateTime<Utc>,
}

/// Parallel class indices and names, in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub indices: Vec<usize>,
    pub names: Vec<String>,
}

impl LoadedModel {
    pub fn new(classifier: Box<dyn Classifier>, source: ModelSource) -> Self {
        Self {
            classifier,
            class_names: CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            source,
            loaded_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.classifier.kind()
    }

    pub fn source(&self) -> ModelSource {
        self.source
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Run the classifier once over the whole batch and map indices to names.
    ///
    /// Any index outside the class list is a model contract violation.
    pub fn classify(&self, batch: ArrayView2<'_, f64>) -> Result<Classification, ModelError> {
        let indices = self.classifier.predict(batch)?;
        if indices.len() != batch.nrows() {
            return Err(ModelError::OutputLength {
                expected: batch.nrows(),
                actual: indices.len(),
            });
        }

        let names = indices
            .iter()
            .map(|&index| {
                self.class_names
                    .get(index)
                    .cloned()
                    .ok_or(ModelError::ClassOutOfRange {
                        index,
                        known: self.class_names.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Classification { indices, names })
    }
}

// ============================================================================
// MODEL HANDLE
// ============================================================================

/// Process-wide model slot. Written once by [`ModelHandle::initialize`],
/// read concurrently by request handlers afterwards.
#[derive(Debug, Default)]
pub struct ModelHandle {
    state: AtomicU8,
    model: OnceCell<LoadedModel>,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle() == Lifecycle::Ready
    }

    /// The served model, only once the lifecycle is `Ready`
    pub fn ready(&self) -> Option<&LoadedModel> {
        if !self.is_ready() {
            return None;
        }
        self.model.get()
    }

    /// Resolve, load and self-test the model. Runs at most once per handle.
    pub fn initialize(&self, settings: &LoaderSettings) -> Result<&LoadedModel, LoadError> {
        self.initialize_with(|| load(settings))
    }

    pub(crate) fn initialize_with<F>(&self, load: F) -> Result<&LoadedModel, LoadError>
    where
        F: FnOnce() -> Result<LoadedModel, LoadError>,
    {
        self.state
            .compare_exchange(
                Lifecycle::Uninitialized as u8,
                Lifecycle::Loading as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| LoadError::AlreadyInitialized)?;

        let outcome = load().and_then(|model| {
            self_test(&model)?;
            Ok(model)
        });

        match outcome {
            Ok(model) => {
                if self.model.set(model).is_err() {
                    self.state.store(Lifecycle::Failed as u8, Ordering::Release);
                    return Err(LoadError::AlreadyInitialized);
                }
                self.state.store(Lifecycle::Ready as u8, Ordering::Release);
                tracing::info!("Model lifecycle: ready");
                self.model.get().ok_or(LoadError::AlreadyInitialized)
            }
            Err(e) => {
                self.state.store(Lifecycle::Failed as u8, Ordering::Release);
                tracing::error!("Model lifecycle: failed ({})", e);
                Err(e)
            }
        }
    }
}

// ============================================================================
// LOADING
// ============================================================================

fn load(settings: &LoaderSettings) -> Result<LoadedModel, LoadError> {
    let path = settings.model_path.as_path();
    tracing::info!("Loading model from {}", path.display());

    if !path.exists() {
        if !settings.allow_fallback {
            return Err(LoadError::ArtifactMissing(path.to_path_buf()));
        }
        tracing::warn!(
            "Model file not found at {}, using fallback model (not production quality)",
            path.display()
        );
        let tree = fit_fallback().map_err(LoadError::Fallback)?;
        tracing::info!(
            "Fallback decision tree fit on reference set: {} nodes, depth {}",
            tree.nodes.len(),
            tree.depth()
        );
        return Ok(LoadedModel::new(Box::new(tree), ModelSource::Fallback));
    }

    let classifier = load_artifact(path)?;
    tracing::info!("Model loaded successfully from {} ({})", path.display(), classifier.kind());
    Ok(LoadedModel::new(classifier, ModelSource::Artifact))
}

fn load_artifact(path: &Path) -> Result<Box<dyn Classifier>, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(
        "Artifact size {} bytes, sha256 {}",
        bytes.len(),
        fingerprint(&bytes)
    );

    let classifier = ModelArtifact::decode(&bytes)
        .map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .into_classifier();

    if classifier.n_features() != FEATURE_COUNT || classifier.n_classes() != CLASS_NAMES.len() {
        return Err(LoadError::Incompatible {
            features: classifier.n_features(),
            classes: classifier.n_classes(),
            expected_features: FEATURE_COUNT,
            expected_classes: CLASS_NAMES.len(),
        });
    }

    Ok(classifier)
}

/// Fit the development fallback on the embedded reference set
pub fn fit_fallback() -> Result<DecisionTree, ModelError> {
    let features = dataset::iris_matrix();
    DecisionTree::fit(features.view(), &dataset::iris_labels(), CLASS_NAMES.len())
}

fn self_test(model: &LoadedModel) -> Result<(), LoadError> {
    let sample = Array2::from_shape_vec((1, FEATURE_COUNT), REFERENCE_SAMPLE.to_vec())
        .map_err(|e| LoadError::SelfTest(ModelError::Malformed(e.to_string())))?;

    let result = model.classify(sample.view()).map_err(LoadError::SelfTest)?;
    tracing::info!(
        "Model test prediction: {} (class: {})",
        result.indices[0],
        result.names[0]
    );
    Ok(())
}

fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
