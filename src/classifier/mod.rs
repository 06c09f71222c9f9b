//! Classifier Module - model families the server can load
//!
//! A classifier is anything that maps a batch of feature rows to one class
//! index per row. The concrete family is decided by the artifact.

pub mod boosting;
pub mod dataset;
pub mod forest;
pub mod linear;
pub mod tree;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use boosting::{GradientBoosting, RegressionNode, RegressionTree};
pub use forest::RandomForest;
pub use linear::LogisticRegression;
pub use tree::{DecisionTree, TreeNode};

/// Training-time feature dimensionality
pub const FEATURE_COUNT: usize = 4;

/// Class labels in training label-encoding order
pub const CLASS_NAMES: [&str; 3] = ["setosa", "versicolor", "virginica"];

/// Vector used for the startup self-test
pub const REFERENCE_SAMPLE: [f64; FEATURE_COUNT] = [5.1, 3.5, 1.4, 0.2];

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("expected {expected} features, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("model returned {actual} predictions for {expected} rows")]
    OutputLength { expected: usize, actual: usize },

    #[error("class index {index} is outside the {known} known classes")]
    ClassOutOfRange { index: usize, known: usize },

    #[error("malformed model: {0}")]
    Malformed(String),
}

// ============================================================================
// CLASSIFIER TRAIT
// ============================================================================

/// Batch classifier. Implementations are immutable once built, so shared
/// references can be used from any number of request tasks.
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Short family name used in logs and the service info payload
    fn kind(&self) -> &'static str;

    fn n_features(&self) -> usize;

    fn n_classes(&self) -> usize;

    /// Predict one class index per row, in row order
    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Vec<usize>, ModelError>;
}

pub(crate) fn check_width(batch: &ArrayView2<'_, f64>, expected: usize) -> Result<(), ModelError> {
    if batch.ncols() != expected {
        return Err(ModelError::FeatureMismatch {
            expected,
            actual: batch.ncols(),
        });
    }
    Ok(())
}

/// Index of the largest count, lowest index on ties
pub(crate) fn argmax_count(counts: &[usize]) -> usize {
    let mut best = 0;
    for (class, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = class;
        }
    }
    best
}

// ============================================================================
// ARTIFACT FORMAT
// ============================================================================

/// Serialized model as written by the training step, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    LogisticRegression(LogisticRegression),
    GradientBoosting(GradientBoosting),
}

impl ModelArtifact {
    /// Decode and structurally validate an artifact
    pub fn decode(bytes: &[u8]) -> Result<Self, ModelError> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)
            .map_err(|e| ModelError::Malformed(e.to_string()))?;

        match &artifact {
            ModelArtifact::DecisionTree(t) => t.validate()?,
            ModelArtifact::RandomForest(f) => f.validate()?,
            ModelArtifact::LogisticRegression(l) => l.validate()?,
            ModelArtifact::GradientBoosting(g) => g.validate()?,
        }

        Ok(artifact)
    }

    pub fn into_classifier(self) -> Box<dyn Classifier> {
        match self {
            ModelArtifact::DecisionTree(t) => Box::new(t),
            ModelArtifact::RandomForest(f) => Box::new(f),
            ModelArtifact::LogisticRegression(l) => Box::new(l),
            ModelArtifact::GradientBoosting(g) => Box::new(g),
        }
    }
}
