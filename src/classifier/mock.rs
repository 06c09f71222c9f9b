//! Scripted classifier for loader and handler tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::ArrayView2;

use super::{Classifier, ModelError, FEATURE_COUNT};

/// Returns `answers[row % answers.len()]` for every row and counts calls
#[derive(Debug, Clone)]
pub struct ScriptedClassifier {
    pub answers: Vec<usize>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedClassifier {
    pub fn new(answers: Vec<usize>) -> Self {
        Self {
            answers,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for ScriptedClassifier {
    fn kind(&self) -> &'static str {
        "scripted"
    }

    fn n_features(&self) -> usize {
        FEATURE_COUNT
    }

    fn n_classes(&self) -> usize {
        3
    }

    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Vec<usize>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..batch.nrows())
            .map(|row| self.answers[row % self.answers.len()])
            .collect())
    }
}
