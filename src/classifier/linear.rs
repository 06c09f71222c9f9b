//! Multinomial logistic regression

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::{check_width, Classifier, ModelError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub n_features: usize,
    pub n_classes: usize,
    /// One row of weights per class
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LogisticRegression {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_classes == 0 {
            return Err(ModelError::Malformed("model has no classes".into()));
        }
        if self.coefficients.len() != self.n_classes || self.intercepts.len() != self.n_classes {
            return Err(ModelError::Malformed(format!(
                "expected {} coefficient rows and intercepts, got {} and {}",
                self.n_classes,
                self.coefficients.len(),
                self.intercepts.len()
            )));
        }
        if let Some(row) = self.coefficients.iter().position(|w| w.len() != self.n_features) {
            return Err(ModelError::Malformed(format!(
                "coefficient row {row} does not have {} weights",
                self.n_features
            )));
        }
        let all_finite = self
            .coefficients
            .iter()
            .flatten()
            .chain(&self.intercepts)
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ModelError::Malformed("non-finite weight".into()));
        }
        Ok(())
    }
}

impl Classifier for LogisticRegression {
    fn kind(&self) -> &'static str {
        "logistic_regression"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Softmax is monotonic, so the class is the argmax of the linear scores
    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Vec<usize>, ModelError> {
        check_width(&batch, self.n_features)?;

        batch
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let mut best = (0, f64::NEG_INFINITY);
                for (class, (weights, bias)) in
                    self.coefficients.iter().zip(&self.intercepts).enumerate()
                {
                    let score = bias + row.iter().zip(weights).map(|(x, w)| x * w).sum::<f64>();
                    if score.is_nan() {
                        return Err(ModelError::Malformed(format!(
                            "class {class} score is NaN for row {i}"
                        )));
                    }
                    if score > best.1 {
                        best = (class, score);
                    }
                }
                Ok(best.0)
            })
            .collect()
    }
}
