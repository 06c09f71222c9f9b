//! Gradient-boosted trees (softprob-style multiclass)
//!
//! Each class owns an additive ensemble of regression trees. The class
//! margin is `base_score` plus the sum of the leaf values reached in that
//! class's trees; the prediction is the argmax margin.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::{check_width, Classifier, ModelError};

/// Regression tree node. Children always sit at higher indices than their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegressionNode {
    /// Rows with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf { value: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    /// Root at index 0
    pub nodes: Vec<RegressionNode>,
}

impl RegressionTree {
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                RegressionNode::Split { feature, threshold, left, right } => {
                    if feature >= n_features {
                        return Err(format!("node {idx} splits on feature {feature} of {n_features}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {idx} has a non-finite threshold"));
                    }
                    if [left, right].iter().any(|&c| c <= idx || c >= self.nodes.len()) {
                        return Err(format!("node {idx} points to an invalid child"));
                    }
                }
                RegressionNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("node {idx} has a non-finite leaf value"));
                    }
                }
            }
        }
        Ok(())
    }

    fn leaf_value(&self, row: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(RegressionNode::Leaf { value }) => return Ok(*value),
                Some(RegressionNode::Split { feature, threshold, left, right }) => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(ModelError::Malformed(format!("dangling node reference {idx}")));
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub n_features: usize,
    pub n_classes: usize,
    #[serde(default)]
    pub base_score: f64,
    /// One ensemble per class, in class order
    pub trees: Vec<Vec<RegressionTree>>,
}

impl GradientBoosting {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_classes == 0 || self.trees.len() != self.n_classes {
            return Err(ModelError::Malformed(format!(
                "expected {} per-class ensembles, got {}",
                self.n_classes,
                self.trees.len()
            )));
        }
        if !self.base_score.is_finite() {
            return Err(ModelError::Malformed("non-finite base score".into()));
        }
        if self.trees.iter().all(|ensemble| ensemble.is_empty()) {
            return Err(ModelError::Malformed("booster has no trees".into()));
        }

        for (class, ensemble) in self.trees.iter().enumerate() {
            for (i, tree) in ensemble.iter().enumerate() {
                tree.validate(self.n_features).map_err(|e| {
                    ModelError::Malformed(format!("class {class} tree {i}: {e}"))
                })?;
            }
        }
        Ok(())
    }

    fn margins(&self, row: ArrayView1<'_, f64>) -> Result<Vec<f64>, ModelError> {
        self.trees
            .iter()
            .map(|ensemble| {
                ensemble.iter().try_fold(self.base_score, |acc, tree| {
                    Ok::<f64, ModelError>(acc + tree.leaf_value(row)?)
                })
            })
            .collect()
    }
}

impl Classifier for GradientBoosting {
    fn kind(&self) -> &'static str {
        "gradient_boosting"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Vec<usize>, ModelError> {
        check_width(&batch, self.n_features)?;

        batch
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let margins = self.margins(row)?;
                if margins.iter().any(|m| m.is_nan()) {
                    return Err(ModelError::Malformed(format!("NaN margin for row {i}")));
                }

                let mut best = 0;
                for (class, &margin) in margins.iter().enumerate() {
                    if margin > margins[best] {
                        best = class;
                    }
                }
                Ok(best)
            })
            .collect()
    }
}
