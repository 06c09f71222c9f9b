//! Random forest: majority vote over decision trees

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::{argmax_count, check_width, Classifier, DecisionTree, ModelError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub n_classes: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Malformed("forest has no trees".into()));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            if tree.n_features != self.n_features || tree.n_classes != self.n_classes {
                return Err(ModelError::Malformed(format!(
                    "tree {i} is {}x{}, forest is {}x{}",
                    tree.n_features, tree.n_classes, self.n_features, self.n_classes
                )));
            }
            tree.validate()?;
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn kind(&self) -> &'static str {
        "random_forest"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Vec<usize>, ModelError> {
        check_width(&batch, self.n_features)?;

        let mut predictions = Vec::with_capacity(batch.nrows());
        let mut votes = vec![0usize; self.n_classes];
        for row in batch.rows() {
            votes.iter_mut().for_each(|v| *v = 0);
            for tree in &self.trees {
                let class = tree.predict_row(row)?;
                // Vote must land inside the class range
                let slot = votes.get_mut(class).ok_or(ModelError::ClassOutOfRange {
                    index: class,
                    known: self.n_classes,
                })?;
                *slot += 1;
            }
            predictions.push(argmax_count(&votes));
        }
        Ok(predictions)
    }
}
