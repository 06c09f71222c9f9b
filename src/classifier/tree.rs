//! CART decision tree

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::{argmax_count, check_width, Classifier, ModelError};

/// Tree node. Children always sit at higher indices than their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// Rows with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf { class: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub n_features: usize,
    pub n_classes: usize,
    /// Root at index 0
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Fit a fully grown tree with Gini impurity.
    ///
    /// Growth stops at pure nodes or when no threshold separates the rows.
    /// Candidate thresholds are midpoints between adjacent distinct values;
    /// ties between equally good splits go to the lower feature index, then
    /// the lower threshold, so fitting is deterministic.
    pub fn fit<'a>(
        features: ArrayView2<'a, f64>,
        labels: &'a [usize],
        n_classes: usize,
    ) -> Result<Self, ModelError> {
        if features.nrows() == 0 {
            return Err(ModelError::Malformed("cannot fit on an empty dataset".into()));
        }
        if features.nrows() != labels.len() {
            return Err(ModelError::Malformed(format!(
                "{} rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        if let Some(&bad) = labels.iter().find(|&&l| l >= n_classes) {
            return Err(ModelError::ClassOutOfRange { index: bad, known: n_classes });
        }

        let mut builder = TreeBuilder {
            features,
            labels,
            n_classes,
            nodes: Vec::new(),
        };
        builder.grow((0..labels.len()).collect());

        Ok(Self {
            n_features: features.ncols(),
            n_classes,
            nodes: builder.nodes,
        })
    }

    /// Check node references and class indices
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Malformed("tree has no nodes".into()));
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split { feature, threshold, left, right } => {
                    if feature >= self.n_features {
                        return Err(ModelError::Malformed(format!(
                            "node {idx} splits on feature {feature} of {}",
                            self.n_features
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ModelError::Malformed(format!(
                            "node {idx} has a non-finite threshold"
                        )));
                    }
                    for child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(ModelError::Malformed(format!(
                                "node {idx} points to invalid child {child}"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { class } => {
                    if class >= self.n_classes {
                        return Err(ModelError::ClassOutOfRange {
                            index: class,
                            known: self.n_classes,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn predict_row(&self, row: ArrayView1<'_, f64>) -> Result<usize, ModelError> {
        let mut idx = 0;
        // Child indices strictly increase, so this walk is bounded
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { class }) => return Ok(*class),
                Some(TreeNode::Split { feature, threshold, left, right }) => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(ModelError::Malformed(format!("dangling node reference {idx}")));
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

impl Classifier for DecisionTree {
    fn kind(&self) -> &'static str {
        "decision_tree"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Vec<usize>, ModelError> {
        check_width(&batch, self.n_features)?;
        batch.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }
}

// ============================================================================
// FITTING
// ============================================================================

struct TreeBuilder<'a> {
    features: ArrayView2<'a, f64>,
    labels: &'a [usize],
    n_classes: usize,
    nodes: Vec<TreeNode>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `rows` and return its node index
    fn grow(&mut self, rows: Vec<usize>) -> usize {
        let idx = self.nodes.len();
        let counts = self.class_counts(&rows);
        let majority = argmax_count(&counts);
        self.nodes.push(TreeNode::Leaf { class: majority });

        if counts.iter().filter(|&&c| c > 0).count() <= 1 {
            return idx;
        }

        let Some(split) = self.best_split(&rows) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.features[[r, split.feature]] <= split.threshold);

        let left = self.grow(left_rows);
        let right = self.grow(right_rows);
        self.nodes[idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn class_counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &r in rows {
            counts[self.labels[r]] += 1;
        }
        counts
    }

    fn best_split(&self, rows: &[usize]) -> Option<SplitCandidate> {
        let total = rows.len();
        let total_counts = self.class_counts(rows);
        let mut best: Option<SplitCandidate> = None;

        for feature in 0..self.features.ncols() {
            let mut sorted: Vec<(f64, usize)> = rows
                .iter()
                .map(|&r| (self.features[[r, feature]], self.labels[r]))
                .collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_counts = vec![0; self.n_classes];
            for i in 0..total - 1 {
                left_counts[sorted[i].1] += 1;
                let (value, next) = (sorted[i].0, sorted[i + 1].0);
                if value == next {
                    continue;
                }

                let n_left = i + 1;
                let n_right = total - n_left;
                let right_counts: Vec<usize> = total_counts
                    .iter()
                    .zip(&left_counts)
                    .map(|(t, l)| t - l)
                    .collect();
                let impurity = (n_left as f64 * gini(&left_counts, n_left)
                    + n_right as f64 * gini(&right_counts, n_right))
                    / total as f64;

                let better = match &best {
                    Some(b) => impurity < b.impurity - 1e-12,
                    None => true,
                };
                if better {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (value + next) / 2.0,
                        impurity,
                    });
                }
            }
        }

        best
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}
