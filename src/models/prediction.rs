//! Prediction request/response (KServe v1 protocol)

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PredictRequest {
    #[validate(length(min = 1, message = "instances must contain at least one feature vector"))]
    pub instances: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<usize>,
    pub class_names: Vec<String>,
}

impl PredictRequest {
    /// Pack the instances into a row-major matrix, checking every row has
    /// exactly `feature_count` finite values
    pub fn feature_matrix(&self, feature_count: usize) -> Result<Array2<f64>, String> {
        let mut flat = Vec::with_capacity(self.instances.len() * feature_count);

        for (i, row) in self.instances.iter().enumerate() {
            if row.len() != feature_count {
                return Err(format!(
                    "Expected {} features, got {} (instance {})",
                    feature_count,
                    row.len(),
                    i
                ));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(format!("Instance {} contains a non-finite value", i));
            }
            flat.extend_from_slice(row);
        }

        Array2::from_shape_vec((self.instances.len(), feature_count), flat)
            .map_err(|e| e.to_string())
    }
}
