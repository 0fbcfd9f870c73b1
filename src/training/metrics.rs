//! Regression metrics.

use crate::error::{AirfareError, Result};
use linfa::prelude::*;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Evaluation metrics of one model family on the test partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(rename = "MSE")]
    pub mse: f64,
    #[serde(rename = "MAE")]
    pub mae: f64,
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    #[serde(rename = "R2")]
    pub r2: f64,
}

/// Compare `predicted` against `actual`.
///
/// # Errors
///
/// Fails when the arrays differ in length or are empty.
pub fn calculate_metrics(actual: &Array1<f64>, predicted: &Array1<f64>) -> Result<Metrics> {
    if actual.is_empty() {
        return Err(AirfareError::Model("cannot evaluate on zero rows".to_owned()));
    }
    if actual.len() != predicted.len() {
        return Err(AirfareError::Model(format!(
            "{} predictions for {} targets",
            predicted.len(),
            actual.len()
        )));
    }
    let truth = Dataset::new(ndarray::Array2::<f64>::zeros((actual.len(), 0)), actual.clone());

    let mse = predicted.mean_squared_error(&truth)?;
    let mae = predicted.mean_absolute_error(&truth)?;
    let r2 = predicted.r2(&truth)?;

    Ok(Metrics {
        mse,
        mae,
        rmse: mse.sqrt(),
        r2,
    })
}
