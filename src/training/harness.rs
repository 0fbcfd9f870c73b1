//! Training/evaluation harness.

use super::estimators::{Estimator, ModelRegistry};
use super::metrics::{Metrics, calculate_metrics};
use super::preprocess::Preprocessor;
use super::split::train_test_split;
use crate::config::TrainConfig;
use crate::error::{AirfareError, Result};
use indexmap::IndexMap;
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// A fitted preprocessor and estimator, applied in sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedPipeline {
    pub model_name: String,
    pub class: String,
    pub target: String,
    /// Predictions are on the log scale and must be exponentiated
    pub target_log_transformed: bool,
    preprocessor: Preprocessor,
    estimator: Estimator,
}

impl TrainedPipeline {
    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    /// Predict on the model's own scale.
    ///
    /// # Errors
    ///
    /// Fails when a feature column is absent or malformed.
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let x = self.preprocessor.transform(df)?;
        self.estimator.predict(&x)
    }

    /// Predict on the original target scale, undoing a log transform.
    ///
    /// # Errors
    ///
    /// Same as [`TrainedPipeline::predict`].
    pub fn predict_target(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let predictions = self.predict(df)?;
        Ok(if self.target_log_transformed {
            predictions.mapv(f64::exp)
        } else {
            predictions
        })
    }
}

/// Everything [`train_and_evaluate`] produces.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub train: DataFrame,
    pub test: DataFrame,
    pub results: IndexMap<String, Metrics>,
    pub models: IndexMap<String, TrainedPipeline>,
}

/// Split `features`, fit the shared preprocessor on the training rows, then
/// fit and evaluate every configured model family in order.
///
/// # Errors
///
/// - [`AirfareError::Config`] for an unknown model class, before any fit
/// - schema errors when the target or a feature column is absent
/// - [`AirfareError::Model`] when a family fails to fit
pub fn train_and_evaluate(
    features: &DataFrame,
    config: &TrainConfig,
    target_log_transformed: bool,
) -> Result<TrainingOutcome> {
    let registry = ModelRegistry::from_config(&config.models)?;
    check_target(features, &config.target)?;

    let (train, test) = train_test_split(features, &config.train_test_split)?;
    tracing::info!(
        "Split {} rows into {} train / {} test",
        features.height(),
        train.height(),
        test.height()
    );

    let preprocessor = Preprocessor::fit(
        &train,
        &config.numerical_features,
        &config.categorical_features,
        config.one_hot_drop_first,
    )?;
    let x_train = preprocessor.transform(&train)?;
    let x_test = preprocessor.transform(&test)?;
    let y_train = target_values(&train, &config.target)?;
    let y_test = target_values(&test, &config.target)?;
    tracing::debug!(
        "Model matrix columns ({}): {:?}",
        x_train.ncols(),
        preprocessor.feature_names()
    );
    tracing::info!("Training families {:?}", registry.names());

    let mut results = IndexMap::new();
    let mut models = IndexMap::new();

    for (name, class, spec) in registry.iter() {
        tracing::info!("Training {name} ({class})");
        let estimator = spec
            .fit(&x_train, &y_train, config.train_test_split.random_state)
            .map_err(|e| AirfareError::Model(format!("{name}: {e}")))?;

        let predicted = estimator.predict(&x_test)?;
        let metrics = calculate_metrics(&y_test, &predicted)?;
        tracing::info!(
            "{name}: MSE={:.4} MAE={:.4} RMSE={:.4} R2={:.4}",
            metrics.mse,
            metrics.mae,
            metrics.rmse,
            metrics.r2
        );

        results.insert(name.to_owned(), metrics);
        models.insert(
            name.to_owned(),
            TrainedPipeline {
                model_name: name.to_owned(),
                class: class.to_owned(),
                target: config.target.clone(),
                target_log_transformed,
                preprocessor: preprocessor.clone(),
                estimator,
            },
        );
    }

    Ok(TrainingOutcome {
        train,
        test,
        results,
        models,
    })
}

fn check_target(df: &DataFrame, target: &str) -> Result<()> {
    let column = df
        .column(target)
        .map_err(|_| AirfareError::missing_column("train_model", target))?;
    if column.dtype() == &DataType::String {
        return Err(AirfareError::Type {
            key: "train_model.target".to_owned(),
            message: format!("target column '{target}' holds text"),
        });
    }
    Ok(())
}

fn target_values(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    let values = df
        .column(target)
        .map_err(|_| AirfareError::missing_column("train_model", target))?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let values = values.f64()?;
    if values.null_count() > 0 {
        return Err(AirfareError::DataProcessing(format!(
            "target '{target}' has {} null values",
            values.null_count()
        )));
    }
    let values: Array1<f64> = values.into_no_null_iter().collect();
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(AirfareError::DataProcessing(format!(
            "target '{target}' holds non-finite value {bad}"
        )));
    }
    Ok(values)
}
