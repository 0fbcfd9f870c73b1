//! Estimator kinds and the model registry.
//!
//! The registry maps a model family name to an [`EstimatorSpec`], resolved
//! from the `class` and `parameters` of the configuration. The set of
//! classes is closed:
//!
//! | class                                               | estimator                 |
//! |-----------------------------------------------------|---------------------------|
//! | `LinearRegression`                                  | ordinary least squares    |
//! | `RandomForestRegressor`                             | bagged regression trees   |
//! | `XGBRegressor` / `GradientBoostingRegressor`        | gradient boosted trees    |

use super::ensemble::{
    GradientBoostingModel, GradientBoostingParams, RandomForestModel, RandomForestParams,
};
use crate::config::ModelSpec;
use crate::error::{AirfareError, Result};
use indexmap::IndexMap;
use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Hyperparameters of the linear model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LinearParams {
    pub fit_intercept: bool,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            fit_intercept: true,
        }
    }
}

/// An unfitted estimator with its hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorSpec {
    Linear(LinearParams),
    RandomForest(RandomForestParams),
    GradientBoosting(GradientBoostingParams),
}

impl EstimatorSpec {
    /// Resolve one configured model family.
    ///
    /// # Errors
    ///
    /// [`AirfareError::Config`] on an unknown class, an unknown or
    /// ill-typed hyperparameter, or an out-of-range value.
    pub fn from_model_spec(name: &str, spec: &ModelSpec) -> Result<Self> {
        let params = serde_json::Value::Object(spec.parameters.clone());
        let params_key = format!("train_model.models.{name}.parameters");
        let bad_params = |e: String| AirfareError::config(params_key.clone(), e);

        match spec.class.as_str() {
            "LinearRegression" => serde_json::from_value(params)
                .map(Self::Linear)
                .map_err(|e| bad_params(e.to_string())),
            "RandomForestRegressor" => {
                let params: RandomForestParams =
                    serde_json::from_value(params).map_err(|e| bad_params(e.to_string()))?;
                params.validate().map_err(bad_params)?;
                Ok(Self::RandomForest(params))
            }
            "XGBRegressor" | "GradientBoostingRegressor" => {
                let params: GradientBoostingParams =
                    serde_json::from_value(params).map_err(|e| bad_params(e.to_string()))?;
                params.validate().map_err(bad_params)?;
                Ok(Self::GradientBoosting(params))
            }
            other => Err(AirfareError::config(
                format!("train_model.models.{name}.class"),
                format!(
                    "unknown model class '{other}' (expected LinearRegression, \
                     RandomForestRegressor or XGBRegressor)"
                ),
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Linear(_) => "linear",
            Self::RandomForest(_) => "random_forest",
            Self::GradientBoosting(_) => "gradient_boosting",
        }
    }

    /// Fit on `x`/`y`. `seed` drives any randomness the parameters leave
    /// unseeded.
    ///
    /// # Errors
    ///
    /// Fails when the data cannot be fitted (shape mismatch, singular
    /// linear system).
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<Estimator> {
        match self {
            Self::Linear(params) => LinearModel::fit(x, y, params).map(Estimator::Linear),
            Self::RandomForest(params) => {
                RandomForestModel::fit(x, y, params, seed).map(Estimator::RandomForest)
            }
            Self::GradientBoosting(params) => {
                GradientBoostingModel::fit(x, y, params, seed).map(Estimator::GradientBoosting)
            }
        }
    }
}

/// Fitted ordinary least squares model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    /// # Errors
    ///
    /// Fails when linfa cannot solve the system.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: &LinearParams) -> Result<Self> {
        let dataset = Dataset::new(x.clone(), y.clone());
        let model = LinearRegression::new()
            .with_intercept(params.fit_intercept)
            .fit(&dataset)
            .map_err(|e| AirfareError::Model(format!("Linear Regression training failed: {e}")))?;

        Ok(Self {
            coefficients: model.params().to_vec(),
            intercept: model.intercept(),
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&Array1::from(self.coefficients.clone())) + self.intercept
    }
}

/// A fitted estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    Linear(LinearModel),
    RandomForest(RandomForestModel),
    GradientBoosting(GradientBoostingModel),
}

impl Estimator {
    pub fn n_features(&self) -> usize {
        match self {
            Self::Linear(model) => model.coefficients.len(),
            Self::RandomForest(model) => model.n_features(),
            Self::GradientBoosting(model) => model.n_features(),
        }
    }

    /// # Errors
    ///
    /// Fails when `x` has a different number of columns than the model was
    /// fitted on.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features() {
            return Err(AirfareError::Model(format!(
                "model expects {} features, got {}",
                self.n_features(),
                x.ncols()
            )));
        }
        Ok(match self {
            Self::Linear(model) => model.predict(x),
            Self::RandomForest(model) => model.predict(x),
            Self::GradientBoosting(model) => model.predict(x),
        })
    }
}

/// Model families to train, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: IndexMap<String, (String, EstimatorSpec)>,
}

impl ModelRegistry {
    /// Resolve every configured family before anything is fitted.
    ///
    /// # Errors
    ///
    /// The first family that fails to resolve.
    pub fn from_config(models: &IndexMap<String, ModelSpec>) -> Result<Self> {
        let mut entries = IndexMap::with_capacity(models.len());
        for (name, spec) in models {
            let estimator = EstimatorSpec::from_model_spec(name, spec)?;
            entries.insert(name.clone(), (spec.class.clone(), estimator));
        }
        Ok(Self { entries })
    }

    /// `(family name, configured class, estimator)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &EstimatorSpec)> {
        self.entries
            .iter()
            .map(|(name, (class, spec))| (name.as_str(), class.as_str(), spec))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}
