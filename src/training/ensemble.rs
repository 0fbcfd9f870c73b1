//! Tree ensembles: bagged random forest and gradient boosting on squared loss.

use super::tree::{RegressionTree, TreeParams};
use crate::error::{AirfareError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Named strategy for the number of features tried at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureStrategy {
    Sqrt,
    Log2,
    All,
}

/// Features considered at each split: a strategy, a count or a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxFeatures {
    Strategy(FeatureStrategy),
    Count(usize),
    Fraction(f64),
}

impl Default for MaxFeatures {
    fn default() -> Self {
        Self::Strategy(FeatureStrategy::All)
    }
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            Self::Strategy(FeatureStrategy::Sqrt) => n.sqrt().floor() as usize,
            Self::Strategy(FeatureStrategy::Log2) => n.log2().floor() as usize,
            Self::Strategy(FeatureStrategy::All) => n_features,
            Self::Count(k) => k,
            Self::Fraction(f) => (f * n).floor() as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Hyperparameters of [`RandomForestModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub random_state: Option<u64>,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::default(),
            bootstrap: true,
            random_state: None,
        }
    }
}

impl RandomForestParams {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.n_estimators == 0 {
            return Err("n_estimators must be at least 1".to_owned());
        }
        if self.min_samples_split < 2 {
            return Err("min_samples_split must be at least 2".to_owned());
        }
        if self.min_samples_leaf == 0 {
            return Err("min_samples_leaf must be at least 1".to_owned());
        }
        if let MaxFeatures::Fraction(f) = self.max_features
            && !(f > 0.0 && f <= 1.0)
        {
            return Err(format!("max_features fraction must be in (0, 1], got {f}"));
        }
        Ok(())
    }
}

/// Hyperparameters of [`GradientBoostingModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    #[serde(alias = "eta")]
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub subsample: f64,
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: None,
        }
    }
}

impl GradientBoostingParams {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.n_estimators == 0 {
            return Err("n_estimators must be at least 1".to_owned());
        }
        if !(self.learning_rate > 0.0) {
            return Err(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(format!("subsample must be in (0, 1], got {}", self.subsample));
        }
        if self.min_samples_leaf == 0 {
            return Err("min_samples_leaf must be at least 1".to_owned());
        }
        Ok(())
    }
}

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(AirfareError::Model(format!(
            "{} feature rows but {} targets",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(AirfareError::Model("cannot fit on zero rows".to_owned()));
    }
    Ok(())
}

/// Fitted random forest: the average of bootstrap-trained trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestModel {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForestModel {
    /// # Errors
    ///
    /// Fails when `x` and `y` disagree on the number of rows, or are empty.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: &RandomForestParams, seed: u64) -> Result<Self> {
        check_shapes(x, y)?;
        let n_samples = x.nrows();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: Some(params.max_features.resolve(x.ncols())),
        };
        let base_seed = params.random_state.unwrap_or(seed);

        let trees = (0..params.n_estimators)
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let rows: Vec<usize> = if params.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                RegressionTree::fit(x, y, &rows, &tree_params, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            n_features: x.ncols(),
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        let mut total = Array1::zeros(x.nrows());
        for tree in &self.trees {
            total += &tree.predict(x);
        }
        total / self.trees.len().max(1) as f64
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Fitted gradient boosting model: a base value plus shrunken residual trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingModel {
    base_prediction: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl GradientBoostingModel {
    /// # Errors
    ///
    /// Fails when `x` and `y` disagree on the number of rows, or are empty.
    pub fn fit(
        x: &Array2<f64>,
        y: &Array1<f64>,
        params: &GradientBoostingParams,
        seed: u64,
    ) -> Result<Self> {
        check_shapes(x, y)?;
        let n_samples = x.nrows();
        let base_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n_samples, base_prediction);
        let mut rng = ChaCha8Rng::seed_from_u64(params.random_state.unwrap_or(seed));
        let tree_params = TreeParams {
            max_depth: Some(params.max_depth),
            min_samples_split: 2,
            min_samples_leaf: params.min_samples_leaf,
            max_features: None,
        };

        let mut trees = Vec::with_capacity(params.n_estimators);
        for _ in 0..params.n_estimators {
            let residuals = y - &predictions;
            let rows: Vec<usize> = if params.subsample < 1.0 {
                let rows: Vec<usize> = (0..n_samples)
                    .filter(|_| rng.gen_bool(params.subsample))
                    .collect();
                if rows.is_empty() { (0..n_samples).collect() } else { rows }
            } else {
                (0..n_samples).collect()
            };

            let tree = RegressionTree::fit(x, &residuals, &rows, &tree_params, &mut rng);
            predictions.scaled_add(params.learning_rate, &tree.predict(x));
            trees.push(tree);
        }

        Ok(Self {
            base_prediction,
            learning_rate: params.learning_rate,
            trees,
            n_features: x.ncols(),
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        let mut predictions = Array1::from_elem(x.nrows(), self.base_prediction);
        for tree in &self.trees {
            predictions.scaled_add(self.learning_rate, &tree.predict(x));
        }
        predictions
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array::from_shape_fn((40, 2), |(i, j)| (i * (j + 1)) as f64 % 17.0);
        let y = x.column(0).mapv(|v| if v > 8.0 { 30.0 } else { 10.0 }) + x.column(1).mapv(|v| v * 0.1);
        (x, y)
    }

    fn mse(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
        (a - b).mapv(|d| d * d).mean().unwrap_or(f64::NAN)
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Strategy(FeatureStrategy::Sqrt).resolve(16), 4);
        assert_eq!(MaxFeatures::Strategy(FeatureStrategy::Log2).resolve(16), 4);
        assert_eq!(MaxFeatures::Strategy(FeatureStrategy::All).resolve(16), 16);
        assert_eq!(MaxFeatures::Count(40).resolve(16), 16);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(16), 8);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(16), 1);
    }

    #[test]
    fn test_params_reject_unknown_fields() -> Result<()> {
        let parsed: std::result::Result<RandomForestParams, _> =
            serde_json::from_value(serde_json::json!({"n_estimators": 5, "max_leaf": 3}));
        assert!(parsed.is_err());

        let parsed: GradientBoostingParams =
            serde_json::from_value(serde_json::json!({"eta": 0.1, "max_depth": 3}))?;
        assert_eq!(parsed.learning_rate, 0.1);
        assert_eq!(parsed.max_depth, 3);
        Ok(())
    }

    #[test]
    fn test_max_features_deserialization() -> Result<()> {
        let params: RandomForestParams =
            serde_json::from_value(serde_json::json!({"max_features": "sqrt"}))?;
        assert_eq!(params.max_features, MaxFeatures::Strategy(FeatureStrategy::Sqrt));
        let params: RandomForestParams =
            serde_json::from_value(serde_json::json!({"max_features": 3}))?;
        assert_eq!(params.max_features, MaxFeatures::Count(3));
        let params: RandomForestParams =
            serde_json::from_value(serde_json::json!({"max_features": 0.5}))?;
        assert_eq!(params.max_features, MaxFeatures::Fraction(0.5));
        Ok(())
    }

    #[test]
    fn test_random_forest_is_deterministic() -> Result<()> {
        let (x, y) = data();
        let params = RandomForestParams {
            n_estimators: 10,
            ..Default::default()
        };
        let a = RandomForestModel::fit(&x, &y, &params, 42)?;
        let b = RandomForestModel::fit(&x, &y, &params, 42)?;
        assert_eq!(a, b);
        assert_eq!(a.n_trees(), 10);
        assert!(mse(&a.predict(&x), &y) < mse(&Array1::from_elem(y.len(), y.mean().unwrap_or(0.0)), &y));
        Ok(())
    }

    #[test]
    fn test_gradient_boosting_reduces_training_error() -> Result<()> {
        let (x, y) = data();
        let few = GradientBoostingParams {
            n_estimators: 1,
            learning_rate: 0.1,
            max_depth: 2,
            ..Default::default()
        };
        let many = GradientBoostingParams {
            n_estimators: 50,
            ..few.clone()
        };
        let a = GradientBoostingModel::fit(&x, &y, &few, 0)?;
        let b = GradientBoostingModel::fit(&x, &y, &many, 0)?;
        assert!(mse(&b.predict(&x), &y) < mse(&a.predict(&x), &y));
        Ok(())
    }

    #[test]
    fn test_invalid_params() {
        let params = GradientBoostingParams {
            subsample: 0.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = RandomForestParams {
            n_estimators: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_shape_mismatch() {
        let (x, _) = data();
        let y = Array1::zeros(3);
        assert!(RandomForestModel::fit(&x, &y, &RandomForestParams::default(), 0).is_err());
    }
}
