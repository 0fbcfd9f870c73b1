//! Pipeline configuration document.
//!
//! One YAML (or JSON) file describes a whole run. Each section is handed
//! explicitly to the stage that consumes it; nothing in the pipeline reads
//! configuration from global state.
//!
//! ```yaml
//! run_config:
//!   output: runs
//! raw_data:
//!   files: [data/economy_raw.csv, data/business_raw.csv]
//! clean_data:
//!   rename_cols: {dep_time: departure_time}
//!   bucket_hours:
//!     late_night: {min: 0, max: 4}
//!     early_morning: {min: 4, max: 8}
//!   ...
//! generate_features:
//!   drop_columns: [flight]
//!   filter_airlines: 1000
//!   log_transform: [price]
//! train_model:
//!   numerical_features: [duration, stops]
//!   categorical_features: [airline, class]
//!   train_test_split: {test_size: 0.2, random_state: 42}
//!   models:
//!     linear_regression: {class: LinearRegression, parameters: {}}
//! ```

use crate::error::{AirfareError, Result};
use crate::parsers::validate_buckets;
use crate::training::ModelRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Minimum airline group size used when `filter_airlines` is not configured.
pub const DEFAULT_MIN_FLIGHTS: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run_config: RunConfig,

    #[serde(default)]
    pub raw_data: RawDataConfig,

    pub clean_data: CleaningConfig,

    #[serde(default)]
    pub generate_features: FeatureConfig,

    pub train_model: TrainConfig,
}

impl AppConfig {
    /// Load and validate a configuration file. The format follows the file
    /// extension: `.yaml`/`.yml` or `.json`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        let config = match ext.as_str() {
            "yaml" | "yml" => Self::from_yaml(&content)?,
            "json" => Self::from_json(&content)?,
            _ => {
                return Err(AirfareError::config(
                    "config",
                    format!("unsupported configuration format '{ext}'"),
                ));
            }
        };
        tracing::info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Checks everything that can be checked before any data is read.
    pub fn validate(&self) -> Result<()> {
        self.clean_data.validate()?;
        self.generate_features.min_flights()?;
        self.train_model.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory under which each run creates a timestamped folder
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDataConfig {
    /// Local CSV files making up the raw table
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

/// Cleaning plan: per transformation class, the column mapping it applies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningConfig {
    #[serde(default)]
    pub rename_cols: IndexMap<String, String>,

    #[serde(default)]
    pub concat_cols: IndexMap<String, ConcatSpec>,

    #[serde(default)]
    pub bucket_time_cols: IndexMap<String, String>,

    #[serde(default)]
    pub bucket_hours: IndexMap<String, HourRange>,

    #[serde(default)]
    pub time_to_hours: IndexMap<String, String>,

    #[serde(default)]
    pub stops_cols: IndexMap<String, String>,

    #[serde(default)]
    pub get_stops: Option<StopsConfig>,

    #[serde(default)]
    pub price_cols: IndexMap<String, PatternReplacement>,

    pub selected_features: Vec<String>,
}

impl CleaningConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.bucket_time_cols.is_empty() {
            if self.bucket_hours.is_empty() {
                return Err(AirfareError::config(
                    "clean_data.bucket_hours",
                    "bucket_time_cols is set but no hour buckets are defined",
                ));
            }
            validate_buckets(&self.bucket_hours)?;
        }

        if !self.stops_cols.is_empty() {
            let stops = self.get_stops.as_ref().ok_or_else(|| {
                AirfareError::config(
                    "clean_data.get_stops",
                    "stops_cols is set but get_stops is missing",
                )
            })?;
            regex::Regex::new(&stops.pattern).map_err(|e| {
                AirfareError::config("clean_data.get_stops.pattern", e.to_string())
            })?;
        }

        for (col, spec) in &self.price_cols {
            regex::Regex::new(&spec.pattern).map_err(|e| {
                AirfareError::config(format!("clean_data.price_cols.{col}.pattern"), e.to_string())
            })?;
        }

        if self.selected_features.is_empty() {
            return Err(AirfareError::config(
                "clean_data.selected_features",
                "at least one column must be selected",
            ));
        }
        Ok(())
    }
}

/// New column built as `col1 + "-" + col2`, with `col2` cast first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcatSpec {
    pub col1: String,
    pub col2: String,
    #[serde(default)]
    pub col_type: ColumnType,
}

/// Type a concatenated column is cast to before joining.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    #[serde(alias = "string")]
    Str,
    #[serde(alias = "int64")]
    Int,
    #[serde(alias = "float64")]
    Float,
}

/// Half-open hour range `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub min: u32,
    pub max: u32,
}

impl HourRange {
    pub fn contains(&self, hour: u32) -> bool {
        self.min <= hour && hour < self.max
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopsConfig {
    pub pattern: String,
    pub stop_dict: IndexMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternReplacement {
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub drop_columns: Vec<String>,

    /// Kept untyped so a non-integer value surfaces as a type error naming the key
    #[serde(default)]
    pub filter_airlines: Option<serde_yaml::Value>,

    #[serde(default)]
    pub log_transform: Vec<String>,
}

impl FeatureConfig {
    /// Minimum number of flights an airline needs to be kept.
    ///
    /// # Errors
    ///
    /// Returns [`AirfareError::Type`] when the configured value is not a
    /// non-negative integer.
    pub fn min_flights(&self) -> Result<usize> {
        let Some(value) = &self.filter_airlines else {
            return Ok(DEFAULT_MIN_FLIGHTS);
        };
        value
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| AirfareError::Type {
                key: "generate_features.filter_airlines".to_owned(),
                message: format!("expected a non-negative integer, got {value:?}"),
            })
    }

    pub fn with_min_flights(mut self, min_flights: usize) -> Self {
        self.filter_airlines = Some(serde_yaml::Value::from(min_flights as u64));
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Column holding the value to predict
    #[serde(default = "default_target")]
    pub target: String,

    #[serde(default)]
    pub numerical_features: Vec<String>,

    #[serde(default)]
    pub categorical_features: Vec<String>,

    /// Drop the first category of each one-hot encoded feature
    #[serde(default)]
    pub one_hot_drop_first: bool,

    #[serde(default)]
    pub train_test_split: SplitConfig,

    pub models: IndexMap<String, ModelSpec>,
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.numerical_features.is_empty() && self.categorical_features.is_empty() {
            return Err(AirfareError::config(
                "train_model",
                "no numerical_features or categorical_features configured",
            ));
        }
        if self.models.is_empty() {
            return Err(AirfareError::config("train_model.models", "no models configured"));
        }
        self.train_test_split.validate()?;
        ModelRegistry::from_config(&self.models)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    #[serde(default = "default_random_state")]
    pub random_state: u64,
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(AirfareError::config(
                "train_model.train_test_split.test_size",
                format!("must be between 0 and 1 (exclusive), got {}", self.test_size),
            ));
        }
        Ok(())
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            random_state: default_random_state(),
        }
    }
}

/// One registered model family: algorithm identifier plus hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub class: String,

    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

fn default_output() -> PathBuf {
    PathBuf::from("runs")
}

fn default_target() -> String {
    "price".to_owned()
}

fn default_test_size() -> f64 {
    0.2
}

fn default_random_state() -> u64 {
    42
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
clean_data:
  rename_cols:
    dep_time: departure_time
  bucket_time_cols:
    dep_bucket: dep_time
  bucket_hours:
    late_night: {min: 0, max: 4}
    early_morning: {min: 4, max: 8}
    morning: {min: 8, max: 12}
    afternoon: {min: 12, max: 16}
    evening: {min: 16, max: 20}
    night: {min: 20, max: 24}
  stops_cols:
    stops: stop
  get_stops:
    pattern: 'non-stop|1-stop|2\+-stop'
    stop_dict: {non-stop: 0, 1-stop: 1, 2+-stop: 2}
  price_cols:
    price: {pattern: ',', replacement: ''}
  selected_features: [airline, dep_bucket, stops, price]
generate_features:
  filter_airlines: 3
train_model:
  numerical_features: [stops]
  categorical_features: [airline, dep_bucket]
  models:
    lr: {class: LinearRegression}
"#;

    #[test]
    fn test_load_yaml_config() -> Result<()> {
        let config = AppConfig::from_yaml(CONFIG)?;

        assert_eq!(config.run_config.output, PathBuf::from("runs"));
        assert_eq!(config.clean_data.bucket_hours.len(), 6);
        // Declaration order is preserved
        assert_eq!(
            config.clean_data.bucket_hours.keys().next().map(String::as_str),
            Some("late_night")
        );
        assert_eq!(config.generate_features.min_flights()?, 3);
        assert_eq!(config.train_model.target, "price");
        assert!((config.train_model.train_test_split.test_size - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.train_model.train_test_split.random_state, 42);
        Ok(())
    }

    #[test]
    fn test_min_flights_defaults_and_type_error() -> Result<()> {
        let config = FeatureConfig::default();
        assert_eq!(config.min_flights()?, DEFAULT_MIN_FLIGHTS);

        let config = FeatureConfig {
            filter_airlines: Some(serde_yaml::Value::from("C")),
            ..Default::default()
        };
        let err = config.min_flights().unwrap_err();
        assert!(matches!(err, AirfareError::Type { .. }));
        assert!(err.to_string().contains("filter_airlines"));
        Ok(())
    }

    #[test]
    fn test_unknown_model_class_rejected_at_load() {
        let bad = CONFIG.replace("class: LinearRegression", "class: NeuralNetwork");
        let err = AppConfig::from_yaml(&bad).unwrap_err().to_string();
        assert!(err.contains("NeuralNetwork"), "{err}");
        assert!(err.contains("train_model.models.lr"), "{err}");
    }

    #[test]
    fn test_overlapping_buckets_rejected_at_load() {
        let bad = CONFIG.replace("morning: {min: 8, max: 12}", "morning: {min: 6, max: 12}");
        let err = AppConfig::from_yaml(&bad).unwrap_err();
        assert!(matches!(err, AirfareError::Config { .. }));
        assert!(err.to_string().contains("overlap"), "{err}");
    }

    #[test]
    fn test_stops_cols_require_get_stops() {
        let config = CleaningConfig {
            stops_cols: IndexMap::from([("stops".to_owned(), "stop".to_owned())]),
            selected_features: vec!["stops".to_owned()],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("clean_data.get_stops"));
    }

    #[test]
    fn test_invalid_test_size() {
        let split = SplitConfig {
            test_size: 1.5,
            random_state: 1,
        };
        assert!(split.validate().is_err());
    }

    #[test]
    fn test_json_config_round_trip() -> Result<()> {
        let config = AppConfig::from_yaml(CONFIG)?;
        let json = serde_json::to_string(&config)?;
        let parsed = AppConfig::from_json(&json)?;
        assert_eq!(parsed.clean_data.selected_features, config.clean_data.selected_features);
        Ok(())
    }

    #[test]
    fn test_shipped_default_config_loads() -> Result<()> {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default-config.yaml");
        let config = AppConfig::from_file(path)?;
        assert_eq!(config.raw_data.files.len(), 2);
        assert!(config.train_model.one_hot_drop_first);
        assert_eq!(
            config.train_model.models.keys().collect::<Vec<_>>(),
            vec!["linear_regression", "random_forest", "xgboost"]
        );
        Ok(())
    }
}
