//! Training and evaluation of the configured model families.
//!
//! Every family shares one contract: the features are split with a seeded
//! shuffle, a [`Preprocessor`] is fitted on the training rows only, and each
//! estimator from the [`ModelRegistry`] is fitted on the transformed matrix
//! and scored on the test rows.
//!
//! # Example
//!
//! ```no_run
//! use airfare::config::AppConfig;
//! use airfare::training::train_and_evaluate;
//! # use polars::prelude::DataFrame;
//! # fn features() -> DataFrame { DataFrame::empty() }
//!
//! let config = AppConfig::from_file("config/default-config.yaml")?;
//! let outcome = train_and_evaluate(&features(), &config.train_model, true)?;
//! for (name, metrics) in &outcome.results {
//!     println!("{name}: RMSE {:.3}", metrics.rmse);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod ensemble;
pub mod estimators;
pub mod harness;
pub mod metrics;
pub mod preprocess;
pub mod split;
pub mod tree;

pub use estimators::{Estimator, EstimatorSpec, ModelRegistry};
pub use harness::{TrainedPipeline, TrainingOutcome, train_and_evaluate};
pub use metrics::{Metrics, calculate_metrics};
pub use preprocess::Preprocessor;
pub use split::train_test_split;
