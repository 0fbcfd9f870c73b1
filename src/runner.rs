//! End-to-end batch run.
//!
//! A run reads the raw files, cleans them, derives features, trains every
//! configured family and writes everything it produced under
//! `<output>/<unix-timestamp>/`:
//!
//! ```text
//! runs/1718000000/
//!   config.yaml
//!   raw_data.csv  clean_data.csv  features.csv
//!   train.csv     test.csv
//!   results.yaml
//!   models/linear_regression.json ...
//! ```

use crate::artifacts;
use crate::cleaning::clean_data;
use crate::config::AppConfig;
use crate::features::{FeatureReport, generate_features};
use crate::source::{load_raw_data, save_dataset};
use crate::training::{Metrics, train_and_evaluate};
use anyhow::{Context as _, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What a run did and where it put it.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_dir: PathBuf,
    pub raw_rows: usize,
    pub clean_rows: usize,
    pub features: FeatureReport,
    pub train_rows: usize,
    pub test_rows: usize,
    pub results: IndexMap<String, Metrics>,
    pub model_paths: Vec<PathBuf>,
    /// Family with the lowest test RMSE
    pub best_model: Option<String>,
}

/// Create the timestamped directory for a new run.
pub fn create_run_dir(output: &Path) -> Result<PathBuf> {
    let stamp = chrono::Utc::now().timestamp();
    let mut run_dir = output.join(stamp.to_string());
    let mut attempt = 1;
    while run_dir.exists() {
        run_dir = output.join(format!("{stamp}_{attempt}"));
        attempt += 1;
    }
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("Failed to create run directory {}", run_dir.display()))?;
    Ok(run_dir)
}

/// Execute the whole pipeline described by `config`.
pub fn run_pipeline(config: &AppConfig) -> Result<RunReport> {
    let run_dir = create_run_dir(&config.run_config.output)?;
    tracing::info!("Starting run in {}", run_dir.display());

    std::fs::write(run_dir.join("config.yaml"), config.to_yaml()?)
        .context("Failed to write config.yaml")?;

    let mut raw = load_raw_data(&config.raw_data.files).context("Failed to load raw data")?;
    save_dataset(&mut raw, &run_dir.join("raw_data.csv"))?;

    let mut clean = clean_data(&raw, &config.clean_data).context("Cleaning failed")?;
    save_dataset(&mut clean, &run_dir.join("clean_data.csv"))?;
    tracing::info!("Cleaned {} of {} raw rows", clean.height(), raw.height());

    let (mut features, feature_report) =
        generate_features(&clean, &config.generate_features).context("Feature generation failed")?;
    save_dataset(&mut features, &run_dir.join("features.csv"))?;

    let train_config = &config.train_model;
    let target_log_transformed = config
        .generate_features
        .log_transform
        .iter()
        .any(|c| *c == train_config.target);
    let mut outcome = train_and_evaluate(&features, train_config, target_log_transformed)
        .context("Training failed")?;
    save_dataset(&mut outcome.train, &run_dir.join("train.csv"))?;
    save_dataset(&mut outcome.test, &run_dir.join("test.csv"))?;

    artifacts::save_results(&outcome.results, &run_dir.join("results.yaml"))?;
    let model_paths = artifacts::save_all_models(&outcome.models, &run_dir.join("models"))?;

    let best_model = best_model(&outcome.results);
    if let Some(best) = &best_model {
        tracing::info!("Best model: {best} (RMSE {:.4})", outcome.results[best.as_str()].rmse);
    }

    Ok(RunReport {
        run_dir,
        raw_rows: raw.height(),
        clean_rows: clean.height(),
        features: feature_report,
        train_rows: outcome.train.height(),
        test_rows: outcome.test.height(),
        results: outcome.results,
        model_paths,
        best_model,
    })
}

/// Family with the lowest finite RMSE. Ties go to the first configured.
pub fn best_model(results: &IndexMap<String, Metrics>) -> Option<String> {
    results
        .iter()
        .filter(|(_, m)| m.rmse.is_finite())
        .fold(None, |best: Option<(&String, f64)>, (name, m)| match best {
            Some((_, rmse)) if rmse <= m.rmse => best,
            _ => Some((name, m.rmse)),
        })
        .map(|(name, _)| name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(rmse: f64) -> Metrics {
        Metrics {
            mse: rmse * rmse,
            mae: rmse,
            rmse,
            r2: 0.5,
        }
    }

    #[test]
    fn test_best_model() {
        let results = IndexMap::from([
            ("linear_regression".to_owned(), metrics(3.0)),
            ("random_forest".to_owned(), metrics(1.5)),
            ("xgboost".to_owned(), metrics(1.5)),
            ("broken".to_owned(), metrics(f64::NAN)),
        ]);
        assert_eq!(best_model(&results).as_deref(), Some("random_forest"));
        assert_eq!(best_model(&IndexMap::new()), None);
    }

    #[test]
    fn test_run_dirs_do_not_collide() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let a = create_run_dir(dir.path())?;
        let b = create_run_dir(dir.path())?;
        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
        Ok(())
    }
}
