//! Persisted run artifacts: fitted pipelines and the metrics summary.
//!
//! Each trained pipeline is written to `<dir>/<family>.json`; the metrics of
//! every family go to one YAML document keyed by family name.

use crate::error::{Result, ResultExt as _};
use crate::training::{Metrics, TrainedPipeline};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// File a family's pipeline is stored in, inside `dir`.
pub fn model_path(dir: &Path, family: &str) -> PathBuf {
    dir.join(format!("{family}.json"))
}

/// Write every pipeline to its own JSON file under `dir`, creating `dir`.
///
/// Returns the written paths in family order.
///
/// # Errors
///
/// Fails when the directory or a file cannot be written.
pub fn save_all_models(
    models: &IndexMap<String, TrainedPipeline>,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create model directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(models.len());
    for (family, pipeline) in models {
        let path = model_path(dir, family);
        save_model(pipeline, &path)?;
        tracing::info!("Saved {family} model to {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// # Errors
///
/// Fails when the pipeline cannot be serialized or the file written.
pub fn save_model(pipeline: &TrainedPipeline, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(pipeline)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Read a pipeline written by [`save_model`].
///
/// # Errors
///
/// Fails when the file cannot be read or does not hold a pipeline.
pub fn load_model(path: &Path) -> Result<TrainedPipeline> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model {}", path.display()))?;
    let pipeline = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse model {}", path.display()))?;
    Ok(pipeline)
}

/// Load every `*.json` pipeline in `dir`, keyed by file stem.
///
/// # Errors
///
/// Fails when the directory cannot be listed or a model cannot be loaded.
pub fn load_all_models(dir: &Path) -> Result<IndexMap<String, TrainedPipeline>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut models = IndexMap::with_capacity(paths.len());
    for path in paths {
        let family = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        models.insert(family, load_model(&path)?);
    }
    Ok(models)
}

/// Write the per-family metrics as YAML.
///
/// # Errors
///
/// Fails when the file cannot be written.
pub fn save_results(results: &IndexMap<String, Metrics>, path: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(results)?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Saved results to {}", path.display());
    Ok(())
}

/// # Errors
///
/// Fails when the file cannot be read or parsed.
pub fn load_results(path: &Path) -> Result<IndexMap<String, Metrics>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(serde_yaml::from_str(&content)?)
}
