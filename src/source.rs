//! Raw flight data on disk.
//!
//! Raw files are CSV exports, one per fare class, named `<class>_raw.csv`.
//! Every column is read as text; the cleaning stage owns all parsing.

use crate::error::{AirfareError, Result, ResultExt as _};
use polars::prelude::*;
use std::path::Path;

/// Column added to every raw row, holding the class taken from the file name.
pub const CLASS_COLUMN: &str = "class";

/// Fare class encoded in a raw file name: `economy_raw.csv` → `economy`.
pub fn class_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.strip_suffix("_raw") {
        Some(class) => class.to_owned(),
        None => stem,
    }
}

/// Read one raw CSV file and tag its rows with the class of the file.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed as CSV.
pub fn load_raw_file(path: &Path) -> Result<DataFrame> {
    let class = class_from_path(path);
    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?
        .with_column(lit(class.as_str()).alias(CLASS_COLUMN))
        .collect()
        .with_context(|| format!("Failed to read CSV {}", path.display()))?;
    Ok(df)
}

/// Read and vertically concatenate every raw file.
///
/// Files that fail to load are logged and skipped.
///
/// # Errors
///
/// Fails when no file could be loaded, or when the loaded files disagree on
/// their columns.
pub fn load_raw_data<P: AsRef<Path>>(paths: &[P]) -> Result<DataFrame> {
    let mut combined: Option<DataFrame> = None;

    for path in paths {
        let path = path.as_ref();
        let df = match load_raw_file(path) {
            Ok(df) => df,
            Err(e) => {
                tracing::error!("Skipping {}: {e}", path.display());
                continue;
            }
        };
        tracing::info!("Loaded {} rows from {}", df.height(), path.display());

        match combined.as_mut() {
            Some(all) => {
                all.vstack_mut(&df)
                    .with_context(|| format!("Columns of {} do not match", path.display()))?;
            }
            None => combined = Some(df),
        }
    }

    let mut df = combined.ok_or_else(|| {
        AirfareError::Other(format!("None of the {} raw data files could be loaded", paths.len()))
    })?;
    df.as_single_chunk_par();
    tracing::debug!("Raw data shape: {:?}", df.shape());
    Ok(df)
}

/// Write `df` as CSV with a header row.
///
/// # Errors
///
/// Fails when the file cannot be created or written.
pub fn save_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Read a CSV written by [`save_dataset`], inferring column types.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed.
pub fn load_dataset(path: &Path) -> Result<DataFrame> {
    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(10000))
        .finish()?
        .collect()
        .with_context(|| format!("Failed to read CSV {}", path.display()))?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    #[test]
    fn test_class_from_path() {
        assert_eq!(class_from_path(Path::new("data/economy_raw.csv")), "economy");
        assert_eq!(class_from_path(Path::new("business.csv")), "business");
    }

    #[test]
    fn test_load_raw_data_tags_class() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let header = "airline,num_code,price\n";
        let economy = write(
            dir.path(),
            "economy_raw.csv",
            &format!("{header}SpiceJet,8709,\"5,953\"\nVistara,995,\"7,000\"\n"),
        )?;
        let business = write(
            dir.path(),
            "business_raw.csv",
            &format!("{header}Air India,868,\"25,612\"\n"),
        )?;

        let df = load_raw_data(&[economy, business])?;
        assert_eq!(df.height(), 3);

        let class = df.column(CLASS_COLUMN)?.as_materialized_series().str()?.clone();
        assert_eq!(class.get(0), Some("economy"));
        assert_eq!(class.get(2), Some("business"));

        // Everything stays text until cleaning
        let price = df.column("price")?.as_materialized_series().str()?.clone();
        assert_eq!(price.get(0), Some("5,953"));
        Ok(())
    }

    #[test]
    fn test_unreadable_files_are_skipped() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let good = write(dir.path(), "economy_raw.csv", "airline,price\nVistara,\"7,000\"\n")?;
        let missing = dir.path().join("business_raw.csv");

        let df = load_raw_data(&[missing.clone(), good])?;
        assert_eq!(df.height(), 1);

        assert!(load_raw_data(&[missing]).is_err());
        Ok(())
    }

    #[test]
    fn test_save_and_load_dataset() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("clean_data.csv");
        let mut df = DataFrame::new(vec![
            Column::from(Series::new("airline".into(), vec!["Vistara", "Indigo"])),
            Column::from(Series::new("price".into(), vec![5953i64, 7000])),
        ])?;

        save_dataset(&mut df, &path)?;
        let back = load_dataset(&path)?;
        assert_eq!(back.shape(), (2, 2));
        assert_eq!(back.column("price")?.dtype(), &DataType::Int64);
        Ok(())
    }
}
