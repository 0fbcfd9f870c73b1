//! Cleaning stage: raw flight records → canonical clean table.
//!
//! The cleaning configuration is compiled into a [`CleaningPlan`], an ordered
//! list of typed [`CleanStep`]s that are applied left to right:
//!
//! 1. **rename_cols**: rename columns
//! 2. **concat_cols**: `col1 + "-" + col2` into a new column
//! 3. **bucket_time_cols**: clock time → hour bucket name
//! 4. **time_to_hours**: duration text → hours
//! 5. **stops_cols**: stop text → stop category
//! 6. **price_cols**: strip formatting, then strict integer parse
//! 7. **selected_features**: project onto the allow-list, in order
//!
//! Steps 2 to 6 read their source column from the original (pre-rename) table,
//! so a rename never hides or shadows a source column.
//!
//! # Example
//!
//! ```no_run
//! use airfare::cleaning::clean_data;
//! use airfare::config::AppConfig;
//! use airfare::source::load_raw_data;
//!
//! let config = AppConfig::from_file("config/default-config.yaml")?;
//! let raw = load_raw_data(&config.raw_data.files)?;
//! let clean = clean_data(&raw, &config.clean_data)?;
//! println!("{} rows, {} columns", clean.height(), clean.width());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod executor;
pub mod plan;
pub mod validation;

pub use executor::apply_step;
pub use plan::{CleanStep, CleaningPlan};
pub use validation::{PlanIssue, validate_plan};

use crate::config::CleaningConfig;
use crate::error::{AirfareError, Result};
use polars::prelude::DataFrame;

/// Apply the cleaning plan described by `config` to `raw`.
///
/// The input table is left untouched; the output has exactly as many rows
/// as the input.
///
/// # Errors
///
/// - [`AirfareError::EmptyTable`] when `raw` has no rows
/// - [`AirfareError::MissingColumn`] when a step references an absent column
/// - [`AirfareError::Parse`] when a duration, stop, time or price value
///   cannot be interpreted
pub fn clean_data(raw: &DataFrame, config: &CleaningConfig) -> Result<DataFrame> {
    if raw.height() == 0 {
        return Err(AirfareError::EmptyTable {
            stage: "clean_data".to_owned(),
        });
    }

    let plan = CleaningPlan::from_config(config)?;

    let raw_columns: Vec<String> = raw
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let issues = validate_plan(&plan, &raw_columns);
    if let Some(first) = issues.first() {
        for issue in &issues {
            tracing::error!("Cleaning plan: {issue}");
        }
        return Err(first.to_error());
    }

    let mut df = raw.clone();
    for step in plan.steps() {
        df = apply_step(step, raw, df)?;
        tracing::debug!("Applied cleaning step {}", step.describe());
    }

    tracing::info!("Clean data created successfully.");
    tracing::debug!("Clean data shape: {:?}", df.shape());
    Ok(df)
}

#[cfg(test)]
mod tests;
