//! Feature stage: clean table → model-ready feature table.
//!
//! Three operations, applied in order:
//!
//! 1. drop the configured columns
//! 2. remove every row whose airline has too few flights
//! 3. replace the configured columns by their natural logarithm
//!
//! Rows are removed, never imputed. Non-positive values under the log
//! transform become `-inf`/`NaN` and are left in place; they are counted in
//! the [`FeatureReport`] and logged as warnings.

use crate::config::FeatureConfig;
use crate::error::{AirfareError, Result};
use indexmap::IndexMap;
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

/// Column grouped on by [`filter_airlines`].
pub const AIRLINE_COLUMN: &str = "airline";

/// Data-quality summary of one feature stage run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureReport {
    pub rows_before: usize,
    pub rows_after: usize,

    /// Airline groups removed by the filter, with their sizes
    pub dropped_airlines: IndexMap<String, usize>,

    /// Per log-transformed column, how many values came out non-finite
    pub non_finite: IndexMap<String, usize>,
}

/// Run the whole feature stage.
///
/// # Errors
///
/// Schema errors for absent columns, and [`AirfareError::Type`] when
/// `filter_airlines` is not an integer.
pub fn generate_features(
    clean: &DataFrame,
    config: &FeatureConfig,
) -> Result<(DataFrame, FeatureReport)> {
    let min_flights = config.min_flights()?;
    let mut report = FeatureReport {
        rows_before: clean.height(),
        ..Default::default()
    };

    let df = drop_columns(clean, &config.drop_columns)?;
    tracing::debug!("Dropped columns {:?}", config.drop_columns);

    let (df, dropped) = filter_airlines(&df, min_flights)?;
    for (airline, count) in &dropped {
        tracing::info!("Removed airline {airline} ({count} flights, minimum {min_flights})");
    }
    report.dropped_airlines = dropped;

    let (df, non_finite) = log_transform(&df, &config.log_transform)?;
    for (column, count) in &non_finite {
        if *count > 0 {
            tracing::warn!("{count} non-finite values in {column} after log transform");
        }
    }
    report.non_finite = non_finite;
    report.rows_after = df.height();

    tracing::info!("Features generated successfully.");
    tracing::debug!("Features shape: {:?}", df.shape());
    Ok((df, report))
}

/// Remove `columns` from the table.
///
/// # Errors
///
/// Fails with a schema error on the first column that does not exist.
pub fn drop_columns(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    if let Some(missing) = columns.iter().find(|c| df.column(c).is_err()) {
        return Err(AirfareError::missing_column("drop_columns", missing));
    }
    Ok(df.drop_many(columns.iter().map(String::as_str)))
}

/// Keep rows whose airline appears strictly more than `min_flights` times.
///
/// Rows without an airline belong to no group and are removed. Returns the
/// filtered table and the removed groups with their sizes, in first-seen
/// order.
///
/// # Errors
///
/// Fails with a schema error when the table has no `airline` column.
pub fn filter_airlines(
    df: &DataFrame,
    min_flights: usize,
) -> Result<(DataFrame, IndexMap<String, usize>)> {
    let airlines = df
        .column(AIRLINE_COLUMN)
        .map_err(|_| AirfareError::missing_column("filter_airlines", AIRLINE_COLUMN))?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let airlines = airlines.str()?;

    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for airline in airlines.into_iter().flatten() {
        *counts.entry(airline).or_default() += 1;
    }

    let keep: HashMap<&str, bool> = counts
        .iter()
        .map(|(airline, count)| (*airline, *count > min_flights))
        .collect();
    let mask: BooleanChunked = airlines
        .into_iter()
        .map(|airline| airline.and_then(|a| keep.get(a).copied()).unwrap_or(false))
        .collect();

    let dropped = counts
        .into_iter()
        .filter(|(_, count)| *count <= min_flights)
        .map(|(airline, count)| (airline.to_owned(), count))
        .collect();

    Ok((df.filter(&mask)?, dropped))
}

/// Replace each of `columns` by its natural logarithm.
///
/// Returns the new table and, per column, the number of non-finite results.
///
/// # Errors
///
/// Fails with a schema error when a column does not exist, or when it cannot
/// be read as a number.
pub fn log_transform(
    df: &DataFrame,
    columns: &[String],
) -> Result<(DataFrame, IndexMap<String, usize>)> {
    let mut out = df.clone();
    let mut non_finite = IndexMap::new();

    for name in columns {
        let values = df
            .column(name)
            .map_err(|_| AirfareError::missing_column("log_transform", name))?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let logged: Float64Chunked = values
            .f64()?
            .into_iter()
            .map(|v| v.map(f64::ln))
            .collect();
        let bad = logged.into_iter().flatten().filter(|v| !v.is_finite()).count();

        out.with_column(logged.into_series().with_name(name.as_str().into()))?;
        non_finite.insert(name.clone(), bad);
    }

    Ok((out, non_finite))
}
