//! Cleaning step execution.
//!
//! Each step receives the original raw table (read-only, the source of every
//! derived column) and the working table, and returns the new working table.

use super::plan::CleanStep;
use crate::config::{ColumnType, HourRange};
use crate::error::{AirfareError, Result};
use crate::parsers::{StopsParser, bucket_hours, get_duration};
use indexmap::IndexMap;
use polars::prelude::*;
use regex::Regex;

/// Apply a single cleaning step.
///
/// # Errors
///
/// Fails with [`AirfareError::MissingColumn`] naming the step when a
/// referenced column is absent, or with the parse error of the first value
/// that cannot be interpreted.
pub fn apply_step(step: &CleanStep, original: &DataFrame, mut df: DataFrame) -> Result<DataFrame> {
    match step {
        CleanStep::Rename { mapping } => {
            for (from, to) in mapping {
                if df.column(from).is_err() {
                    return Err(AirfareError::missing_column(step.name(), from));
                }
                df.rename(from, to.as_str().into())?;
            }
            Ok(df)
        }

        CleanStep::Concat {
            target,
            left,
            right,
            right_type,
        } => {
            let left_values = text_column(original, step.name(), left)?;
            let right_values = typed_text_column(original, step.name(), right, *right_type)?;
            let joined: Vec<Option<String>> = left_values
                .into_iter()
                .zip(right_values.into_iter())
                .map(|(l, r)| match (l, r) {
                    (Some(l), Some(r)) => Some(format!("{l}-{r}")),
                    _ => None,
                })
                .collect();
            df.with_column(Series::new(target.as_str().into(), joined))?;
            tracing::debug!("New column {target} created concatenating {left} and {right}");
            Ok(df)
        }

        CleanStep::BucketTime {
            target,
            source,
            buckets,
        } => {
            let values = bucket_column(original, step.name(), source, buckets)?;
            df.with_column(Series::new(target.as_str().into(), values))?;
            tracing::debug!("New column {target} created bucketing column {source}");
            Ok(df)
        }

        CleanStep::ParseDuration { target, source } => {
            let values = text_column(original, step.name(), source)?
                .into_iter()
                .enumerate()
                .map(|(row, value)| {
                    let value = value.ok_or_else(|| missing_value("duration", source, row))?;
                    get_duration(value).map_err(|e| at_row(e, source, row))
                })
                .collect::<Result<Vec<f64>>>()?;
            df.with_column(Series::new(target.as_str().into(), values))?;
            tracing::debug!("New column {target} created converting column {source} to hours");
            Ok(df)
        }

        CleanStep::ParseStops {
            target,
            source,
            parser,
        } => {
            let values = stops_column(original, step.name(), source, parser)?;
            df.with_column(Series::new(target.as_str().into(), values))?;
            tracing::debug!("New column {target} created from column {source}");
            Ok(df)
        }

        CleanStep::CleanNumeric {
            column,
            pattern,
            replacement,
        } => {
            let values = numeric_column(original, step.name(), column, pattern, replacement)?;
            df.with_column(Series::new(column.as_str().into(), values))?;
            tracing::debug!("{column} column converted to numeric");
            Ok(df)
        }

        CleanStep::Project { columns } => {
            if let Some(missing) = columns.iter().find(|c| df.column(c).is_err()) {
                return Err(AirfareError::missing_column(step.name(), missing));
            }
            Ok(df.select(columns.iter().map(String::as_str))?)
        }
    }
}

/// Column as strings, whatever its inferred type.
fn text_column(df: &DataFrame, stage: &str, name: &str) -> Result<StringChunked> {
    let column = df
        .column(name)
        .map_err(|_| AirfareError::missing_column(stage, name))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series.str()?.clone())
}

fn typed_text_column(
    df: &DataFrame,
    stage: &str,
    name: &str,
    column_type: ColumnType,
) -> Result<StringChunked> {
    let column = df
        .column(name)
        .map_err(|_| AirfareError::missing_column(stage, name))?;
    let series = column.as_materialized_series();
    let (what, dtype) = match column_type {
        ColumnType::Str => return Ok(series.cast(&DataType::String)?.str()?.clone()),
        ColumnType::Int => ("integer", DataType::Int64),
        ColumnType::Float => ("float", DataType::Float64),
    };

    let typed = series.cast(&dtype)?;
    // A non-strict cast turns unconvertible values into nulls
    if typed.null_count() > series.null_count() {
        let before = series.cast(&DataType::String)?;
        let now_null = typed.is_null();
        let failed = before
            .str()?
            .into_iter()
            .zip(&now_null)
            .enumerate()
            .find_map(|(row, (text, now_null))| match (text, now_null) {
                (Some(text), Some(true)) => Some((row, text.to_owned())),
                _ => None,
            });
        if let Some((row, text)) = failed {
            return Err(at_row(
                AirfareError::parse(what, &text, format!("not a valid {what}")),
                name,
                row,
            ));
        }
    }
    Ok(typed.cast(&DataType::String)?.str()?.clone())
}

fn bucket_column(
    df: &DataFrame,
    stage: &str,
    source: &str,
    buckets: &IndexMap<String, HourRange>,
) -> Result<Vec<String>> {
    text_column(df, stage, source)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let value = value.ok_or_else(|| missing_value("hour", source, row))?;
            bucket_hours(value, buckets)
                .map(str::to_owned)
                .map_err(|e| at_row(e, source, row))
        })
        .collect()
}

fn stops_column(
    df: &DataFrame,
    stage: &str,
    source: &str,
    parser: &StopsParser,
) -> Result<Vec<Option<i64>>> {
    text_column(df, stage, source)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(text) => parser.parse(text).map_err(|e| at_row(e, source, row)),
            None => Ok(None),
        })
        .collect()
}

fn numeric_column(
    df: &DataFrame,
    stage: &str,
    column: &str,
    pattern: &Regex,
    replacement: &str,
) -> Result<Vec<i64>> {
    text_column(df, stage, column)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let value = value.ok_or_else(|| missing_value("integer", column, row))?;
            let stripped = pattern.replace_all(value, replacement);
            stripped.trim().parse::<i64>().map_err(|e| {
                at_row(
                    AirfareError::parse("integer", value, format!("'{stripped}': {e}")),
                    column,
                    row,
                )
            })
        })
        .collect()
}

fn missing_value(what: &'static str, column: &str, row: usize) -> AirfareError {
    at_row(AirfareError::parse(what, "", "missing value"), column, row)
}

/// Attach the column and row to a parse error.
fn at_row(err: AirfareError, column: &str, row: usize) -> AirfareError {
    match err {
        AirfareError::Parse {
            what,
            input,
            message,
        } => AirfareError::Parse {
            what,
            input,
            message: format!("{message} (column '{column}', row {row})"),
        },
        other => other,
    }
}
