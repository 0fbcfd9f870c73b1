//! Typed cleaning steps compiled from the cleaning configuration.

use crate::config::{CleaningConfig, ColumnType, HourRange};
use crate::error::{AirfareError, Result};
use crate::parsers::StopsParser;
use indexmap::IndexMap;
use regex::Regex;

/// One transformation of the cleaning stage.
#[derive(Debug, Clone)]
pub enum CleanStep {
    /// Rename columns of the working table
    Rename { mapping: IndexMap<String, String> },

    /// `target = left + "-" + right`, with `right` cast to `right_type` first
    Concat {
        target: String,
        left: String,
        right: String,
        right_type: ColumnType,
    },

    /// `target = bucket_hours(source)`
    BucketTime {
        target: String,
        source: String,
        buckets: IndexMap<String, HourRange>,
    },

    /// `target = get_duration(source)`
    ParseDuration { target: String, source: String },

    /// `target = get_stops(source)`
    ParseStops {
        target: String,
        source: String,
        parser: StopsParser,
    },

    /// Replace `pattern` with `replacement`, then parse as an integer
    CleanNumeric {
        column: String,
        pattern: Regex,
        replacement: String,
    },

    /// Keep only `columns`, in that order
    Project { columns: Vec<String> },
}

impl CleanStep {
    /// Configuration key the step was compiled from.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rename { .. } => "rename_cols",
            Self::Concat { .. } => "concat_cols",
            Self::BucketTime { .. } => "bucket_time_cols",
            Self::ParseDuration { .. } => "time_to_hours",
            Self::ParseStops { .. } => "stops_cols",
            Self::CleanNumeric { .. } => "price_cols",
            Self::Project { .. } => "selected_features",
        }
    }

    /// Column read from the original table, for derived steps.
    pub fn source_columns(&self) -> Vec<&str> {
        match self {
            Self::Concat { left, right, .. } => vec![left.as_str(), right.as_str()],
            Self::BucketTime { source, .. }
            | Self::ParseDuration { source, .. }
            | Self::ParseStops { source, .. } => vec![source.as_str()],
            Self::CleanNumeric { column, .. } => vec![column.as_str()],
            Self::Rename { .. } | Self::Project { .. } => Vec::new(),
        }
    }

    /// Column written into the working table, for derived steps.
    pub fn target_column(&self) -> Option<&str> {
        match self {
            Self::Concat { target, .. }
            | Self::BucketTime { target, .. }
            | Self::ParseDuration { target, .. }
            | Self::ParseStops { target, .. } => Some(target.as_str()),
            Self::CleanNumeric { column, .. } => Some(column.as_str()),
            Self::Rename { .. } | Self::Project { .. } => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Rename { mapping } => format!("{} ({} columns)", self.name(), mapping.len()),
            Self::Project { columns } => format!("{} ({} columns)", self.name(), columns.len()),
            _ => format!(
                "{}: {} <- {}",
                self.name(),
                self.target_column().unwrap_or_default(),
                self.source_columns().join(", ")
            ),
        }
    }
}

/// Ordered list of cleaning steps.
#[derive(Debug, Clone)]
pub struct CleaningPlan {
    steps: Vec<CleanStep>,
}

impl CleaningPlan {
    /// Compile the configuration into steps, in the fixed stage order.
    ///
    /// # Errors
    ///
    /// Fails when a regex does not compile or `stops_cols` is configured
    /// without `get_stops`.
    pub fn from_config(config: &CleaningConfig) -> Result<Self> {
        let mut steps = Vec::new();

        if !config.rename_cols.is_empty() {
            steps.push(CleanStep::Rename {
                mapping: config.rename_cols.clone(),
            });
        }

        for (target, spec) in &config.concat_cols {
            steps.push(CleanStep::Concat {
                target: target.clone(),
                left: spec.col1.clone(),
                right: spec.col2.clone(),
                right_type: spec.col_type,
            });
        }

        for (target, source) in &config.bucket_time_cols {
            steps.push(CleanStep::BucketTime {
                target: target.clone(),
                source: source.clone(),
                buckets: config.bucket_hours.clone(),
            });
        }

        for (target, source) in &config.time_to_hours {
            steps.push(CleanStep::ParseDuration {
                target: target.clone(),
                source: source.clone(),
            });
        }

        if !config.stops_cols.is_empty() {
            let stops = config.get_stops.as_ref().ok_or_else(|| {
                AirfareError::config(
                    "clean_data.get_stops",
                    "stops_cols is set but get_stops is missing",
                )
            })?;
            let parser = StopsParser::new(&stops.pattern, stops.stop_dict.clone())?;
            for (target, source) in &config.stops_cols {
                steps.push(CleanStep::ParseStops {
                    target: target.clone(),
                    source: source.clone(),
                    parser: parser.clone(),
                });
            }
        }

        for (column, spec) in &config.price_cols {
            steps.push(CleanStep::CleanNumeric {
                column: column.clone(),
                pattern: Regex::new(&spec.pattern)?,
                replacement: spec.replacement.clone(),
            });
        }

        steps.push(CleanStep::Project {
            columns: config.selected_features.clone(),
        });

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[CleanStep] {
        &self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConcatSpec, PatternReplacement, StopsConfig};

    #[test]
    fn test_plan_follows_stage_order() -> Result<()> {
        let config = CleaningConfig {
            // Declared in a different order than the stages run
            price_cols: IndexMap::from([(
                "price".to_owned(),
                PatternReplacement {
                    pattern: ",".to_owned(),
                    replacement: String::new(),
                },
            )]),
            stops_cols: IndexMap::from([("stops".to_owned(), "stop".to_owned())]),
            get_stops: Some(StopsConfig {
                pattern: "non-stop".to_owned(),
                stop_dict: IndexMap::from([("non-stop".to_owned(), 0)]),
            }),
            time_to_hours: IndexMap::from([("duration".to_owned(), "time_taken".to_owned())]),
            concat_cols: IndexMap::from([(
                "flight".to_owned(),
                ConcatSpec {
                    col1: "ch_code".to_owned(),
                    col2: "num_code".to_owned(),
                    col_type: ColumnType::Str,
                },
            )]),
            rename_cols: IndexMap::from([("from".to_owned(), "source_city".to_owned())]),
            selected_features: vec!["price".to_owned()],
            ..Default::default()
        };

        let plan = CleaningPlan::from_config(&config)?;
        let names: Vec<_> = plan.steps().iter().map(CleanStep::name).collect();
        assert_eq!(
            names,
            vec![
                "rename_cols",
                "concat_cols",
                "time_to_hours",
                "stops_cols",
                "price_cols",
                "selected_features"
            ]
        );
        Ok(())
    }

    #[test]
    fn test_invalid_price_pattern() {
        let config = CleaningConfig {
            price_cols: IndexMap::from([(
                "price".to_owned(),
                PatternReplacement {
                    pattern: "[".to_owned(),
                    replacement: String::new(),
                },
            )]),
            selected_features: vec!["price".to_owned()],
            ..Default::default()
        };
        assert!(matches!(
            CleaningPlan::from_config(&config),
            Err(AirfareError::Config { .. })
        ));
    }
}
