//! Cleaning plan validation.
//!
//! Walks the plan against the raw column names before any row is touched,
//! tracking how each step changes the working table's columns. Every problem
//! is collected so the operator sees all of them at once.

use super::plan::{CleanStep, CleaningPlan};
use crate::error::AirfareError;
use std::collections::HashSet;

/// A column problem found while walking the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanIssue {
    /// The step references a column that does not exist at that point
    MissingColumn { step: &'static str, column: String },

    /// A rename would overwrite an existing column
    RenameCollision {
        from: String,
        to: String,
    },
}

impl PlanIssue {
    pub fn to_error(&self) -> AirfareError {
        match self {
            Self::MissingColumn { step, column } => AirfareError::missing_column(*step, column),
            Self::RenameCollision { from, to } => AirfareError::config(
                format!("clean_data.rename_cols.{from}"),
                format!("renaming to '{to}' would overwrite an existing column"),
            ),
        }
    }
}

impl std::fmt::Display for PlanIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColumn { step, column } => {
                write!(f, "{step}: column '{column}' does not exist")
            }
            Self::RenameCollision { from, to } => {
                write!(f, "rename_cols: '{from}' -> '{to}' collides with an existing column")
            }
        }
    }
}

/// Validate `plan` against the columns of the raw table.
pub fn validate_plan(plan: &CleaningPlan, raw_columns: &[String]) -> Vec<PlanIssue> {
    let raw: HashSet<&str> = raw_columns.iter().map(String::as_str).collect();
    let mut current: HashSet<String> = raw_columns.iter().cloned().collect();
    let mut issues = Vec::new();

    for step in plan.steps() {
        match step {
            CleanStep::Rename { mapping } => {
                for (from, to) in mapping {
                    if !current.contains(from) {
                        issues.push(PlanIssue::MissingColumn {
                            step: step.name(),
                            column: from.clone(),
                        });
                    } else if from != to && current.contains(to) {
                        issues.push(PlanIssue::RenameCollision {
                            from: from.clone(),
                            to: to.clone(),
                        });
                    } else {
                        current.remove(from);
                        current.insert(to.clone());
                    }
                }
            }
            CleanStep::Project { columns } => {
                for column in columns {
                    if !current.contains(column) {
                        issues.push(PlanIssue::MissingColumn {
                            step: step.name(),
                            column: column.clone(),
                        });
                    }
                }
            }
            CleanStep::Concat { .. }
            | CleanStep::BucketTime { .. }
            | CleanStep::ParseDuration { .. }
            | CleanStep::ParseStops { .. }
            | CleanStep::CleanNumeric { .. } => {
                let mut sources_ok = true;
                for source in step.source_columns() {
                    if !raw.contains(source) {
                        sources_ok = false;
                        issues.push(PlanIssue::MissingColumn {
                            step: step.name(),
                            column: source.to_owned(),
                        });
                    }
                }
                if sources_ok && let Some(target) = step.target_column() {
                    current.insert(target.to_owned());
                }
            }
        }
    }

    issues
}
