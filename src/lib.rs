//! # airfare - airline ticket price pipeline
//!
//! Turns raw flight listings into a comparison of price regression models.
//!
//! ```text
//! raw CSV files ─> source ─> cleaning ─> features ─> training ─> artifacts
//!                                                        │
//!                                     serving <── saved pipelines
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use airfare::config::AppConfig;
//! use airfare::runner::run_pipeline;
//!
//! let config = AppConfig::from_file("config/default-config.yaml")?;
//! let report = run_pipeline(&config)?;
//! for (model, metrics) in &report.results {
//!     println!("{model}: RMSE {:.2}, R2 {:.3}", metrics.rmse, metrics.r2);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`parsers`]: duration, stop-count and clock-time grammars
//! - [`cleaning`]: typed cleaning plan and its executor
//! - [`features`]: column drops, rare airline filter, log transform
//! - [`training`]: preprocessing, seeded split, estimators and metrics
//! - [`artifacts`]: saved pipelines and metrics summaries
//! - [`serving`]: offline prediction with the endpoint's request shape
//! - [`runner`]: one full batch run into a timestamped directory
//! - [`config`] and [`error`]: shared configuration and error types

#![warn(clippy::all, rust_2018_idioms)]

pub mod artifacts;
pub mod cleaning;
pub mod config;
pub mod error;
pub mod features;
pub mod logging;
pub mod parsers;
pub mod runner;
pub mod serving;
pub mod source;
pub mod training;
