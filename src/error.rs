//! Centralized error handling for the airfare pipeline.
//!
//! Every stage returns [`Result<T>`], whose error side is [`AirfareError`].
//! The variants follow the failure taxonomy of the pipeline:
//!
//! - configuration problems (unknown model class, overlapping hour buckets)
//! - schema problems (a referenced column does not exist at some stage)
//! - parse problems (text that matches none of the known grammars)
//! - everything raised by the libraries underneath (Polars, linfa, I/O)
//!
//! ```
//! use airfare::error::AirfareError;
//!
//! let err = AirfareError::missing_column("drop_columns", "airline");
//! assert_eq!(
//!     err.to_string(),
//!     "Schema error in drop_columns: column 'airline' does not exist"
//! );
//! ```
//!
//! The binary and the run orchestrator work with `anyhow`; `AirfareError`
//! implements `std::error::Error`, so `?` converts into `anyhow::Error` there.

use std::fmt;

/// Main error type for airfare operations.
#[derive(Debug)]
pub enum AirfareError {
    /// I/O errors (file operations)
    Io(std::io::Error),

    /// Missing or malformed configuration key
    Config { key: String, message: String },

    /// Referenced column absent at some stage
    MissingColumn { stage: String, column: String },

    /// Text that does not match any known grammar
    Parse {
        what: &'static str,
        input: String,
        message: String,
    },

    /// Configuration value of the wrong type
    Type { key: String, message: String },

    /// The input table has no rows
    EmptyTable { stage: String },

    /// Data processing errors raised by Polars
    DataProcessing(String),

    /// Model fitting or prediction errors
    Model(String),

    /// JSON / YAML (de)serialization errors
    Serialization(String),

    /// Generic error with context
    Other(String),
}

impl AirfareError {
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn missing_column(stage: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            stage: stage.into(),
            column: column.into(),
        }
    }

    pub fn parse(what: &'static str, input: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            what,
            input: input.to_owned(),
            message: message.into(),
        }
    }
}

impl fmt::Display for AirfareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Config { key, message } => write!(f, "Configuration error at '{key}': {message}"),
            Self::MissingColumn { stage, column } => {
                write!(f, "Schema error in {stage}: column '{column}' does not exist")
            }
            Self::Parse {
                what,
                input,
                message,
            } => write!(f, "Cannot parse {what} from {input:?}: {message}"),
            Self::Type { key, message } => write!(f, "Type error at '{key}': {message}"),
            Self::EmptyTable { stage } => write!(f, "{stage} received an empty table"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Model(msg) => write!(f, "Model error: {msg}"),
            Self::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AirfareError {}

impl From<std::io::Error> for AirfareError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<polars::error::PolarsError> for AirfareError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

impl From<linfa::Error> for AirfareError {
    fn from(err: linfa::Error) -> Self {
        Self::Model(err.to_string())
    }
}

impl From<serde_json::Error> for AirfareError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {err}"))
    }
}

impl From<serde_yaml::Error> for AirfareError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(format!("YAML error: {err}"))
    }
}

impl From<regex::Error> for AirfareError {
    fn from(err: regex::Error) -> Self {
        Self::Config {
            key: "pattern".to_owned(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for airfare operations.
pub type Result<T> = std::result::Result<T, AirfareError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<AirfareError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: AirfareError = e.into();
            AirfareError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: AirfareError = e.into();
            AirfareError::Other(format!("{}: {}", f(), err))
        })
    }
}
