//! Offline prediction with the request/response shape of the price endpoint.
//!
//! A request names a model family and carries one flight record:
//!
//! ```json
//! {"Model": "linear_regression",
//!  "Data": {"airline": "Vistara", "duration": 2.25, "stops": 0, "class": "economy"}}
//! ```
//!
//! The answer is either `{"prediction": 5953.2}` or `{"error": "..."}`, paired
//! with an HTTP-style status code.

use crate::error::{AirfareError, Result};
use crate::training::TrainedPipeline;
use indexmap::IndexMap;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Incoming request. Both keys are optional so a missing one can be
/// reported as a client error instead of a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(rename = "Data", default)]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,

    #[serde(rename = "Model", default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictResponse {
    Prediction { prediction: f64 },
    Error { error: String },
}

/// A response and its status code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub status: u16,
    pub body: PredictResponse,
}

impl Reply {
    fn ok(prediction: f64) -> Self {
        Self {
            status: 200,
            body: PredictResponse::Prediction { prediction },
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: PredictResponse::Error {
                error: message.into(),
            },
        }
    }
}

/// Loaded pipelines, keyed by model family name.
#[derive(Debug, Clone, Default)]
pub struct Predictor {
    models: IndexMap<String, TrainedPipeline>,
}

impl Predictor {
    pub fn new(models: IndexMap<String, TrainedPipeline>) -> Self {
        Self { models }
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    /// Answer a raw JSON request body.
    pub fn handle_json(&self, body: &str) -> Reply {
        match serde_json::from_str::<PredictRequest>(body) {
            Ok(request) => self.handle(&request),
            Err(e) => Reply::error(400, format!("Invalid request body: {e}")),
        }
    }

    /// Answer a parsed request.
    ///
    /// 400 for a missing key, an unknown model or a record the preprocessor
    /// cannot use; 500 when the model itself fails.
    pub fn handle(&self, request: &PredictRequest) -> Reply {
        let (Some(data), Some(model_name)) = (&request.data, &request.model) else {
            return Reply::error(400, "Data and Model keys are required in the request body");
        };
        tracing::debug!("Prediction requested from model {model_name}");

        let Some(pipeline) = self.models.get(model_name) else {
            return Reply::error(400, format!("Model {model_name} not found in memory"));
        };

        let x = match record_frame(data).and_then(|df| pipeline.preprocessor().transform(&df)) {
            Ok(x) => x,
            Err(e) => {
                tracing::warn!("Rejected record for {model_name}: {e}");
                return Reply::error(400, format!("Invalid Data: {e}"));
            }
        };

        let raw = match pipeline.estimator().predict(&x) {
            Ok(p) => p.get(0).copied().unwrap_or(f64::NAN),
            Err(e) => {
                tracing::error!("Prediction failed for {model_name}: {e}");
                return Reply::error(500, format!("Error during prediction: {e}"));
            }
        };
        let prediction = if pipeline.target_log_transformed {
            raw.exp()
        } else {
            raw
        };

        if prediction.is_finite() {
            Reply::ok(prediction)
        } else {
            Reply::error(500, format!("Error during response creation: prediction is {prediction}"))
        }
    }
}

/// One-row table from a JSON record. Numbers and booleans become `f64`
/// columns, strings become text columns, nulls become null text.
fn record_frame(record: &serde_json::Map<String, serde_json::Value>) -> Result<DataFrame> {
    use serde_json::Value;

    let columns = record
        .iter()
        .map(|(name, value)| {
            let name: PlSmallStr = name.as_str().into();
            let series = match value {
                Value::Number(n) => Series::new(name, [n.as_f64()]),
                Value::Bool(b) => Series::new(name, [Some(f64::from(u8::from(*b)))]),
                Value::String(s) => Series::new(name, [Some(s.as_str())]),
                Value::Null => Series::new(name, [Option::<&str>::None]),
                Value::Array(_) | Value::Object(_) => {
                    return Err(AirfareError::Type {
                        key: format!("Data.{name}"),
                        message: "expected a number or a string".to_owned(),
                    });
                }
            };
            Ok(Column::from(series))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DataFrame::new(columns)?)
}
