use netanomaly_model::Predictions;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ServeError};

pub const GREETING: &str = "Network Anomaly Detection API is running!";
pub const PREDICTION_SUCCESSFUL: &str = "Prediction successful!";
pub const INVALID_REQUEST: &str = "Invalid request!";
pub const PREDICTION_FAILED: &str = "Prediction failed!";
/// Error text returned for server-side failures; the cause is only logged.
pub const INTERNAL_FAILURE: &str = "internal prediction failure";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusBody {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionBody {
    pub prediction: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionsBody {
    pub predictions: Predictions,
}

pub fn greeting() -> StatusBody {
    StatusBody {
        message: GREETING.to_string(),
    }
}

pub fn prediction(label: i64) -> PredictionBody {
    PredictionBody {
        prediction: label,
        message: PREDICTION_SUCCESSFUL.to_string(),
    }
}

/// Error envelope for the HTTP shim. Server errors never expose their cause.
pub fn error(err: &ServeError) -> ErrorBody {
    match err.kind() {
        ErrorKind::Client => ErrorBody {
            error: err.to_string(),
            message: INVALID_REQUEST.to_string(),
        },
        ErrorKind::Server => ErrorBody {
            error: INTERNAL_FAILURE.to_string(),
            message: PREDICTION_FAILED.to_string(),
        },
    }
}

/// Encode hook output as `{"predictions": [...]}`.
pub fn predictions(predictions: Predictions) -> Result<String, ServeError> {
    Ok(serde_json::to_string(&PredictionsBody { predictions })?)
}
