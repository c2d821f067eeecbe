//! HTTP shim over the anomaly [`Detector`].
//!
//! | Route          | Purpose                                    |
//! |----------------|--------------------------------------------|
//! | `GET /`        | liveness greeting                          |
//! | `POST /predict`| `{"features": [...]}` to a single label    |
//! | `GET /model`   | metadata of the loaded artifact            |

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use netanomaly_model::FeatureMatrix;
use netanomaly_runtime::decode::decode_features;
use netanomaly_runtime::encode::{self, PredictionBody, StatusBody};
use netanomaly_runtime::{Detector, ErrorKind, ModelInfo, ServeError};
use tracing::{error, warn};

pub type SharedDetector = Arc<Detector>;

pub fn app(detector: SharedDetector) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .route("/model", get(model_info))
        .with_state(detector)
}

async fn home() -> Json<StatusBody> {
    Json(encode::greeting())
}

async fn model_info(State(detector): State<SharedDetector>) -> Json<ModelInfo> {
    Json(detector.info())
}

async fn predict(
    State(detector): State<SharedDetector>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PredictionBody>, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let features = decode_features(&body, content_type)?;
    let label = detector.predict_label(&FeatureMatrix::from(features))?;
    Ok(Json(encode::prediction(label)))
}

/// A failed request, rendered with the error envelope.
struct ApiError(ServeError);

impl From<ServeError> for ApiError {
    fn from(err: ServeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::Client => {
                warn!(error = %self.0, "rejected prediction request");
                StatusCode::BAD_REQUEST
            }
            ErrorKind::Server => {
                error!(error = ?self.0, "prediction failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(encode::error(&self.0))).into_response()
    }
}
