//! Container-lifecycle hooks for a managed inference host.
//!
//! The host calls [`InferenceHandler::load`] once per container, then runs
//! `decode -> predict -> encode` for every request. Errors are returned to the host
//! untouched; nothing here retries or converts them.

use std::path::{Path, PathBuf};

use netanomaly_model::{FeatureMatrix, Predictions};
use tracing::debug;

use crate::decode::decode_instances;
use crate::detector::Detector;
use crate::encode;
use crate::error::ServeError;

/// Directory the host mounts the model into.
pub const DEFAULT_MODEL_DIR: &str = "/opt/ml/model";
/// File name of the model inside the model directory.
pub const MODEL_FILE: &str = "model.xgb";
/// Documented artifact location. [`InferenceHandler::load`] takes the directory instead.
pub const DEFAULT_MODEL_PATH: &str = "/opt/ml/model/model.xgb";

/// The four-function contract fixed by the hosting runtime.
pub trait InferenceHandler {
    type Model;
    type Input;
    type Output;

    /// Load the model from the directory the host provides.
    fn load(&self, model_dir: &Path) -> Result<Self::Model, ServeError>;

    /// Parse a request body declared with `content_type`.
    fn decode(&self, body: &[u8], content_type: &str) -> Result<Self::Input, ServeError>;

    /// Run the model on decoded input.
    fn predict(&self, input: Self::Input, model: &Self::Model)
    -> Result<Self::Output, ServeError>;

    /// Serialize predictions for the response.
    fn encode(&self, output: Self::Output, accept: &str) -> Result<String, ServeError>;
}

/// Hooks serving the gradient-boosted tree model.
#[derive(Debug, Clone, Copy, Default)]
pub struct XgbHandler;

impl XgbHandler {
    pub fn model_path(model_dir: &Path) -> PathBuf {
        model_dir.join(MODEL_FILE)
    }
}

impl InferenceHandler for XgbHandler {
    type Model = Detector;
    type Input = FeatureMatrix;
    type Output = Predictions;

    fn load(&self, model_dir: &Path) -> Result<Detector, ServeError> {
        Detector::load(Self::model_path(model_dir))
    }

    fn decode(&self, body: &[u8], content_type: &str) -> Result<FeatureMatrix, ServeError> {
        decode_instances(body, content_type)
    }

    fn predict(&self, input: FeatureMatrix, model: &Detector) -> Result<Predictions, ServeError> {
        model.predict_batch(&input)
    }

    /// Always emits JSON; the requested type is only recorded.
    fn encode(&self, output: Predictions, accept: &str) -> Result<String, ServeError> {
        debug!(accept, "encoding predictions");
        encode::predictions(output)
    }
}

/// Run one request through `decode -> predict -> encode`.
pub fn invoke<H: InferenceHandler>(
    handler: &H,
    model: &H::Model,
    body: &[u8],
    content_type: &str,
    accept: &str,
) -> Result<String, ServeError> {
    let input = handler.decode(body, content_type)?;
    let output = handler.predict(input, model)?;
    handler.encode(output, accept)
}
