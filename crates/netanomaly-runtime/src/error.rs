use std::path::PathBuf;

use netanomaly_model::{ModelError, PredictError};

/// Who is responsible for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was malformed or does not fit the model.
    Client,
    /// The model or the service failed.
    Server,
}

/// Errors surfaced by the serving shims.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// The model artifact is missing or corrupt. Fatal at startup.
    #[error("failed to load model artifact from {}: {source}", .path.display())]
    StartupLoad {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
    /// The request declared a content type other than JSON.
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),
    /// The payload is not JSON or lacks the expected keys or values.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Tree inference failed.
    #[error(transparent)]
    Prediction(#[from] PredictError),
    /// The response could not be serialized.
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ServeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServeError::UnsupportedContentType(_) | ServeError::InvalidInput(_) => {
                ErrorKind::Client
            }
            ServeError::Prediction(err) if err.is_client_error() => ErrorKind::Client,
            ServeError::StartupLoad { .. }
            | ServeError::Prediction(_)
            | ServeError::Encode(_) => ErrorKind::Server,
        }
    }
}
