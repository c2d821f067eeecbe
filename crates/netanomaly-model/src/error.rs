use crate::ubjson::UbjsonError;

/// Errors returned while reading a model artifact.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The JSON model document could not be parsed.
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),
    /// The UBJSON model document could not be parsed.
    #[error("UBJSON decode error: {0}")]
    Ubjson(#[from] UbjsonError),
    /// The artifact is neither a JSON nor a UBJSON model document.
    #[error("Unsupported artifact format: {0}")]
    UnsupportedFormat(String),
    /// The model uses a feature this reader does not evaluate.
    #[error("Unsupported model: {0}")]
    Unsupported(String),
    /// The model document is structurally inconsistent.
    #[error("Invalid model: {0}")]
    Invalid(String),
}

/// Errors returned by tree inference.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictError {
    /// A row does not carry the number of features the model was trained on.
    #[error("Feature shape mismatch, expected: {expected}, got {got}")]
    FeatureShapeMismatch { expected: usize, got: usize },
    /// No rows were given.
    #[error("input contains no rows")]
    EmptyInput,
    /// The model produced an inconsistent result while being evaluated.
    #[error("model evaluation failed: {0}")]
    Internal(String),
}

impl PredictError {
    /// Whether the error was caused by the caller's input rather than by the model.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictError::FeatureShapeMismatch { .. } | PredictError::EmptyInput
        )
    }
}
