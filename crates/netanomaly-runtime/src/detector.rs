use std::path::Path;

use netanomaly_model::{
    ArtifactInfo, Booster, BoosterKind, FeatureMatrix, PredictError, Predictions,
};
use serde::Serialize;
use tracing::debug;

use crate::error::ServeError;

/// Metadata describing the model being served.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub booster: BoosterKind,
    pub objective: String,
    pub num_feature: usize,
    pub num_class: usize,
    pub num_trees: usize,
    pub best_iteration: Option<usize>,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Immutable prediction service built once at startup and shared by every request.
#[derive(Debug)]
pub struct Detector {
    booster: Booster,
    artifact: ArtifactInfo,
}

impl Detector {
    /// Load the model artifact. Any failure is a [`ServeError::StartupLoad`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServeError> {
        let path = path.as_ref();
        let (booster, artifact) =
            Booster::load_with_info(path).map_err(|source| ServeError::StartupLoad {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(booster, artifact))
    }

    pub fn new(booster: Booster, artifact: ArtifactInfo) -> Self {
        Self { booster, artifact }
    }

    pub fn info(&self) -> ModelInfo {
        let summary = self.booster.summary();
        ModelInfo {
            booster: summary.booster,
            objective: summary.objective,
            num_feature: summary.num_feature,
            num_class: summary.num_class,
            num_trees: summary.num_trees,
            best_iteration: summary.best_iteration,
            sha256: self.artifact.sha256.clone(),
            size_bytes: self.artifact.size_bytes,
        }
    }

    /// Class label of the first row. Early-stopped models vote with their best rounds only.
    pub fn predict_label(&self, features: &FeatureMatrix) -> Result<i64, ServeError> {
        let labels = self.booster.predict_labels(features)?;
        let label = labels.first().copied().ok_or(PredictError::EmptyInput)?;
        debug!(label, "label predicted");
        Ok(label)
    }

    /// Raw model output for every row, in row order.
    pub fn predict_batch(&self, matrix: &FeatureMatrix) -> Result<Predictions, ServeError> {
        let predictions = self.booster.predict(matrix)?;
        debug!(rows = predictions.len(), "batch predicted");
        Ok(predictions)
    }
}
