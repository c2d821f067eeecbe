//! # Netanomaly Model
//!
//! Inference-only reader for gradient-boosted tree models used to classify network traffic.
//!
//! The model artifact is the document written by the training library's `save_model`, in
//! either of its self-describing encodings:
//! - JSON (`model.json`)
//! - Universal Binary JSON (`model.ubj`, and `model.xgb` written by recent releases)
//!
//! Python pickles and the retired legacy binary format are rejected with a descriptive error.
//!
//! # Features
//! - `gbtree` and `dart` boosters with numerical splits and missing-value routing.
//! - Output transforms for the binary, multi-class, regression, count and ranking objectives.
//! - Structural validation at load time so that inference never indexes out of bounds.
//!
//! ```no_run
//! use netanomaly_model::{Booster, FeatureMatrix};
//!
//! let booster = Booster::load("xgboost_model.json")?;
//! let row = FeatureMatrix::single_row(vec![0.0, 181.0, 0.0, 9.0]);
//! let labels = booster.predict_labels(&row)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod artifact;
mod booster;
mod error;
mod matrix;
mod objective;
mod schema;
mod tree;

pub mod ubjson;

#[doc(inline)]
pub use artifact::{ArtifactInfo, Encoding, detect_encoding, read_artifact, sha256_hex};
#[doc(inline)]
pub use booster::{Booster, BoosterKind, ModelSummary};
#[doc(inline)]
pub use error::{ModelError, PredictError};
#[doc(inline)]
pub use matrix::{FeatureMatrix, Predictions, RaggedRows};
#[doc(inline)]
pub use objective::Objective;
pub use tree::Tree;
