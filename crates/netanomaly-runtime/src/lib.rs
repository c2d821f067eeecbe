//! # Netanomaly Runtime
//!
//! The serving layer shared by the HTTP shim and the container hooks. It turns request
//! payloads into feature matrices, runs them through the loaded model and wraps the results
//! in the envelope each host expects.
//!
//! # Features
//! - [`Detector`], the immutable prediction service built once at startup.
//! - JSON request decoding with content-type checks.
//! - Response envelopes for the HTTP shim and the container hooks.
//! - [`hooks::InferenceHandler`], the `load / decode / predict / encode` host contract.
//! - Error taxonomy that separates client mistakes from model failures.
//! - Telemetry and command line configuration for the binary.

mod detector;
mod error;

pub mod cli;
pub mod decode;
pub mod encode;
pub mod hooks;
pub mod telemetry;

#[doc(inline)]
pub use detector::{Detector, ModelInfo};
#[doc(inline)]
pub use error::{ErrorKind, ServeError};
#[doc(inline)]
pub use hooks::{InferenceHandler, XgbHandler, invoke};

pub use netanomaly_model as model;
