//! Request decoding for both shims.
//!
//! Only JSON payloads are accepted. JSON has no `NaN`, so `null` marks a missing feature.
//! Dimensionality is not checked here; the model reports a mismatched feature count.

use derive_more::Deref;
use netanomaly_model::FeatureMatrix;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ServeError;

/// The only supported request and response media type.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Feature vector of a single-row HTTP request.
#[derive(Debug, Clone, PartialEq, Deref)]
pub struct Features(pub Vec<f32>);

impl From<Features> for FeatureMatrix {
    fn from(features: Features) -> Self {
        FeatureMatrix::single_row(features.0)
    }
}

#[derive(Deserialize)]
struct FeaturesRequest {
    features: Vec<Option<f64>>,
}

#[derive(Deserialize)]
struct InstancesRequest {
    instances: Value,
}

/// Check that a declared content type is JSON.
///
/// Parameters such as `charset` are ignored and the media type is compared
/// case-insensitively.
pub fn ensure_json(content_type: &str) -> Result<(), ServeError> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case(JSON_CONTENT_TYPE) {
        Ok(())
    } else {
        Err(ServeError::UnsupportedContentType(content_type.to_string()))
    }
}

/// Decode `{"features": [f1, ..., fn]}` into a single feature vector.
pub fn decode_features(body: &[u8], content_type: &str) -> Result<Features, ServeError> {
    ensure_json(content_type)?;
    let request: FeaturesRequest = serde_json::from_slice(body)
        .map_err(|err| ServeError::InvalidInput(format!("Failed to decode JSON object: {err}")))?;
    Ok(Features(request.features.into_iter().map(to_feature).collect()))
}

/// Decode `{"instances": [[...], [...]]}` into a feature matrix.
///
/// A flat numeric list is read as a batch of one row.
pub fn decode_instances(body: &[u8], content_type: &str) -> Result<FeatureMatrix, ServeError> {
    ensure_json(content_type)?;
    let request: InstancesRequest = serde_json::from_slice(body)
        .map_err(|err| ServeError::InvalidInput(format!("Failed to decode JSON object: {err}")))?;

    let Value::Array(items) = request.instances else {
        return Err(ServeError::InvalidInput(
            "instances must be a list of feature rows".to_string(),
        ));
    };

    if items.iter().all(Value::is_array) {
        let rows = items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Array(values) => numeric_row(values, index),
                other => Err(ServeError::InvalidInput(format!(
                    "row {index}: expected a list of numbers, got {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        FeatureMatrix::from_rows(rows).map_err(|err| ServeError::InvalidInput(err.to_string()))
    } else {
        Ok(FeatureMatrix::single_row(numeric_row(&items, 0)?))
    }
}

fn numeric_row(values: &[Value], row: usize) -> Result<Vec<f32>, ServeError> {
    values
        .iter()
        .enumerate()
        .map(|(col, value)| match value {
            Value::Number(number) => number.as_f64().map(|v| v as f32).ok_or_else(|| {
                ServeError::InvalidInput(format!("row {row}, column {col}: {number} is not a float"))
            }),
            Value::Null => Ok(f32::NAN),
            other => Err(ServeError::InvalidInput(format!(
                "row {row}, column {col}: expected a number, got {other}"
            ))),
        })
        .collect()
}

fn to_feature(value: Option<f64>) -> f32 {
    value.map_or(f32::NAN, |v| v as f32)
}
