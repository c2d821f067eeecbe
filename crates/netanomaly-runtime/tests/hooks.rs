use std::path::{Path, PathBuf};

use netanomaly_model::{Booster, FeatureMatrix, Predictions};
use netanomaly_runtime::decode::JSON_CONTENT_TYPE;
use netanomaly_runtime::hooks::MODEL_FILE;
use netanomaly_runtime::{ErrorKind, InferenceHandler, ServeError, XgbHandler, invoke};
use serde_json::Value;

fn model_fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../netanomaly-model/tests/fixtures")
        .join(name)
}

/// Lay out a model directory the way the host mounts it.
fn model_dir(fixture: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(model_fixture(fixture), dir.path().join(MODEL_FILE)).unwrap();
    dir
}

fn as_f32_list(value: &Value) -> Vec<f32> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap() as f32)
        .collect()
}

#[test]
fn hooks_match_raw_model_output() {
    let dir = model_dir("anomaly_binary.ubj");
    let handler = XgbHandler;
    let model = handler.load(dir.path()).unwrap();

    let body = br#"{"instances": [[1, 2, 3, 4], [150, 20, 0.9, 5], [null, 20, 0.1, 0]]}"#;
    let response = invoke(&handler, &model, body, JSON_CONTENT_TYPE, JSON_CONTENT_TYPE).unwrap();
    let response: Value = serde_json::from_str(&response).unwrap();

    let raw = Booster::load(model_fixture("anomaly_binary.json")).unwrap();
    let rows = FeatureMatrix::from_rows(vec![
        vec![1.0, 2.0, 3.0, 4.0],
        vec![150.0, 20.0, 0.9, 5.0],
        vec![f32::NAN, 20.0, 0.1, 0.0],
    ])
    .unwrap();
    let Predictions::Scalars(expected) = raw.predict(&rows).unwrap() else {
        panic!("binary model yields one value per row");
    };

    let got = as_f32_list(&response["predictions"]);
    assert_eq!(got.len(), expected.len());
    for (got, expected) in got.iter().zip(&expected) {
        assert!((got - expected).abs() < 1e-6, "{got} != {expected}");
    }
}

#[test]
fn multiclass_hooks_emit_probability_rows() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(
        model_fixture("anomaly_multiclass.json"),
        dir.path().join(MODEL_FILE),
    )
    .unwrap();
    let model = XgbHandler.load(dir.path()).unwrap();

    let response = invoke(
        &XgbHandler,
        &model,
        br#"{"instances": [150, 20, 0.9, 0]}"#,
        "application/json; charset=utf-8",
        "application/json",
    )
    .unwrap();
    let response: Value = serde_json::from_str(&response).unwrap();
    let rows = response["predictions"].as_array().unwrap();
    assert_eq!(rows.len(), 1);

    let probs = as_f32_list(&rows[0]);
    assert_eq!(probs.len(), 3);
    assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    assert!(probs[1] > probs[0] && probs[1] > probs[2]);
}

#[test]
fn non_json_payload_is_a_client_error() {
    let dir = model_dir("anomaly_binary.json");
    let model = XgbHandler.load(dir.path()).unwrap();

    let err = invoke(&XgbHandler, &model, b"1,2,3,4\n", "text/csv", "application/json")
        .unwrap_err();
    assert!(matches!(err, ServeError::UnsupportedContentType(ref ct) if ct == "text/csv"));
    assert_eq!(err.kind(), ErrorKind::Client);
}

#[test]
fn wrong_width_surfaces_shape_mismatch() {
    let dir = model_dir("anomaly_binary.json");
    let model = XgbHandler.load(dir.path()).unwrap();

    let err = invoke(
        &XgbHandler,
        &model,
        br#"{"instances": [[1, 2, 3]]}"#,
        JSON_CONTENT_TYPE,
        JSON_CONTENT_TYPE,
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Feature shape mismatch, expected: 4, got 3");
    assert_eq!(err.kind(), ErrorKind::Client);
}

#[test]
fn load_fails_without_model_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = XgbHandler.load(Path::new(dir.path())).unwrap_err();
    assert!(matches!(err, ServeError::StartupLoad { .. }));
    assert_eq!(err.kind(), ErrorKind::Server);
}

#[test]
fn hooks_use_every_tree_while_labels_stop_early() {
    let dir = model_dir("anomaly_early_stopped.json");
    let model = XgbHandler.load(dir.path()).unwrap();
    assert_eq!(model.info().best_iteration, Some(0));

    let response = invoke(
        &XgbHandler,
        &model,
        br#"{"instances": [[1, 2, 3, 4]]}"#,
        JSON_CONTENT_TYPE,
        JSON_CONTENT_TYPE,
    )
    .unwrap();
    let response: Value = serde_json::from_str(&response).unwrap();
    let probs = as_f32_list(&response["predictions"]);
    assert!(probs[0] < 0.5);

    let row = FeatureMatrix::single_row(vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(model.predict_label(&row).unwrap(), 1);
}
