// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! External bridge backend tests using small shell scripts as the bridge

#![cfg(unix)]

use paddleocr_api::config::{Backend, EngineConfig};
use paddleocr_api::vision::{initialize, normalize, report_device, OcrError};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const GPU_ENVELOPE: &str = concat!(
    r#"echo '{"result": [[[[[0,0],[10,0],[10,5],[0,5]], ["INVOICE", 0.987]]]], "#,
    r#""device": "gpu:0", "cuda_available": true}'"#,
);

fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn bridge_config(command: &Path) -> EngineConfig {
    EngineConfig {
        backend: Backend::Bridge,
        bridge_command: command.display().to_string(),
        ..EngineConfig::default()
    }
}

#[test]
fn test_bridge_envelope_reports_gpu() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "bridge.sh", GPU_ENVELOPE);

    let engine = initialize(&bridge_config(&script)).unwrap();
    assert_eq!(engine.name(), "bridge");

    let raw = engine.run(Path::new("invoice.png")).unwrap();
    let records = normalize(&raw);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text(), "INVOICE");
    assert_eq!(report_device(engine.as_ref()), "gpu:0");
}

#[test]
fn test_bridge_receives_language_and_image() {
    let dir = TempDir::new().unwrap();
    // Echo the arguments back as a dictionary page
    let script = write_script(
        &dir,
        "args.sh",
        r#"printf '[{"rec_texts": ["%s"], "rec_scores": [1.0], "rec_polys": [[]]}]' "$*""#,
    );

    let engine = initialize(&bridge_config(&script)).unwrap();
    let raw = engine.run(Path::new("/tmp/temp_img_x.png")).unwrap();
    let records = normalize(&raw);

    assert_eq!(
        records[0].text(),
        "--lang en --use-angle-cls /tmp/temp_img_x.png"
    );
    // A bare result carries no device information
    assert_eq!(report_device(engine.as_ref()), "cpu");
}

#[test]
fn test_bridge_non_json_output() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "garbage.sh", "echo 'loading models...'");

    let engine = initialize(&bridge_config(&script)).unwrap();
    let result = engine.run(Path::new("invoice.png"));
    assert!(matches!(result, Err(OcrError::InvalidOutput(_))));
}

#[test]
fn test_bridge_failure_includes_stderr() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "fail.sh", "echo 'CUDA out of memory' >&2\nexit 3");

    let engine = initialize(&bridge_config(&script)).unwrap();
    let err = engine.run(Path::new("invoice.png")).unwrap_err();
    assert!(matches!(err, OcrError::Bridge(_)));
    assert!(err.to_string().contains("CUDA out of memory"));
}

#[test]
fn test_missing_bridge_fails_initialization() {
    let config = bridge_config(Path::new("/nonexistent/paddleocr-bridge"));
    assert!(matches!(
        initialize(&config),
        Err(OcrError::ModelNotFound(_))
    ));
}
