// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! OCR endpoint tests
//!
//! These tests verify that:
//! - Uploads are persisted, processed and normalized into records
//! - Missing files and unsupported extensions are rejected with 400
//! - Oversized uploads are rejected with 413
//! - An uninitialized engine answers 503 before the body is inspected
//! - Engine failures and timeouts map to 500 and 504
//! - No temp file survives any request

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use paddleocr_api::{
    api::http_server::{create_app, AppState},
    config::ServiceConfig,
    vision::{EngineHandle, OcrEngine, OcrError, RawResult},
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

const BOUNDARY: &str = "----paddleocr-test-boundary";

/// Engine returning a canned raw result and recording what it saw
struct CannedEngine {
    raw: RawResult,
    device: &'static str,
    seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl CannedEngine {
    fn new(raw: RawResult) -> Self {
        Self {
            raw,
            device: "cpu",
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl OcrEngine for CannedEngine {
    fn name(&self) -> &'static str {
        "canned"
    }

    fn run(&self, image_path: &Path) -> Result<RawResult, OcrError> {
        self.seen
            .lock()
            .unwrap()
            .push((image_path.to_path_buf(), image_path.exists()));
        Ok(self.raw.clone())
    }

    fn gpu_compiled(&self) -> Result<bool, OcrError> {
        Ok(self.device.contains("gpu"))
    }

    fn current_device(&self) -> Result<String, OcrError> {
        Ok(self.device.to_string())
    }
}

struct FailingEngine;

impl OcrEngine for FailingEngine {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn run(&self, _image_path: &Path) -> Result<RawResult, OcrError> {
        Err(OcrError::Inference("model exploded".to_string()))
    }

    fn gpu_compiled(&self) -> Result<bool, OcrError> {
        Ok(false)
    }

    fn current_device(&self) -> Result<String, OcrError> {
        Ok("cpu".to_string())
    }
}

/// Engine outliving a 1s timeout, recording whether its input survived
#[derive(Default)]
struct SlowEngine {
    image_present_at_end: Mutex<Option<bool>>,
}

impl OcrEngine for SlowEngine {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn run(&self, image_path: &Path) -> Result<RawResult, OcrError> {
        std::thread::sleep(Duration::from_millis(1500));
        *self.image_present_at_end.lock().unwrap() = Some(image_path.exists());
        Ok(json!([]))
    }

    fn gpu_compiled(&self) -> Result<bool, OcrError> {
        Ok(false)
    }

    fn current_device(&self) -> Result<String, OcrError> {
        Ok("cpu".to_string())
    }
}

fn config_in(dir: &TempDir) -> ServiceConfig {
    ServiceConfig {
        temp_dir: dir.path().to_path_buf(),
        ..ServiceConfig::default()
    }
}

fn app_with_engine(engine: Arc<dyn OcrEngine>, config: ServiceConfig) -> Router {
    let handle = EngineHandle::new(engine).with_timeout(config.ocr_timeout());
    create_app(AppState::new(handle, config))
}

/// Multipart body with a single field
fn multipart_body(field: &str, filename: Option<&str>, content: &[u8]) -> Vec<u8> {
    let disposition = match filename {
        Some(name) => format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, name
        ),
        None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", field),
    };

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(disposition.as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn assert_dir_empty(dir: &TempDir) {
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);
}

#[tokio::test]
async fn test_ocr_legacy_result() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(CannedEngine::new(json!([[
        [[[0, 0], [10, 0], [10, 5], [0, 5]], ["INVOICE", 0.987]]
    ]])));
    let app = app_with_engine(engine.clone(), config_in(&dir));

    let body = multipart_body("file", Some("invoice.png"), b"not really a png");
    let (status, json) = send(app, upload_request("/ocr/", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({
            "device": "cpu",
            "results": [{
                "text": "INVOICE",
                "confidence": 0.987,
                "bounding_box": [[0, 0], [10, 0], [10, 5], [0, 5]]
            }],
            "total_text_regions": 1,
            "success": true
        })
    );

    // The engine saw a request-scoped file that existed during the call
    let seen = engine.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (path, existed) = &seen[0];
    assert!(existed);
    let name = path.file_name().unwrap().to_string_lossy();
    assert!(name.starts_with("temp_img_") && name.ends_with(".png"));

    assert_dir_empty(&dir);
}

#[tokio::test]
async fn test_ocr_dict_result_without_trailing_slash() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(CannedEngine::new(json!([{
        "rec_texts": ["TOTAL", "$50", "  "],
        "rec_scores": [0.91234, 0.8, 0.99],
        "rec_polys": [
            [[0, 0], [4, 0], [4, 2], [0, 2]],
            [5.7, 0, 9, 0, 9, 2, 5, 2],
            [[0, 0], [1, 0], [1, 1], [0, 1]]
        ]
    }])));
    let app = app_with_engine(engine, config_in(&dir));

    let body = multipart_body("file", Some("receipt.JPG"), b"jpeg bytes");
    let (status, json) = send(app, upload_request("/ocr", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_text_regions"], 2);
    assert_eq!(json["results"][0]["text"], "TOTAL");
    assert_eq!(json["results"][0]["confidence"], 0.912);
    assert_eq!(json["results"][1]["text"], "$50");
    assert_eq!(json["results"][1]["bounding_box"], json!([[5, 0], [9, 0], [9, 2], [5, 2]]));
    assert_dir_empty(&dir);
}

#[tokio::test]
async fn test_ocr_empty_result() {
    let dir = TempDir::new().unwrap();
    let app = app_with_engine(Arc::new(CannedEngine::new(json!([]))), config_in(&dir));

    let body = multipart_body("file", Some("blank.webp"), b"webp");
    let (status, json) = send(app, upload_request("/ocr/", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"], json!([]));
    assert_eq!(json["total_text_regions"], 0);
    assert_eq!(json["success"], true);
}

#[tokio::test]
async fn test_ocr_reports_gpu_device() {
    let dir = TempDir::new().unwrap();
    let engine = CannedEngine {
        device: "gpu:0",
        ..CannedEngine::new(json!([]))
    };
    let app = app_with_engine(Arc::new(engine), config_in(&dir));

    let body = multipart_body("file", Some("scan.bmp"), b"bmp");
    let (status, json) = send(app, upload_request("/ocr/", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["device"], "gpu:0");
}

#[tokio::test]
async fn test_ocr_rejects_unsupported_format() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(CannedEngine::new(json!([])));
    let app = app_with_engine(engine.clone(), config_in(&dir));

    let body = multipart_body("file", Some("malware.exe"), b"MZ");
    let (status, json) = send(app, upload_request("/ocr/", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["error"],
        "Unsupported file format: exe. Supported formats: jpg, jpeg, png, bmp, tiff, webp"
    );
    assert_eq!(json["success"], false);
    assert!(engine.seen.lock().unwrap().is_empty());
    assert_dir_empty(&dir);
}

#[tokio::test]
async fn test_ocr_missing_file_field() {
    let dir = TempDir::new().unwrap();
    let app = app_with_engine(Arc::new(CannedEngine::new(json!([]))), config_in(&dir));

    let body = multipart_body("document", Some("invoice.png"), b"png");
    let (status, json) = send(app, upload_request("/ocr/", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file provided");
    assert_eq!(json["error_type"], "bad_request");
}

#[tokio::test]
async fn test_ocr_missing_filename() {
    let dir = TempDir::new().unwrap();
    let app = app_with_engine(Arc::new(CannedEngine::new(json!([]))), config_in(&dir));

    let body = multipart_body("file", None, b"png");
    let (status, json) = send(app, upload_request("/ocr/", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file provided");
}

#[tokio::test]
async fn test_ocr_non_multipart_body() {
    let dir = TempDir::new().unwrap();
    let app = app_with_engine(Arc::new(CannedEngine::new(json!([]))), config_in(&dir));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/ocr/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, json) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file provided");
}

#[tokio::test]
async fn test_ocr_payload_too_large() {
    let dir = TempDir::new().unwrap();
    let config = ServiceConfig {
        max_upload_bytes: 16,
        ..config_in(&dir)
    };
    let engine = Arc::new(CannedEngine::new(json!([])));
    let app = app_with_engine(engine.clone(), config);

    let body = multipart_body("file", Some("huge.tiff"), &[0u8; 256]);
    let (status, json) = send(app, upload_request("/ocr/", body)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error_type"], "payload_too_large");
    assert!(engine.seen.lock().unwrap().is_empty());
    assert_dir_empty(&dir);
}

#[tokio::test]
async fn test_ocr_unavailable_engine_checked_first() {
    let dir = TempDir::new().unwrap();
    let app = create_app(AppState::unavailable(config_in(&dir), "models missing"));

    // Even a malformed request gets 503
    let body = multipart_body("file", Some("malware.exe"), b"MZ");
    let (status, json) = send(app, upload_request("/ocr/", body)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "PaddleOCR service is not available");
    assert_eq!(json["success"], false);
    assert_dir_empty(&dir);
}

#[tokio::test]
async fn test_ocr_engine_failure() {
    let dir = TempDir::new().unwrap();
    let app = app_with_engine(Arc::new(FailingEngine), config_in(&dir));

    let body = multipart_body("file", Some("invoice.jpeg"), b"jpeg");
    let (status, json) = send(app, upload_request("/ocr/", body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("model exploded"));
    assert_eq!(json["error_type"], "engine_failure");
    assert_eq!(json["success"], false);
    assert_dir_empty(&dir);
}

#[tokio::test]
async fn test_ocr_timeout() {
    let dir = TempDir::new().unwrap();
    let config = ServiceConfig {
        ocr_timeout_secs: Some(1),
        ..config_in(&dir)
    };
    let engine = Arc::new(SlowEngine::default());
    let app = app_with_engine(engine.clone(), config);

    let body = multipart_body("file", Some("slow.png"), b"png");
    let (status, json) = send(app, upload_request("/ocr/", body)).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["error_type"], "timeout");

    // The abandoned engine call keeps its input until it returns
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(*engine.image_present_at_end.lock().unwrap(), Some(true));
    assert_dir_empty(&dir);
}

#[tokio::test]
async fn test_ocr_save_failure() {
    let config = ServiceConfig {
        temp_dir: PathBuf::from("/nonexistent/dir"),
        ..ServiceConfig::default()
    };
    let engine = Arc::new(CannedEngine::new(json!([])));
    let app = app_with_engine(engine.clone(), config);

    let body = multipart_body("file", Some("a.png"), b"png");
    let (status, json) = send(app, upload_request("/ocr/", body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error_type"], "io_failure");
    assert_eq!(json["success"], false);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to save file:"));
    assert!(engine.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_ocr_truncated_body() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(CannedEngine::new(json!([])));
    let app = app_with_engine(engine.clone(), config_in(&dir));

    // File part that never reaches its closing boundary
    let mut body = multipart_body("file", Some("cut.png"), b"png bytes");
    body.truncate(body.len() - BOUNDARY.len() - 8);
    let (status, json) = send(app, upload_request("/ocr/", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(engine.seen.lock().unwrap().is_empty());
    assert_dir_empty(&dir);
}

#[tokio::test]
async fn test_ocr_salvage_output() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(CannedEngine::new(json!([{
        "rec_texts": "not a list",
        "model": "PP-OCRv5",
        "_private": "hidden",
        "empty": ""
    }])));
    let app = app_with_engine(engine, config_in(&dir));

    let body = multipart_body("file", Some("odd.png"), b"png");
    let (status, json) = send(app, upload_request("/ocr/", body)).await;

    assert_eq!(status, StatusCode::OK);
    let texts: Vec<&str> = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["model: PP-OCRv5", "rec_texts: not a list"]);
    assert_eq!(json["results"][0]["confidence"], 0.5);
    assert_eq!(json["results"][0]["bounding_box"], json!([]));
    assert_eq!(json["total_text_regions"], 2);
}
