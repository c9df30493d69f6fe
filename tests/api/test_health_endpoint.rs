// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Health endpoint tests
//!
//! These tests verify that:
//! - An initialized engine reports healthy with device details
//! - A failed initialization reports degraded with 503
//! - A broken engine runtime reports unhealthy with 503
//! - Health stays responsive while an OCR call holds the engine

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use paddleocr_api::{
    api::http_server::{create_app, AppState},
    config::ServiceConfig,
    vision::{EngineHandle, NoopOcrEngine, OcrEngine, OcrError, RawResult},
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

struct DeviceEngine {
    gpu_compiled: Result<bool, &'static str>,
    device: Result<&'static str, &'static str>,
}

impl OcrEngine for DeviceEngine {
    fn name(&self) -> &'static str {
        "device"
    }

    fn run(&self, _image_path: &Path) -> Result<RawResult, OcrError> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(RawResult::Array(Vec::new()))
    }

    fn gpu_compiled(&self) -> Result<bool, OcrError> {
        self.gpu_compiled.map_err(OcrError::backend)
    }

    fn current_device(&self) -> Result<String, OcrError> {
        self.device.map(str::to_string).map_err(OcrError::backend)
    }
}

fn app_with(engine: Arc<dyn OcrEngine>) -> Router {
    create_app(AppState::new(
        EngineHandle::new(engine),
        ServiceConfig::default(),
    ))
}

async fn get_health(app: Router) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_healthy_gpu() {
    let app = app_with(Arc::new(DeviceEngine {
        gpu_compiled: Ok(true),
        device: Ok("gpu:0"),
    }));

    let (status, json) = get_health(app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "PaddleOCR Invoice API");
    assert_eq!(json["version"], "1.0.0");
    assert_eq!(json["paddleocr_initialized"], true);
    assert_eq!(json["cuda_available"], true);
    assert_eq!(json["current_device"], "gpu:0");
    assert_eq!(json["using_gpu"], true);
    assert_eq!(json["ocr_ready"], true);
    assert_eq!(json["message"], "All systems operational");
}

#[tokio::test]
async fn test_health_healthy_cpu_noop() {
    let (status, json) = get_health(app_with(Arc::new(NoopOcrEngine))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["backend"], "noop");
    assert_eq!(json["cuda_available"], false);
    assert_eq!(json["current_device"], "cpu");
    assert_eq!(json["using_gpu"], false);
}

#[tokio::test]
async fn test_health_device_query_failure() {
    let app = app_with(Arc::new(DeviceEngine {
        gpu_compiled: Ok(true),
        device: Err("no CUDA context"),
    }));

    let (status, json) = get_health(app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["current_device"], "unknown");
    assert_eq!(json["using_gpu"], false);
    assert!(json["device_error"]
        .as_str()
        .unwrap()
        .contains("no CUDA context"));
}

#[tokio::test]
async fn test_health_degraded_when_not_initialized() {
    let app = create_app(AppState::unavailable(
        ServiceConfig::default(),
        "OCR model not found: det_model.onnx",
    ));

    let (status, json) = get_health(app).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["paddleocr_initialized"], false);
    assert_eq!(
        json["error"],
        "PaddleOCR not initialized - OCR functionality unavailable"
    );
    assert!(json.get("ocr_ready").is_none());
}

#[tokio::test]
async fn test_health_unhealthy_runtime() {
    let app = app_with(Arc::new(DeviceEngine {
        gpu_compiled: Err("onnxruntime missing"),
        device: Ok("cpu"),
    }));

    let (status, json) = get_health(app).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "unhealthy");
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("onnxruntime missing"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_responsive_during_ocr() {
    let engine: Arc<dyn OcrEngine> = Arc::new(DeviceEngine {
        gpu_compiled: Ok(false),
        device: Ok("cpu"),
    });
    let handle = EngineHandle::new(engine);
    let app = create_app(AppState::new(handle.clone(), ServiceConfig::default()));

    let busy = tokio::spawn(async move { handle.run(PathBuf::from("busy.png")).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, _) = tokio::time::timeout(Duration::from_millis(300), get_health(app))
        .await
        .expect("health check blocked behind OCR");
    assert_eq!(status, StatusCode::OK);

    busy.await.unwrap().unwrap();
}
