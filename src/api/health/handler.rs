// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Health endpoint handler

use axum::{extract::State, http::StatusCode, Json};
use tracing::{debug, warn};

use super::response::HealthResponse;
use crate::api::http_server::AppState;
use crate::vision::probe_device;

const NOT_INITIALIZED: &str = "PaddleOCR not initialized - OCR functionality unavailable";

/// GET /health - Report engine readiness and compute device
///
/// Never takes the engine lock, so it stays responsive while OCR runs.
///
/// # Responses
/// - 200: engine ready, with `cuda_available`, `current_device`, `using_gpu`
/// - 503 `degraded`: engine failed to initialize at startup
/// - 503 `unhealthy`: engine runtime could not be queried
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let Some(handle) = state.engine.as_ref() else {
        if let Some(reason) = &state.init_error {
            debug!("Health check while degraded: {}", reason);
        }
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse::degraded(NOT_INITIALIZED)),
        );
    };

    match probe_device(handle.engine()) {
        Ok(device) => (
            StatusCode::OK,
            Json(HealthResponse::healthy(handle.name(), device)),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::unhealthy(handle.name(), e)),
            )
        }
    }
}
