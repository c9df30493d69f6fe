// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::multipart::MultipartRejection;
use axum_extra::extract::Multipart;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::response::OcrResponse;
use super::upload::{persist_upload, NO_FILE_PROVIDED};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::{normalize, report_device};

/// POST /ocr/ - Extract text regions from an uploaded image
///
/// # Request
/// multipart/form-data with the image in field `file`
/// (jpg, jpeg, png, bmp, tiff or webp)
///
/// # Response
/// - `device`: Compute device the engine ran on
/// - `results`: `{text, confidence, bounding_box}` per text region
/// - `total_text_regions`: Number of results
/// - `success`: true
///
/// # Errors
/// - 400 Bad Request: No file, unsupported extension, or truncated body
/// - 413 Payload Too Large: Upload exceeds `max_upload_bytes`
/// - 500 Internal Server Error: Saving the upload or OCR failed
/// - 503 Service Unavailable: Engine not initialized (checked first)
/// - 504 Gateway Timeout: OCR exceeded `ocr_timeout_secs`
pub async fn ocr_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<OcrResponse>, ApiError> {
    // 1. Engine readiness comes before any request validation
    let engine = state.engine.as_ref().ok_or_else(|| {
        warn!("OCR request rejected: engine not initialized");
        ApiError::ServiceUnavailable("PaddleOCR service is not available".to_string())
    })?;

    // 2. Persist the upload
    let mut multipart = multipart.map_err(|e| {
        debug!("Rejected multipart request: {}", e);
        ApiError::BadRequest(NO_FILE_PROVIDED.to_string())
    })?;

    let image = persist_upload(
        &mut multipart,
        &state.config.temp_dir,
        state.config.max_upload_bytes,
    )
    .await?;

    // 3. Run OCR; the engine task owns `image` and removes it when done
    info!("Processing image: {}", image.path().display());
    let start = Instant::now();

    let raw = engine.run(image).await.map_err(|e| {
        warn!("OCR processing failed: {}", e);
        ApiError::from(e)
    })?;

    // 4. Normalize and report
    let results = normalize(&raw);
    let device = report_device(engine.engine());

    info!(
        "OCR complete: {} regions on {} in {}ms",
        results.len(),
        device,
        start.elapsed().as_millis()
    );

    Ok(Json(OcrResponse::new(device, results)))
}
