// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the PaddleOCR API service

/// Service name reported by the health endpoint
pub const SERVICE_NAME: &str = "PaddleOCR Invoice API";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Upload formats accepted by the OCR endpoint
pub const SUPPORTED_FORMATS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "webp"];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("{} {}", SERVICE_NAME, VERSION_NUMBER)
}
