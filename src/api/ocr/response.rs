// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR response types

use serde::Serialize;

use crate::vision::DetectionRecord;

/// Response from OCR processing
#[derive(Debug, Clone, Serialize)]
pub struct OcrResponse {
    /// Device the engine ran on ("gpu:0", "cpu", "unknown", ...)
    pub device: String,
    /// Recognized text regions in engine order
    pub results: Vec<DetectionRecord>,
    /// Always `results.len()`
    pub total_text_regions: usize,
    pub success: bool,
}

impl OcrResponse {
    pub fn new(device: String, results: Vec<DetectionRecord>) -> Self {
        Self {
            device,
            total_text_regions: results.len(),
            results,
            success: true,
        }
    }
}
