// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR engines and result normalization
//!
//! This module provides:
//! - The `OcrEngine` abstraction and a serialized `EngineHandle`
//! - PaddleOCR on ONNX Runtime (`ocr`) and an external process bridge
//! - Normalization of engine output into flat detection records
//! - Device reporting for responses and health checks

pub mod backend;
pub mod bridge;
pub mod device;
pub mod engine;
pub mod image_utils;
pub mod normalize;
pub mod ocr;

pub use backend::initialize;
pub use device::{probe_device, report_device, DeviceStatus};
pub use engine::{EngineHandle, NoopOcrEngine, OcrEngine, OcrError, RawResult};
pub use image_utils::{decode_image_bytes, detect_format, load_image, ImageError, ImageInfo};
pub use normalize::{normalize, DetectionRecord, RawPage};
