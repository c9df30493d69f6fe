// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR models on ONNX Runtime
//!
//! Components:
//! - `detection` - Text region detection
//! - `classifier` - Text line orientation (0 / 180 degrees)
//! - `recognition` - Text recognition from detected regions
//! - `preprocessing` - Image preprocessing for models
//! - `session` - ONNX session loading with GPU / CPU providers
//! - `model` - Combined OCR pipeline

pub mod classifier;
pub mod detection;
pub mod model;
pub mod preprocessing;
pub mod recognition;
pub mod session;

pub use detection::{OcrDetectionModel, TextBox};
pub use model::{PageResult, PaddleOcrModel};
pub use recognition::{OcrRecognitionModel, RecognizedText};
pub use session::ExecutionDevice;
