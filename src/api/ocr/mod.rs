// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR API endpoint module
//!
//! Provides POST /ocr/ for extracting text from uploaded images.

pub mod handler;
pub mod response;
pub mod upload;

pub use handler::ocr_handler;
pub use response::OcrResponse;
pub use upload::{persist_upload, validate_extension, TempImage};
