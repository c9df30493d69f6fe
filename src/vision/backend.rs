// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Engine selection at startup

use std::sync::Arc;
use tracing::{info, warn};

use super::bridge::BridgeOcrEngine;
use super::engine::{NoopOcrEngine, OcrEngine, OcrError};
use super::ocr::PaddleOcrModel;
use crate::config::{Backend, EngineConfig};

/// Construct the configured OCR engine
///
/// Runs once at startup and may take seconds while models load. A failure
/// leaves the service running in degraded mode; the caller decides that.
pub fn initialize(config: &EngineConfig) -> Result<Arc<dyn OcrEngine>, OcrError> {
    info!(
        "Initializing OCR engine (backend={}, lang={}, use_gpu={})",
        config.backend, config.language, config.use_gpu
    );

    let engine: Arc<dyn OcrEngine> = match config.backend {
        Backend::Onnx => {
            let model = PaddleOcrModel::new(config)?;
            info!(
                "✅ PaddleOCR models loaded from {} on {}",
                config.model_dir.display(),
                model.device()
            );
            Arc::new(model)
        }
        Backend::Bridge => Arc::new(BridgeOcrEngine::new(config)?),
        Backend::Noop => {
            warn!("⚠️ Using noop OCR engine; no text will be recognized");
            Arc::new(NoopOcrEngine)
        }
    };

    Ok(engine)
}
