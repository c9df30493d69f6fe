// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR engine abstraction and the shared, serialized engine handle

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use super::image_utils::ImageError;

/// The engine's native output before normalization
///
/// Its shape depends on the engine and its version; see `vision::normalize`.
pub type RawResult = serde_json::Value;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR model not found: {0}")]
    ModelNotFound(String),

    #[error("OCR backend error: {0}")]
    Backend(String),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("OCR inference failed: {0}")]
    Inference(String),

    #[error("OCR bridge failed: {0}")]
    Bridge(String),

    #[error("OCR engine returned invalid output: {0}")]
    InvalidOutput(String),

    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    pub fn backend(message: impl Into<String>) -> Self {
        OcrError::Backend(message.into())
    }
}

/// An OCR engine able to process one image file at a time
///
/// Implementations may block for a long time in `run`; callers go through
/// `EngineHandle`, which moves the call off the async runtime.
pub trait OcrEngine: Send + Sync {
    /// Short backend identifier (e.g. "onnx")
    fn name(&self) -> &'static str;

    /// Run OCR on an image stored on disk
    fn run(&self, image_path: &Path) -> Result<RawResult, OcrError>;

    /// Whether the engine's runtime can use a GPU at all
    fn gpu_compiled(&self) -> Result<bool, OcrError>;

    /// The compute device the engine is using (e.g. "gpu:0", "cpu")
    fn current_device(&self) -> Result<String, OcrError>;
}

/// Engine that never finds any text
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOcrEngine;

impl OcrEngine for NoopOcrEngine {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn run(&self, _image_path: &Path) -> Result<RawResult, OcrError> {
        Ok(RawResult::Array(Vec::new()))
    }

    fn gpu_compiled(&self) -> Result<bool, OcrError> {
        Ok(false)
    }

    fn current_device(&self) -> Result<String, OcrError> {
        Ok("cpu".to_string())
    }
}

/// Process-wide handle to the single OCR engine
///
/// Engine calls are serialized: the engine is not assumed to be safe for
/// concurrent use. The lock guard moves into the blocking task, so a call
/// abandoned by a timeout still holds the engine until it returns.
#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<dyn OcrEngine>,
    gate: Arc<Mutex<()>>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("engine", &self.engine.name())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl EngineHandle {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            gate: Arc::new(Mutex::new(())),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn engine(&self) -> &dyn OcrEngine {
        self.engine.as_ref()
    }

    pub fn name(&self) -> &'static str {
        self.engine.name()
    }

    /// Run OCR on the blocking thread pool, one call at a time
    ///
    /// `image` moves into the blocking task and is dropped there, so an
    /// owning guard outlives the engine call even when the caller times out.
    pub async fn run<P>(&self, image: P) -> Result<RawResult, OcrError>
    where
        P: AsRef<Path> + Send + 'static,
    {
        let guard = self.gate.clone().lock_owned().await;
        let engine = self.engine.clone();

        debug!(
            "Dispatching {} to {} engine",
            image.as_ref().display(),
            engine.name()
        );

        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            engine.run(image.as_ref())
        });

        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| OcrError::Timeout(limit))?,
            None => task.await,
        };

        joined.map_err(|e| OcrError::backend(format!("OCR task failed: {}", e)))?
    }
}
