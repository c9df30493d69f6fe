// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime session construction shared by the OCR models

use ndarray::{Array4, ArrayD};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::vision::engine::OcrError;

/// Where an ONNX session executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionDevice {
    Cpu,
    Cuda(i32),
}

impl ExecutionDevice {
    pub fn is_gpu(self) -> bool {
        matches!(self, ExecutionDevice::Cuda(_))
    }
}

impl fmt::Display for ExecutionDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionDevice::Cpu => write!(f, "cpu"),
            ExecutionDevice::Cuda(id) => write!(f, "gpu:{}", id),
        }
    }
}

/// Whether the linked ONNX Runtime ships the CUDA execution provider
pub fn cuda_available() -> Result<bool, OcrError> {
    CUDAExecutionProvider::default()
        .is_available()
        .map_err(|e| OcrError::backend(format!("failed to query CUDA provider: {}", e)))
}

/// An ONNX session behind a lock, with its first input name resolved
pub struct OnnxSession {
    session: Mutex<Session>,
    input_name: String,
}

impl fmt::Debug for OnnxSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxSession")
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl OnnxSession {
    /// Load a model onto the given device
    ///
    /// CUDA sessions register the provider with `error_on_failure`, so a
    /// missing driver surfaces here instead of silently running on CPU.
    pub fn load(
        model_path: &Path,
        device: ExecutionDevice,
        intra_threads: usize,
    ) -> Result<Self, OcrError> {
        if !model_path.exists() {
            return Err(OcrError::ModelNotFound(model_path.display().to_string()));
        }

        debug!("Loading {} on {}", model_path.display(), device);

        let builder = Session::builder()
            .map_err(|e| OcrError::backend(format!("Failed to create session builder: {}", e)))?;

        let builder = match device {
            ExecutionDevice::Cuda(id) => builder.with_execution_providers([
                CUDAExecutionProvider::default()
                    .with_device_id(id)
                    .build()
                    .error_on_failure(),
            ]),
            ExecutionDevice::Cpu => {
                builder.with_execution_providers([CPUExecutionProvider::default().build()])
            }
        }
        .map_err(|e| {
            OcrError::backend(format!("Failed to set {} execution provider: {}", device, e))
        })?;

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| OcrError::backend(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(intra_threads.max(1))
            .map_err(|e| OcrError::backend(format!("Failed to set intra threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| {
                OcrError::backend(format!(
                    "Failed to load model from {}: {}",
                    model_path.display(),
                    e
                ))
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        info!("Loaded {} ({})", model_path.display(), device);

        Ok(Self {
            session: Mutex::new(session),
            input_name,
        })
    }

    /// Run the model on one NCHW tensor and copy out its first output
    pub fn run(&self, input: &Array4<f32>) -> Result<ArrayD<f32>, OcrError> {
        let input_value = Value::from_array(input.to_owned())
            .map_err(|e| OcrError::Inference(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| OcrError::Inference("ONNX session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| OcrError::Inference(e.to_string()))?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| OcrError::Inference(format!("Failed to extract output tensor: {}", e)))?
            .to_owned();

        Ok(output)
    }
}
