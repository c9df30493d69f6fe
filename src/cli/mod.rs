// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::config::{Backend, ServiceConfig};

/// PaddleOCR API server
///
/// Every flag can also be given through its environment variable; flags and
/// variables override values from the config file.
#[derive(Parser, Debug, Default)]
#[command(name = "paddleocr-api")]
#[command(version)]
#[command(about = "HTTP OCR service backed by PaddleOCR models", long_about = None)]
pub struct Cli {
    /// TOML config file
    #[arg(long, env = "OCR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on (e.g. 0.0.0.0:8000)
    #[arg(long, env = "OCR_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Directory for temporary upload files
    #[arg(long, env = "OCR_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Maximum accepted upload size in bytes
    #[arg(long, env = "OCR_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<usize>,

    /// Fail OCR requests that take longer than this many seconds
    #[arg(long, env = "OCR_TIMEOUT_SECS")]
    pub ocr_timeout_secs: Option<u64>,

    /// OCR backend (onnx, bridge, noop)
    #[arg(long, env = "OCR_BACKEND")]
    pub backend: Option<Backend>,

    /// Recognition language
    #[arg(long, env = "OCR_LANGUAGE")]
    pub language: Option<String>,

    /// Try the GPU before falling back to CPU (true/false)
    #[arg(long, env = "OCR_USE_GPU")]
    pub use_gpu: Option<bool>,

    /// CUDA device ordinal
    #[arg(long, env = "OCR_GPU_DEVICE_ID")]
    pub gpu_device_id: Option<i32>,

    /// Directory holding the PaddleOCR ONNX models
    #[arg(long, env = "OCR_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Executable used by the bridge backend
    #[arg(long, env = "OCR_BRIDGE_COMMAND")]
    pub bridge_command: Option<String>,
}

impl Cli {
    /// Resolve the final configuration: defaults, then file, then flags/env
    pub fn into_config(self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ServiceConfig::default(),
        };

        if let Some(listen_addr) = self.listen_addr {
            config.listen_addr = listen_addr;
        }
        if let Some(temp_dir) = self.temp_dir {
            config.temp_dir = temp_dir;
        }
        if let Some(max_upload_bytes) = self.max_upload_bytes {
            config.max_upload_bytes = max_upload_bytes;
        }
        if self.ocr_timeout_secs.is_some() {
            config.ocr_timeout_secs = self.ocr_timeout_secs;
        }
        if let Some(backend) = self.backend {
            config.engine.backend = backend;
        }
        if let Some(language) = self.language {
            config.engine.language = language;
        }
        if let Some(use_gpu) = self.use_gpu {
            config.engine.use_gpu = use_gpu;
        }
        if let Some(gpu_device_id) = self.gpu_device_id {
            config.engine.gpu_device_id = gpu_device_id;
        }
        if let Some(model_dir) = self.model_dir {
            config.engine.model_dir = model_dir;
        }
        if let Some(bridge_command) = self.bridge_command {
            config.engine.bridge_command = bridge_command;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
