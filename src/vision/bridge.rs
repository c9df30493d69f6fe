// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! External PaddleOCR process backend
//!
//! The bridge command is invoked once per image as
//! `<command> <args..> --lang <lang> [--use-angle-cls] <image>` and must print
//! JSON on stdout: either the raw PaddleOCR result itself, or an envelope
//! `{"result": <raw>, "device": "gpu:0", "cuda_available": true}`.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use tracing::{debug, info};

use super::engine::{OcrEngine, OcrError, RawResult};
use crate::config::EngineConfig;

/// Device state last reported by the bridge process
#[derive(Debug, Default, Clone)]
struct ReportedDevice {
    cuda_available: Option<bool>,
    device: Option<String>,
}

#[derive(Debug)]
pub struct BridgeOcrEngine {
    command: String,
    args: Vec<String>,
    language: String,
    use_angle_cls: bool,
    reported: Mutex<ReportedDevice>,
}

impl BridgeOcrEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, OcrError> {
        let command = config.bridge_command.trim().to_string();
        if command.is_empty() {
            return Err(OcrError::backend("bridge command is empty"));
        }

        // Bare names are resolved through PATH at call time
        let as_path = PathBuf::from(&command);
        if as_path.components().count() > 1 && !as_path.exists() {
            return Err(OcrError::ModelNotFound(format!(
                "bridge command {}",
                as_path.display()
            )));
        }

        info!("✅ OCR bridge configured: {} {:?}", command, config.bridge_args);

        Ok(Self {
            command,
            args: config.bridge_args.clone(),
            language: config.language.clone(),
            use_angle_cls: config.use_angle_cls,
            reported: Mutex::new(ReportedDevice::default()),
        })
    }

    fn build_command(&self, image_path: &Path) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args).arg("--lang").arg(&self.language);
        if self.use_angle_cls {
            cmd.arg("--use-angle-cls");
        }
        cmd.arg(image_path);
        cmd
    }

    /// Split an envelope from the raw result, remembering reported device state
    fn unwrap_envelope(&self, output: Value) -> RawResult {
        match output {
            Value::Object(mut fields) if fields.contains_key("result") => {
                let mut reported = self
                    .reported
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if let Some(cuda) = fields.get("cuda_available").and_then(Value::as_bool) {
                    reported.cuda_available = Some(cuda);
                }
                if let Some(device) = fields.get("device").and_then(Value::as_str) {
                    reported.device = Some(device.to_string());
                }
                fields.remove("result").unwrap_or(Value::Null)
            }
            raw => raw,
        }
    }

    fn reported(&self) -> ReportedDevice {
        self.reported
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl OcrEngine for BridgeOcrEngine {
    fn name(&self) -> &'static str {
        "bridge"
    }

    fn run(&self, image_path: &Path) -> Result<RawResult, OcrError> {
        debug!("Invoking OCR bridge {} on {}", self.command, image_path.display());

        let output = self
            .build_command(image_path)
            .output()
            .map_err(|e| OcrError::Bridge(format!("failed to invoke {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Bridge(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let parsed: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            OcrError::InvalidOutput(format!("bridge stdout is not JSON: {}", e))
        })?;

        Ok(self.unwrap_envelope(parsed))
    }

    fn gpu_compiled(&self) -> Result<bool, OcrError> {
        Ok(self.reported().cuda_available.unwrap_or(false))
    }

    fn current_device(&self) -> Result<String, OcrError> {
        self.reported()
            .device
            .ok_or_else(|| OcrError::backend("bridge has not reported a device yet"))
    }
}
