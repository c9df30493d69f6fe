// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Best-effort compute device introspection
//!
//! Nothing here fails a request: every error collapses into a device label
//! and a log line.

use tracing::{debug, warn};

use super::engine::OcrEngine;

pub const DEVICE_CPU: &str = "cpu";
pub const DEVICE_GPU: &str = "gpu";
pub const DEVICE_UNKNOWN: &str = "unknown";

/// Device view reported by the health endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    pub cuda_available: bool,
    pub current_device: String,
    pub using_gpu: bool,
    pub device_error: Option<String>,
}

fn is_gpu_device(device: &str) -> bool {
    device.to_lowercase().contains(DEVICE_GPU)
}

/// Label for the device the last OCR call ran on
///
/// `"gpu:<id>"` style strings pass through, non-GPU devices read as `"cpu"`.
/// A GPU build whose device cannot be queried is assumed to be on the GPU.
pub fn report_device(engine: &dyn OcrEngine) -> String {
    let gpu_compiled = match engine.gpu_compiled() {
        Ok(compiled) => compiled,
        Err(e) => {
            warn!("Device detection error: {}", e);
            return DEVICE_UNKNOWN.to_string();
        }
    };

    if !gpu_compiled {
        return DEVICE_CPU.to_string();
    }

    match engine.current_device() {
        Ok(device) if is_gpu_device(&device) => device,
        Ok(device) => {
            debug!("GPU runtime present but engine reports device '{}'", device);
            DEVICE_CPU.to_string()
        }
        Err(e) => {
            warn!("Could not query current device, assuming GPU: {}", e);
            DEVICE_GPU.to_string()
        }
    }
}

/// Device details for the health check
///
/// An error from `gpu_compiled` is returned to the caller (the runtime itself
/// is broken); errors from `current_device` are folded into `device_error`.
pub fn probe_device(engine: &dyn OcrEngine) -> Result<DeviceStatus, String> {
    let cuda_available = engine.gpu_compiled().map_err(|e| e.to_string())?;

    Ok(match engine.current_device() {
        Ok(device) => DeviceStatus {
            cuda_available,
            using_gpu: is_gpu_device(&device),
            current_device: device,
            device_error: None,
        },
        Err(e) => DeviceStatus {
            cuda_available,
            current_device: DEVICE_UNKNOWN.to_string(),
            using_gpu: false,
            device_error: Some(e.to_string()),
        },
    })
}
