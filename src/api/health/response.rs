// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Health response types

use serde::{Deserialize, Serialize};

use crate::version::{SERVICE_NAME, VERSION_NUMBER};
use crate::vision::DeviceStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Body of GET /health
///
/// Device fields are only present once the engine has been probed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub paddleocr_initialized: bool,
    pub paddle_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuda_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub using_gpu: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_ready: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    fn base(status: HealthStatus, initialized: bool) -> Self {
        Self {
            status,
            service: SERVICE_NAME.to_string(),
            version: VERSION_NUMBER.to_string(),
            paddleocr_initialized: initialized,
            paddle_available: true,
            backend: None,
            cuda_available: None,
            current_device: None,
            using_gpu: None,
            device_error: None,
            ocr_ready: None,
            message: None,
            error: None,
        }
    }

    /// Engine failed to initialize at startup
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::base(HealthStatus::Degraded, false)
        }
    }

    /// Engine present but its runtime could not be queried
    pub fn unhealthy(backend: &str, error: impl Into<String>) -> Self {
        Self {
            backend: Some(backend.to_string()),
            error: Some(error.into()),
            ..Self::base(HealthStatus::Unhealthy, true)
        }
    }

    pub fn healthy(backend: &str, device: DeviceStatus) -> Self {
        Self {
            backend: Some(backend.to_string()),
            cuda_available: Some(device.cuda_available),
            current_device: Some(device.current_device),
            using_gpu: Some(device.using_gpu),
            device_error: device.device_error,
            ocr_ready: Some(true),
            message: Some("All systems operational".to_string()),
            ..Self::base(HealthStatus::Healthy, true)
        }
    }
}
