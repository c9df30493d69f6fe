// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::vision::OcrError;

/// Error body: `{"error": .., "error_type": .., "success": false}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    pub success: bool,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    ServiceUnavailable(String),
    BadRequest(String),
    PayloadTooLarge { limit: usize },
    IoFailure(String),
    EngineFailure(String),
    Timeout(u64),
    Internal(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let error_type = match self {
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::IoFailure(_) => "io_failure",
            ApiError::EngineFailure(_) => "engine_failure",
            ApiError::Timeout(_) => "timeout",
            ApiError::Internal(_) => "internal_error",
        };

        ErrorResponse {
            error: self.to_string(),
            error_type: error_type.to_string(),
            success: false,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::BadRequest(_) => 400,
            ApiError::PayloadTooLarge { .. } => 413,
            ApiError::IoFailure(_) | ApiError::EngineFailure(_) | ApiError::Internal(_) => 500,
            ApiError::Timeout(_) => 504,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::ServiceUnavailable(msg)
            | ApiError::BadRequest(msg)
            | ApiError::IoFailure(msg)
            | ApiError::EngineFailure(msg)
            | ApiError::Internal(msg) => write!(f, "{}", msg),
            ApiError::PayloadTooLarge { limit } => {
                write!(f, "File too large (max {} bytes)", limit)
            }
            ApiError::Timeout(secs) => write!(f, "OCR timed out after {} seconds", secs),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<OcrError> for ApiError {
    fn from(err: OcrError) -> Self {
        match err {
            OcrError::Timeout(after) => ApiError::Timeout(after.as_secs()),
            other => ApiError::EngineFailure(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}
