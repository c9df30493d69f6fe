// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod health;
pub mod http_server;
pub mod ocr;

pub use errors::{ApiError, ErrorResponse};
pub use health::{health_handler, HealthResponse, HealthStatus};
pub use http_server::{create_app, start_server, AppState};
pub use ocr::{ocr_handler, OcrResponse};
