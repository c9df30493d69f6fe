// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use paddleocr_api::{
    api::{start_server, AppState},
    cli::Cli,
    version,
    vision::{initialize, EngineHandle},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Cli::parse().into_config()?;

    info!("🚀 Starting {}", version::get_version_string());
    info!(
        "📦 Backend: {}, temp dir: {}, upload limit: {} bytes",
        config.engine.backend,
        config.temp_dir.display(),
        config.max_upload_bytes
    );

    // Model loading can take seconds; keep it off the async workers
    let engine_config = config.engine.clone();
    let engine = tokio::task::spawn_blocking(move || initialize(&engine_config))
        .await
        .context("OCR engine initialization task failed")?;

    let state = match engine {
        Ok(engine) => {
            info!("✅ OCR engine '{}' ready", engine.name());
            let handle = EngineHandle::new(engine).with_timeout(config.ocr_timeout());
            AppState::new(handle, config)
        }
        Err(e) => {
            error!("❌ OCR engine initialization failed: {}", e);
            warn!("⚠️ PaddleOCR service is NOT available; serving in degraded mode");
            AppState::unavailable(config, e.to_string())
        }
    };

    start_server(state).await
}
