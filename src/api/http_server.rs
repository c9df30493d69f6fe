// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::health::health_handler;
use super::ocr::ocr_handler;
use crate::config::ServiceConfig;
use crate::vision::EngineHandle;

/// Shared state for every request
///
/// `engine` is `None` when initialization failed at startup; the service then
/// runs degraded and `init_error` carries the reason.
#[derive(Clone, Debug)]
pub struct AppState {
    pub engine: Option<EngineHandle>,
    pub config: Arc<ServiceConfig>,
    pub init_error: Option<String>,
}

impl AppState {
    pub fn new(engine: EngineHandle, config: ServiceConfig) -> Self {
        Self {
            engine: Some(engine),
            config: Arc::new(config),
            init_error: None,
        }
    }

    /// State for a service whose engine failed to initialize
    pub fn unavailable(config: ServiceConfig, error: impl Into<String>) -> Self {
        Self {
            engine: None,
            config: Arc::new(config),
            init_error: Some(error.into()),
        }
    }
}

/// Build the router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ocr/", post(ocr_handler))
        .route("/ocr", post(ocr_handler))
        // The upload cap is enforced while streaming the file field
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.socket_addr()?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("OCR API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("OCR API stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
