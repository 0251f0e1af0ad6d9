// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::detect::{detect_fallback_handler, detect_handler};
use super::handlers::health_handler;
use crate::detection::OnnxYoloModel;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub listen_addr: String,
    /// Directory uploads are written to while inference runs
    pub upload_dir: PathBuf,
    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            upload_dir: std::env::temp_dir(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Shared state injected into every handler
///
/// The detector is loaded once at startup and handed to the router here;
/// handlers never reach for module-level globals.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<RwLock<Option<Arc<OnnxYoloModel>>>>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            detector: Arc::new(RwLock::new(None)),
            config: Arc::new(config),
        }
    }

    /// State with no model loaded, for tests
    pub fn new_for_test() -> Self {
        Self::new(ApiConfig::default())
    }

    pub async fn set_detector(&self, detector: Arc<OnnxYoloModel>) {
        *self.detector.write().await = Some(detector);
    }
}

/// Build the application router
///
/// `/detect` only answers POST; every other method falls through to the
/// same 400 response the missing-image case produces.
pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/detect",
            post(detect_handler).fallback(detect_fallback_handler),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
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
    let addr = state.config.listen_addr.parse::<SocketAddr>()?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
