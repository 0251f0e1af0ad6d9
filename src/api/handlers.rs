// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared API handler types and the health endpoint

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::http_server::AppState;
use crate::version;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// GET /health - Liveness plus model availability
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let detector = state.detector.read().await;
    let model_loaded = detector.is_some();

    Json(HealthResponse {
        status: if model_loaded { "healthy" } else { "degraded" }.to_string(),
        version: version::VERSION_NUMBER.to_string(),
        model_loaded,
        model_name: detector.as_ref().map(|d| d.model_name().to_string()),
        timestamp: Utc::now(),
    })
}
