// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod detection;
pub mod utils;
pub mod version;

// Re-export main types
pub use api::{build_router, start_server, ApiConfig, ApiError, AppState, DetectResponse};
pub use config::NodeConfig;
pub use detection::{Detection, DetectionModelManager, DetectorConfig, OnnxYoloModel};
