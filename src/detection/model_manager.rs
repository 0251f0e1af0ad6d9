// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection model manager for loading and holding the process-wide detector

use std::sync::Arc;

use super::onnx_model::OnnxYoloModel;
use super::DetectorConfig;

/// Information about the loaded detection model
#[derive(Debug, Clone)]
pub struct DetectionModelInfo {
    /// Model name
    pub name: String,
    /// Square input size the model expects
    pub input_size: u32,
    /// Whether the model is available
    pub available: bool,
}

/// Manager for the detection model
///
/// Loads the configured model once at process start and hands out shared
/// references. A missing model file is handled gracefully: the manager stays
/// empty and the detect endpoint reports the service unavailable.
pub struct DetectionModelManager {
    detector: Option<Arc<OnnxYoloModel>>,
    config: DetectorConfig,
}

impl DetectionModelManager {
    /// Create a new DetectionModelManager with the given configuration
    pub async fn new(config: DetectorConfig) -> anyhow::Result<Self> {
        let detector = match OnnxYoloModel::new(&config).await {
            Ok(model) => {
                tracing::info!(
                    "✅ Detection model '{}' loaded from {}",
                    config.model_name,
                    config.model_dir.display()
                );
                Some(Arc::new(model))
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ Failed to load detection model '{}': {}",
                    config.model_name,
                    e
                );
                None
            }
        };

        Ok(Self { detector, config })
    }

    /// Get the detector if available
    pub fn get_detector(&self) -> Option<Arc<OnnxYoloModel>> {
        self.detector.clone()
    }

    /// Check if a detection model is loaded
    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    /// Information about the configured model
    pub fn model_info(&self) -> DetectionModelInfo {
        DetectionModelInfo {
            name: self.config.model_name.clone(),
            input_size: self.config.input_size,
            available: self.detector.is_some(),
        }
    }
}
