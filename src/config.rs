// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration loaded from environment variables

use std::env;
use std::path::PathBuf;

/// Default maximum upload size (10MB)
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Configuration for the vision node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Port the HTTP API listens on
    pub api_port: u16,
    /// Local model repository directory
    pub model_dir: PathBuf,
    /// Model loaded by name from the repository ({model_dir}/{model_name}.onnx)
    pub model_name: String,
    /// Minimum confidence for a detection to be reported
    pub confidence_threshold: f32,
    /// IoU threshold for non-maximum suppression
    pub iou_threshold: f32,
    /// Square input size the model expects (pixels)
    pub input_size: u32,
    /// Directory uploads are written to while inference runs
    pub upload_dir: PathBuf,
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
}

impl NodeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            api_port: env::var("API_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            model_dir: env::var("MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./models")),
            model_name: env::var("MODEL_NAME").unwrap_or_else(|_| "yolov5s".to_string()),
            confidence_threshold: env::var("CONF_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.25),
            iou_threshold: env::var("IOU_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.45),
            input_size: env::var("INPUT_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(640),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model_name.is_empty() {
            return Err("Model name must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err("Confidence threshold must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err("IoU threshold must be within [0, 1]".to_string());
        }
        if self.input_size == 0 {
            return Err("Input size must be greater than 0".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("Max upload size must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Path of the ONNX model file this configuration points at
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(format!("{}.onnx", self.model_name))
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_port: 8080,
            model_dir: PathBuf::from("./models"),
            model_name: "yolov5s".to_string(),
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            input_size: 640,
            upload_dir: env::temp_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
