// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detection: pretrained YOLOv5-family models served via ONNX Runtime

pub mod labels;
pub mod model_manager;
pub mod onnx_model;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use labels::COCO_CLASSES;
pub use model_manager::DetectionModelManager;
pub use onnx_model::{non_max_suppression, DetectionError, OnnxYoloModel};

/// One detected object instance
///
/// Field names and order mirror the model's tabular output columns, and are
/// serialized verbatim into API responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    /// Left edge of the bounding box (pixels, original image coordinates)
    pub xmin: f32,
    /// Top edge of the bounding box
    pub ymin: f32,
    /// Right edge of the bounding box
    pub xmax: f32,
    /// Bottom edge of the bounding box
    pub ymax: f32,
    /// Confidence score (0.0-1.0)
    pub confidence: f32,
    /// Numeric class index
    pub class: usize,
    /// Human-readable class name
    pub name: String,
}

/// Configuration for loading a detection model
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Local model repository directory
    pub model_dir: PathBuf,
    /// Model loaded by name from the repository
    pub model_name: String,
    /// Minimum confidence for a detection to be reported
    pub confidence_threshold: f32,
    /// IoU threshold for non-maximum suppression
    pub iou_threshold: f32,
    /// Square input size the model expects (pixels)
    pub input_size: u32,
}

impl DetectorConfig {
    /// Path of the ONNX model file this configuration points at
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(format!("{}.onnx", self.model_name))
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./models"),
            model_name: "yolov5s".to_string(),
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            input_size: 640,
        }
    }
}

impl From<&crate::config::NodeConfig> for DetectorConfig {
    fn from(config: &crate::config::NodeConfig) -> Self {
        Self {
            model_dir: config.model_dir.clone(),
            model_name: config.model_name.clone(),
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
            input_size: config.input_size,
        }
    }
}

impl Detection {
    /// Bounding box area in square pixels
    pub fn area(&self) -> f32 {
        (self.xmax - self.xmin).max(0.0) * (self.ymax - self.ymin).max(0.0)
    }

    /// Intersection-over-union with another detection
    pub fn iou(&self, other: &Detection) -> f32 {
        let left = self.xmin.max(other.xmin);
        let top = self.ymin.max(other.ymin);
        let right = self.xmax.min(other.xmax);
        let bottom = self.ymax.min(other.ymax);

        let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}
