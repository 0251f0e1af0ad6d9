// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Detection Model Wrapper
//!
//! This module provides a wrapper around ONNX Runtime for running
//! pretrained YOLOv5-family object detection models.
//!
//! Features:
//! - ONNX model loading by name from a local model repository
//! - Letterbox preprocessing (aspect-preserving resize with padding)
//! - YOLOv5 prediction decoding (objectness x class score)
//! - Greedy per-class non-maximum suppression
//! - Bounding boxes mapped back to original image coordinates

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use image::{imageops, imageops::FilterType, ImageReader, Rgb, RgbImage};
use ndarray::{s, Array4, ArrayView2, Axis, Ix2};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::labels::class_name;
use super::{Detection, DetectorConfig};

/// Padding color used outside the letterboxed image area
const LETTERBOX_FILL: Rgb<u8> = Rgb([114, 114, 114]);

/// Errors raised while loading a model or running inference
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Inference failed: {0}")]
    Inference(#[from] ort::Error),

    #[error("Unexpected model output shape: {0:?}")]
    OutputShape(Vec<usize>),
}

/// Mapping from letterboxed model coordinates back to the original image
#[derive(Debug, Clone, Copy)]
pub struct LetterboxMapping {
    /// Scale factor applied to the original image
    pub gain: f32,
    /// Horizontal padding added on the left
    pub pad_x: f32,
    /// Vertical padding added on the top
    pub pad_y: f32,
    /// Original image width in pixels
    pub width: f32,
    /// Original image height in pixels
    pub height: f32,
}

/// ONNX-based object detection model (YOLOv5 family)
///
/// This struct wraps ONNX Runtime to turn an image file into a list of
/// detection records. The model is loaded once and shared for the lifetime
/// of the process.
///
/// # Thread Safety
/// The underlying ONNX session is not guaranteed to be safe under concurrent
/// invocation, so inference is serialized through a `Mutex`. The lock is
/// held only for the `session.run` call itself.
pub struct OnnxYoloModel {
    /// ONNX Runtime session (wrapped in Arc<Mutex> for thread-safe shared access)
    session: Arc<Mutex<Session>>,

    /// Model name within the repository (e.g., "yolov5s")
    model_name: String,

    /// Square input size the model expects
    input_size: u32,

    /// Minimum confidence for a detection to be reported
    confidence_threshold: f32,

    /// IoU threshold for non-maximum suppression
    iou_threshold: f32,
}

impl std::fmt::Debug for OnnxYoloModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxYoloModel")
            .field("model_name", &self.model_name)
            .field("input_size", &self.input_size)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("iou_threshold", &self.iou_threshold)
            .finish_non_exhaustive()
    }
}

impl OnnxYoloModel {
    /// Loads a detection model by name from the local model repository
    ///
    /// # Arguments
    /// - `config`: Repository directory, model name, and inference thresholds
    ///
    /// # Errors
    /// Returns error if:
    /// - The model file `{model_dir}/{model_name}.onnx` does not exist
    /// - ONNX Runtime fails to initialize the session
    ///
    /// # Example
    /// ```ignore
    /// let model = OnnxYoloModel::new(&DetectorConfig::default()).await?;
    /// ```
    pub async fn new(config: &DetectorConfig) -> Result<Self, DetectionError> {
        let model_path = config.model_path();
        if !model_path.exists() {
            return Err(DetectionError::ModelNotFound(model_path));
        }

        info!(
            "Loading detection model '{}' from {}",
            config.model_name,
            model_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)?;

        info!("✅ Detection model '{}' loaded", config.model_name);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            model_name: config.model_name.clone(),
            input_size: config.input_size,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
        })
    }

    /// Runs inference on an image file and returns the detected objects
    ///
    /// # Arguments
    /// - `image_path`: Path of the image on disk
    ///
    /// # Returns
    /// - `Result<Vec<Detection>>`: Detections sorted by descending confidence
    ///
    /// # Implementation
    /// 1. Load and decode the image from disk
    /// 2. Letterbox-resize to the model input size, normalize to [0, 1] CHW
    /// 3. Run the ONNX session (serialized by the session lock)
    /// 4. Decode predictions, filter by confidence, apply per-class NMS
    /// 5. Map boxes back to original image coordinates
    pub async fn detect(&self, image_path: &Path) -> Result<Vec<Detection>, DetectionError> {
        let started = Instant::now();

        let image = ImageReader::open(image_path)?
            .with_guessed_format()?
            .decode()?
            .to_rgb8();
        let (width, height) = image.dimensions();

        let (canvas, gain, pad_x, pad_y) = letterbox(&image, self.input_size);
        let input = image_to_tensor(&canvas);
        let input_tensor = Value::from_array(input)?;

        // Run inference - lock session for thread-safe access
        let mut session_guard = self.session.lock().unwrap();
        let outputs = session_guard.run(ort::inputs![input_tensor])?;

        let output = outputs[0].try_extract_array::<f32>()?;
        let shape = output.shape().to_vec();
        // YOLOv5 exports emit [batch, candidates, 4 box coords + objectness + classes]
        if shape.len() != 3 || shape[2] < 6 {
            return Err(DetectionError::OutputShape(shape));
        }
        let predictions = output
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|_| DetectionError::OutputShape(shape))?;

        let mapping = LetterboxMapping {
            gain,
            pad_x,
            pad_y,
            width: width as f32,
            height: height as f32,
        };
        let candidates = decode_predictions(predictions, self.confidence_threshold, &mapping);
        let detections = non_max_suppression(candidates, self.iou_threshold);

        debug!(
            "Detection complete: {} objects in {}x{} image ({}ms)",
            detections.len(),
            width,
            height,
            started.elapsed().as_millis()
        );

        Ok(detections)
    }

    /// Returns the model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Returns the square input size the model expects
    pub fn input_size(&self) -> u32 {
        self.input_size
    }
}

/// Resize `image` to fit a `size` x `size` square, preserving aspect ratio and
/// padding the remainder with gray
///
/// Returns the padded canvas plus the scale gain and per-axis padding needed
/// to map box coordinates back to the original image.
fn letterbox(image: &RgbImage, size: u32) -> (RgbImage, f32, f32, f32) {
    let (width, height) = image.dimensions();
    let gain = (size as f32 / width as f32).min(size as f32 / height as f32);
    let scaled_w = ((width as f32 * gain).round() as u32).clamp(1, size);
    let scaled_h = ((height as f32 * gain).round() as u32).clamp(1, size);
    let pad_x = (size - scaled_w) as f32 / 2.0;
    let pad_y = (size - scaled_h) as f32 / 2.0;

    let resized = imageops::resize(image, scaled_w, scaled_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, LETTERBOX_FILL);
    imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    (canvas, gain, pad_x, pad_y)
}

/// Convert an RGB image into a normalized [1, 3, H, W] f32 tensor
fn image_to_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut input = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
        input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
        input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
    }
    input
}

/// Decode raw YOLOv5 predictions into detection records
///
/// Each prediction row is `(cx, cy, w, h, objectness, class scores...)` in
/// letterboxed coordinates. Confidence is objectness times the best class
/// score; rows below `confidence_threshold` are dropped. Surviving boxes are
/// mapped back through `mapping` and clamped to the original image bounds.
pub fn decode_predictions(
    predictions: ArrayView2<'_, f32>,
    confidence_threshold: f32,
    mapping: &LetterboxMapping,
) -> Vec<Detection> {
    let mut detections = Vec::new();
    if predictions.ncols() < 6 {
        return detections;
    }

    for row in predictions.outer_iter() {
        let objectness = row[4];
        if objectness < confidence_threshold {
            continue;
        }

        let (class, best_score) = row
            .slice(s![5..])
            .indexed_iter()
            .fold((0usize, f32::MIN), |best, (idx, &score)| {
                if score > best.1 {
                    (idx, score)
                } else {
                    best
                }
            });

        let confidence = objectness * best_score;
        if confidence < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        let xmin = (((cx - w / 2.0) - mapping.pad_x) / mapping.gain).clamp(0.0, mapping.width);
        let ymin = (((cy - h / 2.0) - mapping.pad_y) / mapping.gain).clamp(0.0, mapping.height);
        let xmax = (((cx + w / 2.0) - mapping.pad_x) / mapping.gain).clamp(0.0, mapping.width);
        let ymax = (((cy + h / 2.0) - mapping.pad_y) / mapping.gain).clamp(0.0, mapping.height);

        // Boxes fully inside the padding collapse to zero area
        if xmax <= xmin || ymax <= ymin {
            continue;
        }

        detections.push(Detection {
            xmin,
            ymin,
            xmax,
            ymax,
            confidence,
            class,
            name: class_name(class).to_string(),
        });
    }

    detections
}

/// Greedy per-class non-maximum suppression
///
/// Keeps the highest-confidence box and drops any same-class box overlapping
/// it above `iou_threshold`. Output stays sorted by descending confidence.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_unstable_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    'candidates: for detection in detections {
        for kept in &keep {
            if kept.class == detection.class && kept.iou(&detection) > iou_threshold {
                continue 'candidates;
            }
        }
        keep.push(detection);
    }

    keep
}
