// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detect endpoint handler

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use bytes::Bytes;
use tracing::{debug, info, warn};

use super::response::DetectResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::utils::TempUpload;

/// POST /detect - Detect objects in an uploaded image
///
/// Accepts a multipart form with an `image` file field. The upload is
/// written to a uniquely named temporary file, the detection model runs on
/// it, and the file is removed again whether inference succeeded or not.
///
/// # Response
/// - `detections`: one record per detected object, with `xmin`, `ymin`,
///   `xmax`, `ymax`, `confidence`, `class`, and `name`
///
/// # Errors
/// - 400 Bad Request: no `image` field, empty payload, or non-multipart body
/// - 503 Service Unavailable: detection model not loaded
/// - 500 Internal Server Error: inference or disk failure
pub async fn detect_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    // A POST without a multipart body gets the same answer as a missing field
    let mut multipart = multipart.map_err(|_| ApiError::ImageNotProvided)?;

    let (bytes, file_name) = extract_image_field(&mut multipart).await?;
    if bytes.is_empty() {
        return Err(ApiError::ImageNotProvided);
    }

    let detector = {
        let guard = state.detector.read().await;
        guard.clone().ok_or_else(|| {
            warn!("Detect request received but no model is loaded");
            ApiError::ServiceUnavailable("Detection model not loaded".to_string())
        })?
    };

    let upload = TempUpload::write(&state.config.upload_dir, &bytes, file_name.as_deref())
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to store upload: {}", e)))?;

    debug!(
        "Running detection on {} ({} bytes)",
        upload.path().display(),
        bytes.len()
    );
    let result = detector.detect(upload.path()).await;

    // Removed on success and failure alike; the file only lives while
    // inference runs
    upload.cleanup().await;

    match result {
        Ok(detections) => {
            info!("Detection complete: {} objects found", detections.len());
            Ok(Json(DetectResponse::new(detections)))
        }
        Err(e) => {
            warn!("Detection failed: {}", e);
            Err(ApiError::InternalError(e.to_string()))
        }
    }
}

/// Any non-POST request on the detect route
pub async fn detect_fallback_handler() -> ApiError {
    ApiError::ImageNotProvided
}

/// Pull the `image` field out of the multipart stream
async fn extract_image_field(
    multipart: &mut Multipart,
) -> Result<(Bytes, Option<String>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::ImageNotProvided)?
    {
        if field.name() == Some("image") {
            let file_name = field.file_name().map(ToString::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|_| ApiError::ImageNotProvided)?;
            return Ok((bytes, file_name));
        }
    }

    Err(ApiError::ImageNotProvided)
}
