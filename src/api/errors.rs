// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Error body returned by every failing endpoint: `{"error": "<message>"}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

/// API-level errors
///
/// The missing-image case is the only one that is part of the stable
/// contract (HTTP 400 with a fixed message). Everything else is the
/// "unhandled failure surfaces as a server error" path.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// No usable image in the request: missing `image` field, empty payload,
    /// non-multipart body, or a non-POST method on the detect route
    ImageNotProvided,
    /// The detection model is not loaded
    ServiceUnavailable(String),
    /// Inference or I/O failure while processing the request
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::ImageNotProvided => 400,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::InternalError(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::ImageNotProvided => write!(f, "Image not provided"),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(self.to_response())).into_response()
    }
}
