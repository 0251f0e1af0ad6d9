// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Detect endpoint tests for POST /detect
//!
//! These tests verify the endpoint contract without a model on disk:
//! - Missing `image` field, empty payloads, and non-multipart bodies are
//!   rejected with 400 and the fixed error body
//! - Wrong methods on the detect route get the same 400 response
//! - A valid upload with no model loaded reports 503
//!
//! Inference-dependent behavior is covered by the `#[ignore]`d tests at the
//! bottom, which need a model repository at ./models.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use fabstir_vision_node::api::{build_router, ApiConfig, AppState};
use fabstir_vision_node::detection::{DetectorConfig, OnnxYoloModel};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "fabstir-test-boundary";

/// Helper: Build a multipart request body with a single file field
fn multipart_body(field_name: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field_name, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/detect")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A tiny but valid image payload (1x1 PNG, generated in memory)
fn png_bytes() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(1, 1, image::Rgb([120, 30, 200]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

// ========== ERROR CONTRACT (no model required) ==========

#[tokio::test]
async fn test_get_detect_returns_400_with_fixed_body() {
    let app = build_router(AppState::new_for_test());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/detect")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body, serde_json::json!({ "error": "Image not provided" }));
}

#[tokio::test]
async fn test_put_detect_returns_400_with_fixed_body() {
    let app = build_router(AppState::new_for_test());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::PUT)
                .uri("/detect")
                .body(Body::from("ignored"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Image not provided");
}

#[tokio::test]
async fn test_post_without_multipart_body_returns_400() {
    let app = build_router(AppState::new_for_test());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/detect")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Image not provided");
}

#[tokio::test]
async fn test_post_with_wrong_field_name_returns_400() {
    let app = build_router(AppState::new_for_test());

    let body = multipart_body("file", "photo.jpg", &png_bytes());
    let response = app.oneshot(multipart_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Image not provided");
}

#[tokio::test]
async fn test_post_with_empty_image_field_returns_400() {
    let app = build_router(AppState::new_for_test());

    let body = multipart_body("image", "photo.jpg", b"");
    let response = app.oneshot(multipart_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Image not provided");
}

#[tokio::test]
async fn test_post_valid_image_without_model_returns_503() {
    let app = build_router(AppState::new_for_test());

    let body = multipart_body("image", "photo.png", &png_bytes());
    let response = app.oneshot(multipart_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Service unavailable"));
}

// ========== INFERENCE PATH (model repository required) ==========

async fn state_with_model(upload_dir: &std::path::Path) -> AppState {
    let detector = OnnxYoloModel::new(&DetectorConfig::default())
        .await
        .expect("model repository at ./models is required for ignored tests");

    let state = AppState::new(ApiConfig {
        upload_dir: upload_dir.to_path_buf(),
        ..Default::default()
    });
    state.set_detector(Arc::new(detector)).await;
    state
}

#[tokio::test]
#[ignore] // Only run if a model repository is available locally
async fn test_post_valid_image_returns_detection_records() {
    let upload_dir = tempfile::tempdir().unwrap();
    let app = build_router(state_with_model(upload_dir.path()).await);

    let image = image::RgbImage::from_pixel(320, 240, image::Rgb([90, 120, 90]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, image::ImageFormat::Jpeg)
        .unwrap();

    let body = multipart_body("image", "scene.jpg", &bytes.into_inner());
    let response = app.oneshot(multipart_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let detections = body["detections"].as_array().unwrap();
    for record in detections {
        for column in ["xmin", "ymin", "xmax", "ymax", "confidence", "class", "name"] {
            assert!(record.get(column).is_some(), "missing column {}", column);
        }
    }

    // The temp upload must be gone once the request completed
    let leftover: Vec<_> = std::fs::read_dir(upload_dir.path()).unwrap().collect();
    assert!(leftover.is_empty(), "temp upload not cleaned up: {:?}", leftover);
}

#[tokio::test]
#[ignore] // Only run if a model repository is available locally
async fn test_corrupt_image_is_cleaned_up_and_reported() {
    let upload_dir = tempfile::tempdir().unwrap();
    let app = build_router(state_with_model(upload_dir.path()).await);

    let body = multipart_body("image", "broken.jpg", b"this is not an image");
    let response = app.oneshot(multipart_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let leftover: Vec<_> = std::fs::read_dir(upload_dir.path()).unwrap().collect();
    assert!(leftover.is_empty(), "temp upload not cleaned up: {:?}", leftover);
}
