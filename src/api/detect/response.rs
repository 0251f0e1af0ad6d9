// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detect endpoint response types

use serde::{Deserialize, Serialize};

use crate::detection::Detection;

/// Response for POST /detect
///
/// The detection records are serialized exactly as the model produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub detections: Vec<Detection>,
}

impl DetectResponse {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}
