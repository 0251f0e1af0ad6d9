// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Temporary storage for uploaded images
//!
//! Uploads are written under a unique per-request name so concurrent
//! requests can never race on the same path, and removed as soon as
//! inference finishes. The temp file exists only during inference.

use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

/// Longest file extension carried over from the uploaded filename
const MAX_EXTENSION_LEN: usize = 8;

/// A temporary file holding one request's uploaded image
///
/// The file is removed by [`TempUpload::cleanup`] on the normal path; if the
/// handler bails out early, `Drop` removes it instead.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
    cleaned: bool,
}

impl TempUpload {
    /// Write `bytes` to a uniquely named file inside `dir`
    ///
    /// The extension is taken from the uploaded filename when it looks sane,
    /// falling back to `jpg` (the format decoder sniffs the real content
    /// anyway).
    pub async fn write(
        dir: &Path,
        bytes: &[u8],
        original_name: Option<&str>,
    ) -> std::io::Result<Self> {
        let extension = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LEN
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .unwrap_or("jpg");

        let path = dir.join(format!("upload-{}.{}", Uuid::new_v4(), extension));

        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, bytes).await?;

        Ok(Self {
            path,
            cleaned: false,
        })
    }

    /// Path of the temporary file on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file from disk
    pub async fn cleanup(mut self) {
        self.cleaned = true;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!("Failed to remove temp upload {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        // Last-resort removal for paths that skipped cleanup()
        if !self.cleaned && self.path.exists() {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
