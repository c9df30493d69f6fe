// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart upload intake and temporary image files

use axum_extra::extract::Multipart;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::version::SUPPORTED_FORMATS;

pub const NO_FILE_PROVIDED: &str = "No file provided";

/// Multipart field carrying the image
pub const FILE_FIELD: &str = "file";

/// An uploaded image on disk, removed when dropped
#[derive(Debug)]
pub struct TempImage {
    path: PathBuf,
}

impl TempImage {
    /// Reserve a request-scoped path `<dir>/temp_img_<uuid>.<ext>`
    pub fn reserve(dir: &Path, extension: &str) -> Self {
        Self {
            path: dir.join(format!("temp_img_{}.{}", Uuid::new_v4(), extension)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for TempImage {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

/// Lowercased text after the last `.`, or the whole name without one
pub fn file_extension(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or(filename)
        .to_lowercase()
}

/// Check the upload's extension against the supported formats
pub fn validate_extension(filename: &str) -> Result<String, ApiError> {
    let extension = file_extension(filename);
    if SUPPORTED_FORMATS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(ApiError::BadRequest(format!(
            "Unsupported file format: {}. Supported formats: {}",
            extension,
            SUPPORTED_FORMATS.join(", ")
        )))
    }
}

fn save_failed(e: impl std::fmt::Display) -> ApiError {
    ApiError::IoFailure(format!("Failed to save file: {}", e))
}

/// Stream the `file` field to a fresh temp image
///
/// Other fields are skipped. Bytes are written verbatim; the image content
/// is not inspected here.
pub async fn persist_upload(
    multipart: &mut Multipart,
    temp_dir: &Path,
    max_bytes: usize,
) -> Result<TempImage, ApiError> {
    loop {
        let field = multipart.next_field().await.map_err(|e| {
            debug!("Malformed multipart body: {}", e);
            ApiError::BadRequest(NO_FILE_PROVIDED.to_string())
        })?;

        let Some(mut field) = field else {
            return Err(ApiError::BadRequest(NO_FILE_PROVIDED.to_string()));
        };

        if field.name() != Some(FILE_FIELD) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.trim().is_empty() {
            return Err(ApiError::BadRequest(NO_FILE_PROVIDED.to_string()));
        }

        let extension = validate_extension(&filename)?;
        let image = TempImage::reserve(temp_dir, &extension);
        let mut file = tokio::fs::File::create(image.path())
            .await
            .map_err(save_failed)?;

        let mut written = 0usize;
        while let Some(chunk) = field.chunk().await.map_err(|e| {
            debug!("Upload {} body ended early: {}", filename, e);
            ApiError::BadRequest(format!("Malformed upload: {}", e))
        })? {
            written += chunk.len();
            if written > max_bytes {
                warn!("Upload {} exceeds {} bytes", filename, max_bytes);
                return Err(ApiError::PayloadTooLarge { limit: max_bytes });
            }
            file.write_all(&chunk).await.map_err(save_failed)?;
        }
        file.flush().await.map_err(save_failed)?;

        debug!(
            "Saved upload {} ({} bytes) to {}",
            filename,
            written,
            image.path().display()
        );
        return Ok(image);
    }
}
