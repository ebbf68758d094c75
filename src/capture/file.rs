//! Capture surface backed by a frame file

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{CaptureError, CaptureSurface, ImagePayload};

/// Reads the most recent frame from a JPEG file on disk
pub struct FileSurface {
    path: PathBuf,
}

impl FileSurface {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
        }
    }
}

#[async_trait]
impl CaptureSurface for FileSurface {
    fn is_ready(&self) -> bool {
        self.path.is_file()
    }

    async fn take_still(&self) -> Result<ImagePayload, CaptureError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| CaptureError::Read {
                path: self.path.display().to_string(),
                source,
            })?;

        if bytes.is_empty() {
            return Err(CaptureError::Empty);
        }

        debug!(path = ?self.path, size = bytes.len(), "frame read");
        Ok(ImagePayload::jpeg(bytes))
    }

    fn name(&self) -> &str {
        "file"
    }
}
