//! Capture surface module
//!
//! The capture surface reports whether it is ready and produces one
//! still JPEG on demand. Two surfaces are provided:
//! - [`FileSurface`]: reads the latest frame written by another process
//! - [`CommandSurface`]: runs a grabber program that writes a JPEG to stdout

mod command;
mod file;

use async_trait::async_trait;

pub use command::CommandSurface;
pub use file::FileSurface;

/// MIME type declared for every captured still
pub const JPEG_MIME: &str = "image/jpeg";

/// One captured still image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl ImagePayload {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: JPEG_MIME,
        }
    }
}

/// Errors raised while taking a still
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to read frame {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run capture program `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("capture program `{program}` exited with {status}: {stderr}")]
    ProgramFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("captured image is empty")]
    Empty,
}

/// Platform camera collaborator
#[async_trait]
pub trait CaptureSurface: Send + Sync {
    /// Whether a still can be taken right now
    fn is_ready(&self) -> bool;

    /// Take a single still image
    async fn take_still(&self) -> Result<ImagePayload, CaptureError>;

    fn name(&self) -> &str;
}
