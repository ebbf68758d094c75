//! Capture surface that shells out to a frame grabber
//!
//! The default grabber is ffmpeg reading one frame from a V4L2 device and
//! writing it as JPEG to stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{CaptureError, CaptureSurface, ImagePayload};

pub struct CommandSurface {
    program: String,
    args: Vec<String>,
    device: PathBuf,
}

impl CommandSurface {
    /// `device` is checked for existence to decide readiness
    pub fn new(program: impl Into<String>, args: Vec<String>, device: &Path) -> Self {
        Self {
            program: program.into(),
            args,
            device: device.to_owned(),
        }
    }

    /// ffmpeg grabbing a single JPEG frame from `device`
    pub fn ffmpeg(device: &Path) -> Self {
        let device_arg = device.display().to_string();
        let args = [
            "-loglevel",
            "error",
            "-f",
            "v4l2",
            "-i",
            device_arg.as_str(),
            "-frames:v",
            "1",
            "-f",
            "image2pipe",
            "-c:v",
            "mjpeg",
            "-",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self::new("ffmpeg", args, device)
    }
}

#[async_trait]
impl CaptureSurface for CommandSurface {
    fn is_ready(&self) -> bool {
        self.device.exists()
    }

    async fn take_still(&self) -> Result<ImagePayload, CaptureError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CaptureError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CaptureError::ProgramFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if output.stdout.is_empty() {
            return Err(CaptureError::Empty);
        }

        debug!(program = %self.program, size = output.stdout.len(), "frame captured");
        Ok(ImagePayload::jpeg(output.stdout))
    }

    fn name(&self) -> &str {
        &self.program
    }
}
