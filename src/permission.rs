//! Camera access permission
//!
//! On desktop systems "permission" means the daemon's user may open the
//! capture device (or frame file) for reading.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::state::PermissionStatus;

/// Platform permission collaborator
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Ask for camera access; resolves to granted or denied
    async fn request_access(&self) -> PermissionStatus;
}

/// Grants access when the capture source can be opened for reading
pub struct DevicePermission {
    path: PathBuf,
}

impl DevicePermission {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
        }
    }
}

#[async_trait]
impl PermissionProvider for DevicePermission {
    async fn request_access(&self) -> PermissionStatus {
        match tokio::fs::File::open(&self.path).await {
            Ok(_) => PermissionStatus::Granted,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!(path = ?self.path, "access to capture source denied");
                PermissionStatus::Denied
            }
            // A missing source is a readiness problem, not a permission one
            Err(e) => {
                debug!(path = ?self.path, ?e, "capture source not openable yet");
                PermissionStatus::Granted
            }
        }
    }
}
