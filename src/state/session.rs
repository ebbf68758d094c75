//! Session flags and the status snapshot

use serde::{Deserialize, Serialize};

use super::mode::OperatingMode;
use crate::pipeline::PipelinePhase;
use crate::remote::ListeningAddress;

/// Outcome of the camera permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Unknown,
    Granted,
    Denied,
}

impl Default for PermissionStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Flags describing the current session
///
/// `processing` is only ever set while `permission` is granted and the
/// camera was ready when the run started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub permission: PermissionStatus,
    pub camera_ready: bool,
    pub processing: bool,
    pub remote_enabled: bool,
}

/// Full session status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Daemon version
    pub version: String,

    /// Current operating mode
    pub mode: OperatingMode,

    pub permission: PermissionStatus,
    pub camera_ready: bool,
    pub processing: bool,
    pub phase: PipelinePhase,
    pub remote_enabled: bool,

    /// Address the remote listener advertises, when enabled
    pub remote: Option<ListeningAddress>,

    /// Uptime in seconds
    pub uptime_secs: u64,
}
