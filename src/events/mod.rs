//! Events module for session activity
//!
//! Provides structured event types for mode changes, pipeline runs,
//! stop requests and remote listener lifecycle.

use serde::{Deserialize, Serialize};

use crate::pipeline::RunOutcome;
use crate::remote::ListeningAddress;
use crate::state::OperatingMode;

/// Events emitted by the session and the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Operating mode switched (console or remote)
    ModeChanged {
        mode: OperatingMode,
        previous: OperatingMode,
    },

    /// A pipeline run left Idle
    CaptureStarted { mode: OperatingMode },

    /// A pipeline run completed and its result was spoken
    RunFinished {
        outcome: RunOutcome,
        /// Milliseconds from trigger to spoken result
        duration_ms: u64,
    },

    /// Stop was requested
    Stopped {
        /// Whether a run was in flight and got abandoned
        abandoned_run: bool,
    },

    /// Remote listener bound
    RemoteEnabled { address: ListeningAddress },

    /// Remote listener closed
    RemoteDisabled,
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::ModeChanged { mode, previous } => {
                write!(f, "MODE_CHANGED ({} -> {})", previous, mode)
            }
            SessionEvent::CaptureStarted { mode } => write!(f, "CAPTURE_STARTED ({})", mode),
            SessionEvent::RunFinished { outcome, duration_ms } => {
                write!(f, "RUN_FINISHED ({}, {}ms)", outcome.label(), duration_ms)
            }
            SessionEvent::Stopped { abandoned_run } => {
                write!(f, "STOPPED (abandoned_run={})", abandoned_run)
            }
            SessionEvent::RemoteEnabled { address } => {
                write!(f, "REMOTE_ENABLED ({})", address.advertised)
            }
            SessionEvent::RemoteDisabled => write!(f, "REMOTE_DISABLED"),
        }
    }
}
