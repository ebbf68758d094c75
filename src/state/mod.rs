//! Session state module
//!
//! Holds the operating mode and the small set of session flags:
//! - permission: unknown, granted or denied
//! - camera_ready: the capture surface can produce a still
//! - processing: a capture-and-describe run is in flight
//! - remote_enabled: the remote command listener is bound

mod mode;
mod session;

pub use mode::OperatingMode;
pub use session::{PermissionStatus, SessionSnapshot, SessionState};
