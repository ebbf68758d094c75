//! Session command loop
//!
//! The session owns the operating mode, the session flags, the pipeline
//! and the remote listener handle. Console input, remote commands and
//! lifecycle requests all arrive on one channel and are handled one at a
//! time, so mode reads and writes never interleave. Pipeline runs are
//! spawned so Stop is served while a run awaits the backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::events::SessionEvent;
use crate::permission::PermissionProvider;
use crate::pipeline::Pipeline;
use crate::remote::{self, RemoteHandle, RemoteReply};
use crate::speech::Speaker;
use crate::state::{OperatingMode, PermissionStatus, SessionSnapshot, SessionState};

pub const PERMISSION_DENIED_MESSAGE: &str =
    "Camera access was denied. Allow access to the camera and restart the assistant.";

pub const PERMISSION_PENDING_MESSAGE: &str = "Waiting for camera permission.";

pub const CAMERA_UNAVAILABLE_MESSAGE: &str =
    "The camera is unavailable. Check that it is connected.";

/// Requests handled by the session loop
#[derive(Debug)]
pub enum SessionCommand {
    /// Capture a frame and describe it in the current mode
    Capture,
    /// Abandon any run in flight and silence speech
    Stop,
    /// Select an operating mode locally
    SetMode(OperatingMode),
    /// A token received by the remote listener
    Remote {
        token: String,
        reply: oneshot::Sender<RemoteReply>,
    },
    EnableRemote,
    DisableRemote,
    Status {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

pub struct Session {
    mode: OperatingMode,
    state: SessionState,
    pipeline: Arc<Pipeline>,
    permission: Arc<dyn PermissionProvider>,
    speaker: Speaker,
    remote_bind: SocketAddr,
    remote: Option<RemoteHandle>,
    /// Handed to the remote listener; weak so the loop ends with its last client
    commands: mpsc::WeakSender<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
    started_at: Instant,
}

impl Session {
    pub fn new(
        mode: OperatingMode,
        remote_bind: SocketAddr,
        pipeline: Arc<Pipeline>,
        permission: Arc<dyn PermissionProvider>,
        speaker: Speaker,
        commands: &mpsc::Sender<SessionCommand>,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            mode,
            state: SessionState::default(),
            pipeline,
            permission,
            speaker,
            remote_bind,
            remote: None,
            commands: commands.downgrade(),
            event_tx,
            started_at: Instant::now(),
        }
    }

    /// Request camera permission and check the capture surface
    ///
    /// A denial is final for this session.
    pub async fn initialize(&mut self) {
        self.state.permission = self.permission.request_access().await;
        self.state.camera_ready = self.pipeline.camera_ready();

        info!(
            permission = ?self.state.permission,
            camera_ready = self.state.camera_ready,
            mode = %self.mode,
            "session initialized"
        );

        if self.state.permission == PermissionStatus::Denied {
            self.speaker.replace(PERMISSION_DENIED_MESSAGE);
        } else if !self.state.camera_ready {
            warn!("capture surface unavailable at startup");
            self.speaker.replace(CAMERA_UNAVAILABLE_MESSAGE);
        }
    }

    /// Process commands until every sender is gone
    pub async fn run(&mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        info!(mode = %self.mode, "session started");

        while let Some(command) = commands.recv().await {
            debug!(?command, "session command");
            self.handle(command).await;
        }

        info!("session stopped");
    }

    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Capture => self.capture(),
            SessionCommand::Stop => self.stop(),
            SessionCommand::SetMode(mode) => {
                self.set_mode(mode);
                self.speaker.replace(&format!("Switched to {} mode.", mode));
            }
            SessionCommand::Remote { token, reply } => {
                let text = self.apply_remote(&token);
                let _ = reply.send(RemoteReply::Spoken {
                    text,
                    mode: self.mode,
                });
            }
            SessionCommand::EnableRemote => self.enable_remote().await,
            SessionCommand::DisableRemote => self.disable_remote().await,
            SessionCommand::Status { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn capture(&mut self) {
        match self.state.permission {
            PermissionStatus::Granted => {}
            PermissionStatus::Denied => {
                self.speaker.replace(PERMISSION_DENIED_MESSAGE);
                return;
            }
            PermissionStatus::Unknown => {
                self.speaker.replace(PERMISSION_PENDING_MESSAGE);
                return;
            }
        }

        if self.pipeline.is_processing() {
            debug!("capture ignored, run already in flight");
            return;
        }

        let pipeline = Arc::clone(&self.pipeline);
        let mode = self.mode;
        tokio::spawn(async move {
            pipeline.trigger(mode).await;
        });
    }

    fn stop(&mut self) {
        let abandoned_run = self.pipeline.stop();
        let _ = self.event_tx.send(SessionEvent::Stopped { abandoned_run });
    }

    fn set_mode(&mut self, mode: OperatingMode) {
        let previous = self.mode;
        self.mode = mode;

        if previous != mode {
            info!(from = %previous, to = %mode, "mode changed");
            let _ = self
                .event_tx
                .send(SessionEvent::ModeChanged { mode, previous });
        }
    }

    /// Interpret a remote token against the current mode and apply it
    fn apply_remote(&mut self, token: &str) -> String {
        let effect = remote::interpret(token, self.mode);
        info!(%token, ?effect, "remote command");

        if let Some(mode) = effect.mode_change() {
            self.set_mode(mode);
        }

        let text = effect.utterance().to_string();
        self.speaker.replace(&text);
        text
    }

    async fn enable_remote(&mut self) {
        if let Some(handle) = &self.remote {
            let address = handle.address();
            self.speaker.replace(&format!(
                "Remote control is already listening on {}.",
                address.advertised
            ));
            return;
        }

        let Some(commands) = self.commands.upgrade() else {
            warn!("session is closing, remote control not started");
            return;
        };

        match remote::start(self.remote_bind, commands).await {
            Ok(handle) => {
                let address = handle.address();
                self.remote = Some(handle);
                self.state.remote_enabled = true;
                self.speaker.replace(&format!(
                    "Remote control enabled on {}.",
                    address.advertised
                ));
                let _ = self.event_tx.send(SessionEvent::RemoteEnabled { address });
            }
            Err(e) => {
                error!(?e, "failed to start remote control");
                self.speaker.replace("Could not start remote control.");
            }
        }
    }

    async fn disable_remote(&mut self) {
        let Some(handle) = self.remote.take() else {
            debug!("remote control already disabled");
            return;
        };

        handle.stop().await;
        self.state.remote_enabled = false;
        self.speaker.replace("Remote control disabled.");
        let _ = self.event_tx.send(SessionEvent::RemoteDisabled);
    }

    pub fn snapshot(&mut self) -> SessionSnapshot {
        self.state.camera_ready = self.pipeline.camera_ready();
        self.state.processing = self.pipeline.is_processing();

        SessionSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: self.mode,
            permission: self.state.permission,
            camera_ready: self.state.camera_ready,
            processing: self.state.processing,
            phase: self.pipeline.phase(),
            remote_enabled: self.state.remote_enabled,
            remote: self.remote.as_ref().map(RemoteHandle::address),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    /// Release the remote listener and silence speech
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.remote.take() {
            handle.stop().await;
            self.state.remote_enabled = false;
        }
        self.pipeline.stop();
        info!("session shutdown complete");
    }
}
