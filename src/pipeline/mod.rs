//! Capture-and-describe pipeline
//!
//! One run per trigger: `Idle -> Capturing -> AwaitingResult -> Idle`.
//! Every completed run speaks exactly one utterance and releases the busy
//! flag; a Stop abandons the run so its late result is dropped silently.

mod busy;

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::capture::{CaptureError, CaptureSurface};
use crate::events::SessionEvent;
use crate::inference::{CaptureRequest, DescriptionBackend, InferenceError, InferenceResult};
use crate::prompt;
use crate::speech::Speaker;
use crate::state::OperatingMode;

pub use busy::{BusyFlag, PipelinePhase};

/// Spoken when the capture surface is not ready
pub const NOT_READY_MESSAGE: &str = "The camera is not ready yet.";

/// Spoken when the model answered without any usable description
pub const NO_DESCRIPTION_MESSAGE: &str = "Sorry, no clear description was generated.";

/// Per-run failures
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to capture image: {0}")]
    Capture(#[from] CaptureError),

    #[error("error analyzing image: {0}")]
    Inference(#[from] InferenceError),
}

/// How a trigger ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The model described the frame
    Described { text: String },
    /// The model answered without usable text
    NoDescription,
    /// The still could not be taken
    CaptureFailed { reason: String },
    /// The backend call failed
    TransportFailed { reason: String },
    /// The capture surface was not ready; nothing was sent
    NotReady,
    /// A run was already in flight; the trigger was ignored
    Busy,
    /// Stop was requested before the run completed
    Abandoned,
}

impl RunOutcome {
    /// Text spoken for this outcome, if any
    pub fn utterance(&self) -> Option<String> {
        match self {
            RunOutcome::Described { text } => Some(text.clone()),
            RunOutcome::NoDescription => Some(NO_DESCRIPTION_MESSAGE.to_string()),
            RunOutcome::CaptureFailed { reason } => {
                Some(format!("Failed to capture image: {}", reason))
            }
            RunOutcome::TransportFailed { reason } => {
                Some(format!("Error analyzing image: {}", reason))
            }
            RunOutcome::NotReady => Some(NOT_READY_MESSAGE.to_string()),
            RunOutcome::Busy | RunOutcome::Abandoned => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Described { .. } => "described",
            RunOutcome::NoDescription => "no_description",
            RunOutcome::CaptureFailed { .. } => "capture_failed",
            RunOutcome::TransportFailed { .. } => "transport_failed",
            RunOutcome::NotReady => "not_ready",
            RunOutcome::Busy => "busy",
            RunOutcome::Abandoned => "abandoned",
        }
    }
}

impl From<PipelineError> for RunOutcome {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Capture(e) => RunOutcome::CaptureFailed {
                reason: e.to_string(),
            },
            PipelineError::Inference(e) => RunOutcome::TransportFailed {
                reason: e.to_string(),
            },
        }
    }
}

/// Orchestrates capture, inference and spoken feedback
pub struct Pipeline {
    capture: Arc<dyn CaptureSurface>,
    backend: Arc<dyn DescriptionBackend>,
    speaker: Speaker,
    busy: BusyFlag,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Pipeline {
    pub fn new(
        capture: Arc<dyn CaptureSurface>,
        backend: Arc<dyn DescriptionBackend>,
        speaker: Speaker,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            capture,
            backend,
            speaker,
            busy: BusyFlag::default(),
            event_tx,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn phase(&self) -> PipelinePhase {
        self.busy.phase()
    }

    pub fn camera_ready(&self) -> bool {
        self.capture.is_ready()
    }

    /// Run one capture-and-describe cycle for `mode`
    pub async fn trigger(&self, mode: OperatingMode) -> RunOutcome {
        if self.busy.is_busy() {
            debug!("capture already in flight, ignoring trigger");
            return RunOutcome::Busy;
        }

        if !self.capture.is_ready() {
            info!(surface = self.capture.name(), "capture surface not ready");
            self.speaker.replace(NOT_READY_MESSAGE);
            return RunOutcome::NotReady;
        }

        let Some(guard) = self.busy.try_begin() else {
            return RunOutcome::Busy;
        };

        let started_at = Instant::now();
        info!(%mode, "capture started");
        let _ = self.event_tx.send(SessionEvent::CaptureStarted { mode });

        guard.enter(PipelinePhase::Capturing);
        let outcome = match self.capture.take_still().await {
            Ok(image) => {
                if !guard.is_active() {
                    debug!("run stopped during capture");
                    return RunOutcome::Abandoned;
                }

                self.speaker.cancel();
                guard.enter(PipelinePhase::AwaitingResult);

                let request = CaptureRequest {
                    image,
                    instruction: prompt::resolve(mode),
                };
                match self.backend.describe(request).await {
                    Ok(InferenceResult::Description(text)) => RunOutcome::Described { text },
                    Ok(InferenceResult::NoCandidate) => {
                        warn!(backend = self.backend.name(), "no candidate in response");
                        RunOutcome::NoDescription
                    }
                    Err(e) => PipelineError::from(e).into(),
                }
            }
            Err(e) => PipelineError::from(e).into(),
        };

        let utterance = outcome.utterance();
        let completed = guard.finish(|| {
            if let Some(text) = &utterance {
                self.speaker.replace(text);
            }
        });

        if !completed {
            info!(outcome = outcome.label(), "result arrived after stop, dropped");
            return RunOutcome::Abandoned;
        }

        let duration_ms = started_at.elapsed().as_millis() as u64;
        info!(outcome = outcome.label(), duration_ms, "capture finished");
        let _ = self.event_tx.send(SessionEvent::RunFinished {
            outcome: outcome.clone(),
            duration_ms,
        });

        outcome
    }

    /// Clear the busy flag and silence speech, whatever the pipeline is doing
    ///
    /// The in-flight backend call, if any, is not cancelled; its result is
    /// discarded when it arrives. Returns whether a run was abandoned.
    pub fn stop(&self) -> bool {
        let abandoned = self.busy.cancel_with(|| self.speaker.cancel());
        info!(abandoned, "pipeline stopped");
        abandoned
    }
}
