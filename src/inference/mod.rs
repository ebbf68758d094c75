//! Inference backend module
//!
//! The backend receives one [`CaptureRequest`] per trigger and answers with
//! either a description or [`InferenceResult::NoCandidate`] when the
//! response carried no usable text. Transport and decoding problems are
//! reported as [`InferenceError`].

mod gemini;

use async_trait::async_trait;

use crate::capture::ImagePayload;

pub use gemini::GeminiBackend;

/// Image plus the instruction resolved for the mode active at capture time
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub image: ImagePayload,
    pub instruction: &'static str,
}

/// What came back from the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceResult {
    /// First candidate text, trimmed and non-empty
    Description(String),
    /// Response present but without any usable text
    NoCandidate,
}

/// Errors raised by inference backends
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// `message` is the service's short error text, not the raw body
    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Remote image-description service
#[async_trait]
pub trait DescriptionBackend: Send + Sync {
    async fn describe(&self, request: CaptureRequest) -> Result<InferenceResult, InferenceError>;

    fn name(&self) -> &str;
}
