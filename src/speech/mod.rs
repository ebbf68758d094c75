//! Speech feedback module
//!
//! A [`SpeechSink`] is the platform text-to-speech capability. The
//! [`Speaker`] wraps a sink and turns "cancel, then speak" into a single
//! `replace` step so a new utterance never interleaves with a stale one.

mod command;

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

pub use command::{CommandSink, LogSink};

/// Errors raised by speech sinks
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("failed to start speech program `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Text-to-speech capability
pub trait SpeechSink: Send + Sync {
    /// Stop the utterance currently playing, if any
    fn cancel(&self);

    /// Start speaking `text`
    fn speak(&self, text: &str) -> Result<(), SpeechError>;

    fn name(&self) -> &str;
}

/// Shared handle used by every component that talks to the user
#[derive(Clone)]
pub struct Speaker {
    sink: Arc<dyn SpeechSink>,
    lock: Arc<Mutex<()>>,
}

impl Speaker {
    pub fn new(sink: Arc<dyn SpeechSink>) -> Self {
        Self {
            sink,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Replace whatever is being spoken with `text`
    pub fn replace(&self, text: &str) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.sink.cancel();
        debug!(sink = self.sink.name(), %text, "speaking");
        if let Err(e) = self.sink.speak(text) {
            warn!(?e, "speech output failed");
        }
    }

    /// Silence the current utterance
    pub fn cancel(&self) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.sink.cancel();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingSink, SpeechCall};
    use super::*;

    #[test]
    fn test_replace_cancels_before_speaking() {
        let sink = Arc::new(RecordingSink::default());
        let speaker = Speaker::new(sink.clone());

        speaker.replace("first");
        speaker.replace("second");

        assert_eq!(
            sink.calls(),
            vec![
                SpeechCall::Cancel,
                SpeechCall::Speak("first".to_string()),
                SpeechCall::Cancel,
                SpeechCall::Speak("second".to_string()),
            ]
        );
    }

    #[test]
    fn test_cancel_only_cancels() {
        let sink = Arc::new(RecordingSink::default());
        let speaker = Speaker::new(sink.clone());

        speaker.cancel();

        assert_eq!(sink.cancels(), 1);
        assert!(sink.spoken().is_empty());
    }
}
