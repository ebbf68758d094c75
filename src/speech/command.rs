//! Concrete speech sinks
//!
//! [`CommandSink`] runs an external TTS program (`espeak-ng`, `say`, ...)
//! with the text as its last argument, after `--` so that utterances starting
//! with a dash are never read as options, and kills it on cancel.
//! [`LogSink`] only logs, for headless runs.

use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::{SpeechError, SpeechSink};

/// Speaks by spawning one TTS process per utterance
pub struct CommandSink {
    program: String,
    args: Vec<String>,
    current: Mutex<Option<Child>>,
}

impl CommandSink {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            current: Mutex::new(None),
        }
    }
}

impl SpeechSink for CommandSink {
    fn cancel(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        let Some(mut child) = current.take() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) if !status.success() => {
                warn!(program = %self.program, %status, "speech process failed");
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(pid = child.id(), "stopping utterance");
                if let Err(e) = child.kill() {
                    warn!(?e, "failed to stop speech process");
                }
                let _ = child.wait();
            }
            Err(e) => warn!(?e, "failed to poll speech process"),
        }
    }

    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = Some(child);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.program
    }
}

impl Drop for CommandSink {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Writes utterances to the log instead of a speaker
#[derive(Debug, Default)]
pub struct LogSink;

impl SpeechSink for LogSink {
    fn cancel(&self) {}

    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        info!(%text, "utterance");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
