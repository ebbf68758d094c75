//! Configuration loading and management
//!
//! Everything comes from environment variables with defaults; only the
//! API key is required.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::capture::{CaptureSurface, CommandSurface, FileSurface};
use crate::speech::{CommandSink, LogSink, SpeechSink};
use crate::state::OperatingMode;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_SPEECH_PROGRAM: &str = "espeak-ng";
const DEFAULT_REMOTE_ADDR: &str = "0.0.0.0:8765";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub inference: InferenceConfig,
    pub capture: CaptureConfig,
    pub speech: SpeechConfig,
    pub remote: RemoteConfig,

    /// Mode active at startup
    pub initial_mode: OperatingMode,
}

/// Vision model endpoint
#[derive(Clone)]
pub struct InferenceConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    /// No timeout unless set
    pub request_timeout_secs: Option<u64>,
}

impl std::fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Where stills come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureConfig {
    /// Read the latest frame from a file
    File(PathBuf),
    /// Run a grabber; `command` defaults to ffmpeg on `device`
    Command {
        device: PathBuf,
        command: Option<Vec<String>>,
    },
}

impl CaptureConfig {
    /// Path whose presence and readability gate capture
    pub fn source_path(&self) -> &Path {
        match self {
            CaptureConfig::File(path) => path,
            CaptureConfig::Command { device, .. } => device,
        }
    }

    pub fn surface(&self) -> Arc<dyn CaptureSurface> {
        match self {
            CaptureConfig::File(path) => Arc::new(FileSurface::new(path)),
            CaptureConfig::Command {
                device,
                command: Some(command),
            } => {
                let (program, args) = split_program(command);
                Arc::new(CommandSurface::new(program, args, device))
            }
            CaptureConfig::Command {
                device,
                command: None,
            } => Arc::new(CommandSurface::ffmpeg(device)),
        }
    }
}

/// How utterances are produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechConfig {
    /// Log utterances only
    Log,
    /// Spawn a TTS program with the text as last argument
    Command(Vec<String>),
}

impl SpeechConfig {
    pub fn sink(&self) -> Arc<dyn SpeechSink> {
        match self {
            SpeechConfig::Log => Arc::new(LogSink),
            SpeechConfig::Command(command) => {
                let (program, args) = split_program(command);
                Arc::new(CommandSink::new(program, args))
            }
        }
    }
}

/// Remote command listener settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub bind: SocketAddr,
    /// Start listening at startup
    pub enabled: bool,
}

impl Config {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = var("GEMINI_API_KEY").context("GEMINI_API_KEY is not set")?;

        let request_timeout_secs = var("VISION_REQUEST_TIMEOUT_SECS")
            .map(|value| value.trim().parse::<u64>())
            .transpose()
            .context("VISION_REQUEST_TIMEOUT_SECS must be a whole number of seconds")?;

        let inference = InferenceConfig {
            api_key,
            model: var("VISION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: var("VISION_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            request_timeout_secs,
        };

        let capture = match var("VISION_CAPTURE_FILE") {
            Some(path) => CaptureConfig::File(PathBuf::from(path)),
            None => CaptureConfig::Command {
                device: PathBuf::from(
                    var("VISION_CAPTURE_DEVICE").unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
                ),
                command: var("VISION_CAPTURE_COMMAND").map(|cmd| words(&cmd)),
            },
        };

        let speech = match var("VISION_SPEECH_COMMAND") {
            Some(cmd) if cmd.trim().eq_ignore_ascii_case("log") => SpeechConfig::Log,
            Some(cmd) => SpeechConfig::Command(words(&cmd)),
            None => SpeechConfig::Command(vec![DEFAULT_SPEECH_PROGRAM.to_string()]),
        };

        let bind = var("VISION_REMOTE_ADDR")
            .unwrap_or_else(|| DEFAULT_REMOTE_ADDR.to_string())
            .trim()
            .parse::<SocketAddr>()
            .context("VISION_REMOTE_ADDR must be an address like 0.0.0.0:8765")?;

        let enabled = match var("VISION_REMOTE_ENABLED") {
            Some(value) => parse_flag(&value)
                .with_context(|| format!("VISION_REMOTE_ENABLED has invalid value {value:?}"))?,
            None => false,
        };

        let initial_mode = var("VISION_MODE")
            .map(|value| value.parse::<OperatingMode>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            inference,
            capture,
            speech,
            remote: RemoteConfig { bind, enabled },
            initial_mode,
        })
    }
}

fn words(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

fn split_program(command: &[String]) -> (String, Vec<String>) {
    match command.split_first() {
        Some((program, args)) => (program.clone(), args.to_vec()),
        None => (String::new(), Vec::new()),
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected true or false, got {other:?}"),
    }
}
