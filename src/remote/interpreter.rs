//! Remote command vocabulary and interpretation
//!
//! Tokens are matched case-insensitively. Anything outside the vocabulary
//! is echoed back instead of failing.

use serde::{Deserialize, Serialize};

use crate::state::OperatingMode;

/// Spoken in reply to `speak`
pub const GREETING: &str = "Hello! Remote control is connected.";

/// One command received from a remote client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    Speak,
    Status,
    SetMode(OperatingMode),
    Unrecognized(String),
}

impl RemoteCommand {
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        match token.to_ascii_lowercase().as_str() {
            "speak" => RemoteCommand::Speak,
            "status" => RemoteCommand::Status,
            "read" => RemoteCommand::SetMode(OperatingMode::Read),
            "navigate" => RemoteCommand::SetMode(OperatingMode::Navigate),
            "passive" => RemoteCommand::SetMode(OperatingMode::Passive),
            _ => RemoteCommand::Unrecognized(token.to_string()),
        }
    }
}

/// Side effect of a remote command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Switch the operating mode and confirm it aloud
    SwitchMode {
        mode: OperatingMode,
        confirmation: String,
    },
    /// Announce the mode active at interpretation time
    AnnounceMode { announcement: String },
    /// Generic greeting
    Greet { greeting: String },
    /// Acknowledge an unrecognized token
    Echo { echo: String },
}

impl Effect {
    /// Text to speak for this effect
    pub fn utterance(&self) -> &str {
        match self {
            Effect::SwitchMode { confirmation, .. } => confirmation,
            Effect::AnnounceMode { announcement } => announcement,
            Effect::Greet { greeting } => greeting,
            Effect::Echo { echo } => echo,
        }
    }

    /// Mode to switch to, if the effect changes it
    pub fn mode_change(&self) -> Option<OperatingMode> {
        match self {
            Effect::SwitchMode { mode, .. } => Some(*mode),
            _ => None,
        }
    }
}

/// Map a token to its effect given the mode active right now
pub fn interpret(token: &str, current_mode: OperatingMode) -> Effect {
    match RemoteCommand::parse(token) {
        RemoteCommand::Speak => Effect::Greet {
            greeting: GREETING.to_string(),
        },
        RemoteCommand::Status => Effect::AnnounceMode {
            announcement: format!("Current mode is {}.", current_mode),
        },
        RemoteCommand::SetMode(mode) => Effect::SwitchMode {
            mode,
            confirmation: format!("Switched to {} mode.", mode),
        },
        RemoteCommand::Unrecognized(token) => Effect::Echo {
            echo: format!("Received command: {}", token),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_case_insensitive() {
        let mode = OperatingMode::Read;
        let lower = interpret("status", mode);
        assert_eq!(interpret("STATUS", mode), lower);
        assert_eq!(interpret("Status", mode), lower);
        assert_eq!(lower.utterance(), "Current mode is read.");
    }

    #[test]
    fn test_mode_commands_switch_mode() {
        for mode in OperatingMode::ALL {
            let effect = interpret(&mode.as_str().to_uppercase(), OperatingMode::Passive);
            assert_eq!(effect.mode_change(), Some(mode));
            assert!(effect.utterance().contains(mode.as_str()));
        }
    }

    #[test]
    fn test_navigate_then_status_reports_navigate() {
        let mut mode = OperatingMode::Passive;

        let effect = interpret("navigate", mode);
        if let Some(next) = effect.mode_change() {
            mode = next;
        }

        let status = interpret("status", mode);
        assert_eq!(
            status,
            Effect::AnnounceMode {
                announcement: "Current mode is navigate.".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_token_is_echoed() {
        let effect = interpret("banana", OperatingMode::Read);
        assert_eq!(
            effect,
            Effect::Echo {
                echo: "Received command: banana".to_string()
            }
        );
        assert_eq!(effect.mode_change(), None);
    }

    #[test]
    fn test_speak_greets() {
        let effect = interpret("  Speak\n", OperatingMode::Navigate);
        assert_eq!(effect.utterance(), GREETING);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(RemoteCommand::parse(" read\r"), RemoteCommand::SetMode(OperatingMode::Read));
        assert_eq!(
            RemoteCommand::parse(" Banana "),
            RemoteCommand::Unrecognized("Banana".to_string())
        );
    }
}
