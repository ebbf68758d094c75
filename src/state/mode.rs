//! Operating mode selection
//!
//! Exactly one mode is active at a time. Any mode can be reached from any
//! other; the mode changes only on an explicit console or remote selection.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three operating modes of the assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Extract visible text verbatim
    Read,
    /// Call out obstacles and pathways
    Navigate,
    /// Short scene summaries
    Passive,
}

impl OperatingMode {
    pub const ALL: [OperatingMode; 3] = [
        OperatingMode::Read,
        OperatingMode::Navigate,
        OperatingMode::Passive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Read => "read",
            OperatingMode::Navigate => "navigate",
            OperatingMode::Passive => "passive",
        }
    }
}

impl Default for OperatingMode {
    fn default() -> Self {
        Self::Passive
    }
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known mode
#[derive(Debug, thiserror::Error)]
#[error("unknown operating mode: {0}")]
pub struct UnknownMode(pub String);

impl FromStr for OperatingMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        OperatingMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_passive() {
        assert_eq!(OperatingMode::default(), OperatingMode::Passive);
    }

    #[test]
    fn test_parse_ignores_case() {
        assert_eq!("NAVIGATE".parse::<OperatingMode>().unwrap(), OperatingMode::Navigate);
        assert_eq!(" Read ".parse::<OperatingMode>().unwrap(), OperatingMode::Read);
        assert!("walk".parse::<OperatingMode>().is_err());
    }

    #[test]
    fn test_mode_serialization() {
        let json = serde_json::to_string(&OperatingMode::Navigate).unwrap();
        assert_eq!(json, "\"navigate\"");
    }
}
