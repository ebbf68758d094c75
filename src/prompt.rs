//! Instruction text sent to the vision model for each operating mode

use crate::state::OperatingMode;

const READ_PROMPT: &str = "Read all of the text visible in this image exactly as it is written. \
Reply with the text only, without any commentary, description or formatting. \
If there is no readable text, reply that no text was found.";

const NAVIGATE_PROMPT: &str = "You are guiding a visually impaired person who is walking. \
Identify obstacles, clear pathways, doors and stairs in this image. \
Describe where each one is using left, in front, or right, and mention hazards first. \
Keep the answer short enough to be spoken aloud.";

const PASSIVE_PROMPT: &str = "Summarize this scene in one or two short sentences for a \
visually impaired person, focusing on what matters for moving through it safely.";

/// Resolve the instruction for `mode`
pub fn resolve(mode: OperatingMode) -> &'static str {
    match mode {
        OperatingMode::Read => READ_PROMPT,
        OperatingMode::Navigate => NAVIGATE_PROMPT,
        OperatingMode::Passive => PASSIVE_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_mode_has_instruction() {
        for mode in OperatingMode::ALL {
            let first = resolve(mode);
            assert!(!first.trim().is_empty());
            assert_eq!(first, resolve(mode));
        }
    }

    #[test]
    fn test_instructions_are_distinct() {
        assert_ne!(resolve(OperatingMode::Read), resolve(OperatingMode::Navigate));
        assert_ne!(resolve(OperatingMode::Navigate), resolve(OperatingMode::Passive));
        assert_ne!(resolve(OperatingMode::Read), resolve(OperatingMode::Passive));
    }

    #[test]
    fn test_navigate_uses_directional_framing() {
        let text = resolve(OperatingMode::Navigate);
        assert!(text.contains("left"));
        assert!(text.contains("right"));
        assert!(text.contains("stairs"));
    }
}
