//! Remote control wire protocol
//!
//! Clients send one command token per line (UTF-8, newline terminated).
//! Every non-blank line is answered with exactly one JSON-encoded
//! [`RemoteReply`] followed by a newline.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::state::OperatingMode;

/// Longest accepted command line, newline included
pub const MAX_LINE_LEN: usize = 256;

/// Where the remote listener can be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningAddress {
    /// Socket address actually bound
    pub bound: SocketAddr,
    /// Address to hand to clients on the local network
    pub advertised: SocketAddr,
}

/// Replies from daemon to remote client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteReply {
    /// The command was applied and `text` was spoken
    Spoken { text: String, mode: OperatingMode },

    /// The command could not be handled
    Error { code: String, message: String },
}

impl RemoteReply {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        RemoteReply::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Encode as a single JSON line
    pub fn to_line(&self) -> serde_json::Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spoken_reply_line() {
        let reply = RemoteReply::Spoken {
            text: "Switched to read mode.".to_string(),
            mode: OperatingMode::Read,
        };
        let line = reply.to_line().unwrap();
        assert_eq!(line.last(), Some(&b'\n'));

        let json = String::from_utf8(line).unwrap();
        assert!(json.contains("\"type\":\"spoken\""));
        assert!(json.contains("\"mode\":\"read\""));
    }

    #[test]
    fn test_error_reply_deserialization() {
        let json = r#"{"type":"error","code":"line_too_long","message":"too long"}"#;
        let reply: RemoteReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply, RemoteReply::error("line_too_long", "too long"));
    }
}
