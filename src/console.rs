//! Console input surface
//!
//! Reads one action per line from stdin and forwards it to the session,
//! standing in for the on-screen buttons. An empty line triggers a capture.

use std::str::FromStr;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::session::SessionCommand;
use crate::state::OperatingMode;

const HELP: &str = "\
commands:
  capture | c | <enter>   describe what the camera sees
  stop | s                stop speaking and abandon the current capture
  read | navigate | passive
  remote on | remote off
  status
  quit
";

/// One parsed console line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleAction {
    Capture,
    Stop,
    SetMode(OperatingMode),
    RemoteOn,
    RemoteOff,
    Status,
    Help,
    Quit,
}

/// Error returned for lines that name no action
#[derive(Debug, thiserror::Error)]
#[error("unknown console command: {0}")]
pub struct UnknownAction(String);

impl FromStr for ConsoleAction {
    type Err = UnknownAction;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<String> = line
            .split_whitespace()
            .map(|w| w.to_ascii_lowercase())
            .collect();
        let words: Vec<&str> = words.iter().map(String::as_str).collect();

        match words.as_slice() {
            [] | ["c"] | ["capture"] => Ok(ConsoleAction::Capture),
            ["s"] | ["stop"] => Ok(ConsoleAction::Stop),
            ["remote", "on"] => Ok(ConsoleAction::RemoteOn),
            ["remote", "off"] => Ok(ConsoleAction::RemoteOff),
            ["status"] => Ok(ConsoleAction::Status),
            ["help"] | ["?"] => Ok(ConsoleAction::Help),
            ["quit"] | ["exit"] | ["q"] => Ok(ConsoleAction::Quit),
            [word] => word
                .parse::<OperatingMode>()
                .map(ConsoleAction::SetMode)
                .map_err(|_| UnknownAction(line.trim().to_string())),
            _ => Err(UnknownAction(line.trim().to_string())),
        }
    }
}

/// Line-oriented front end for the session
pub struct Console {
    commands: mpsc::Sender<SessionCommand>,
}

impl Console {
    pub fn new(commands: mpsc::Sender<SessionCommand>) -> Self {
        Self { commands }
    }

    /// Read stdin until `quit` or end of input
    pub async fn run(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        self.run_with(stdin, tokio::io::stdout()).await
    }

    async fn run_with<R, W>(&self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        output.write_all(HELP.as_bytes()).await?;

        while let Some(line) = lines.next_line().await.context("failed to read console input")? {
            let action = match line.parse::<ConsoleAction>() {
                Ok(action) => action,
                Err(e) => {
                    warn!(%e, "ignoring console input");
                    output.write_all(HELP.as_bytes()).await?;
                    continue;
                }
            };
            debug!(?action, "console action");

            let command = match action {
                ConsoleAction::Capture => SessionCommand::Capture,
                ConsoleAction::Stop => SessionCommand::Stop,
                ConsoleAction::SetMode(mode) => SessionCommand::SetMode(mode),
                ConsoleAction::RemoteOn => SessionCommand::EnableRemote,
                ConsoleAction::RemoteOff => SessionCommand::DisableRemote,
                ConsoleAction::Help => {
                    output.write_all(HELP.as_bytes()).await?;
                    continue;
                }
                ConsoleAction::Quit => break,
                ConsoleAction::Status => {
                    let (reply, rx) = oneshot::channel();
                    self.commands
                        .send(SessionCommand::Status { reply })
                        .await
                        .context("session closed")?;
                    let snapshot = rx.await.context("session closed")?;
                    let mut json = serde_json::to_vec_pretty(&snapshot)?;
                    json.push(b'\n');
                    output.write_all(&json).await?;
                    continue;
                }
            };

            self.commands.send(command).await.context("session closed")?;
        }

        info!("console input closed");
        Ok(())
    }
}
