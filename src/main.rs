//! vision-assist-daemon: describes what the camera sees, out loud
//!
//! This daemon provides:
//! - Capture-and-describe runs against a remote vision model
//! - Read, Navigate and Passive modes, each with its own instruction
//! - Spoken feedback with last-write-wins replacement
//! - A TCP listener for single-word remote commands
//!
//! Input comes from the console (stdin) and from remote clients; both feed
//! the same session command loop.

mod capture;
mod config;
mod console;
mod events;
mod inference;
mod lifecycle;
mod permission;
mod pipeline;
mod prompt;
mod remote;
mod session;
mod speech;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::console::Console;
use crate::events::SessionEvent;
use crate::inference::GeminiBackend;
use crate::lifecycle::ShutdownSignal;
use crate::permission::DevicePermission;
use crate::pipeline::Pipeline;
use crate::session::{Session, SessionCommand};
use crate::speech::Speaker;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "vision-assist-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    info!(?config, "configuration loaded");

    let mut shutdown = ShutdownSignal::new()?;

    // Session -> event logger
    let (event_tx, mut event_rx) = broadcast::channel::<SessionEvent>(64);
    // Console and remote clients -> session
    let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(32);

    let speaker = Speaker::new(config.speech.sink());
    let backend = GeminiBackend::new(&config.inference)
        .context("failed to create inference client")?;

    let pipeline = Arc::new(Pipeline::new(
        config.capture.surface(),
        Arc::new(backend),
        speaker.clone(),
        event_tx.clone(),
    ));

    let mut session = Session::new(
        config.initial_mode,
        config.remote.bind,
        pipeline,
        Arc::new(DevicePermission::new(config.capture.source_path())),
        speaker,
        &command_tx,
        event_tx.clone(),
    );
    session.initialize().await;

    if config.remote.enabled {
        command_tx.send(SessionCommand::EnableRemote).await?;
    }

    let console = Console::new(command_tx);

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Serve console and remote commands
        _ = session.run(command_rx) => {
            info!("session exited");
        }

        // Read console input
        result = console.run() => {
            if let Err(e) = result {
                error!(?e, "console error");
            }
        }

        // Log session events
        _ = async {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "session event");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "session event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("event logger exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    session.shutdown().await;

    info!("vision-assist-daemon stopped");

    Ok(())
}
