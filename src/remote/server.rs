//! TCP listener for remote commands
//!
//! Each connection forwards its tokens to the session command loop, which
//! interprets them one at a time in arrival order. The listener lives in a
//! [`RemoteHandle`]; stopping consumes the handle.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::protocol::{ListeningAddress, RemoteReply, MAX_LINE_LEN};
use crate::session::SessionCommand;

/// Running remote listener
pub struct RemoteHandle {
    address: ListeningAddress,
    shutdown_tx: broadcast::Sender<()>,
    accept_task: JoinHandle<()>,
}

impl RemoteHandle {
    pub fn address(&self) -> ListeningAddress {
        self.address
    }

    /// Stop accepting and close every client connection
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.accept_task.await {
            warn!(?e, "remote accept task ended abnormally");
        }
        info!(address = %self.address.bound, "remote listener stopped");
    }
}

/// Bind the listener and start accepting clients
pub async fn start(bind: SocketAddr, commands: mpsc::Sender<SessionCommand>) -> Result<RemoteHandle> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind remote listener on {bind}"))?;
    let bound = listener
        .local_addr()
        .context("failed to read remote listener address")?;

    let address = ListeningAddress {
        bound,
        advertised: advertised_address(bound).await,
    };
    info!(bound = %address.bound, advertised = %address.advertised, "remote listener started");

    let (shutdown_tx, _) = broadcast::channel(1);
    let accept_task = tokio::spawn(accept_loop(listener, commands, shutdown_tx.clone()));

    Ok(RemoteHandle {
        address,
        shutdown_tx,
        accept_task,
    })
}

async fn accept_loop(
    listener: TcpListener,
    commands: mpsc::Sender<SessionCommand>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut shutdown_rx = shutdown_tx.subscribe();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "remote client connected");
                    let commands = commands.clone();
                    let mut client_shutdown = shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, commands) => {
                                if let Err(e) = result {
                                    warn!(%peer, ?e, "remote client error");
                                }
                            }
                            _ = client_shutdown.recv() => {
                                debug!(%peer, "closing remote client");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "remote accept error");
                }
            },
            _ = shutdown_rx.recv() => break,
        }
    }
}

async fn handle_client(stream: TcpStream, commands: mpsc::Sender<SessionCommand>) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = (&mut reader)
            .take(MAX_LINE_LEN as u64)
            .read_until(b'\n', &mut line)
            .await?;

        if n == 0 {
            debug!("remote client disconnected");
            return Ok(());
        }

        if n == MAX_LINE_LEN && !line.ends_with(b"\n") {
            let reply = RemoteReply::error(
                "line_too_long",
                format!("commands are limited to {} bytes", MAX_LINE_LEN),
            );
            write_half.write_all(&reply.to_line()?).await?;
            return Ok(());
        }

        // Invalid UTF-8 still gets an answer, as an unknown token
        let text = String::from_utf8_lossy(&line);
        let token = text.trim();
        if token.is_empty() {
            continue;
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let command = SessionCommand::Remote {
            token: token.to_string(),
            reply: reply_tx,
        };
        if commands.send(command).await.is_err() {
            debug!("session closed, dropping remote client");
            return Ok(());
        }

        let reply = reply_rx
            .await
            .unwrap_or_else(|_| RemoteReply::error("unavailable", "session is shutting down"));
        write_half.write_all(&reply.to_line()?).await?;
    }
}

/// Replace an unspecified bind IP with the host's outbound interface address
async fn advertised_address(bound: SocketAddr) -> SocketAddr {
    if !bound.ip().is_unspecified() {
        return bound;
    }

    let ip = discover_local_ip()
        .await
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    SocketAddr::new(ip, bound.port())
}

/// Outbound interface address, found by routing a UDP socket (no packets sent)
async fn discover_local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).await.ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::interpret;
    use crate::state::OperatingMode;

    /// Minimal command loop that interprets tokens against its own mode
    fn spawn_interpreter() -> mpsc::Sender<SessionCommand> {
        let (tx, mut rx) = mpsc::channel::<SessionCommand>(8);
        tokio::spawn(async move {
            let mut mode = OperatingMode::Passive;
            while let Some(command) = rx.recv().await {
                if let SessionCommand::Remote { token, reply } = command {
                    let effect = interpret(&token, mode);
                    if let Some(next) = effect.mode_change() {
                        mode = next;
                    }
                    let _ = reply.send(RemoteReply::Spoken {
                        text: effect.utterance().to_string(),
                        mode,
                    });
                }
            }
        });
        tx
    }

    async fn read_reply(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> RemoteReply {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn test_commands_are_answered_in_order() {
        let handle = start("127.0.0.1:0".parse().unwrap(), spawn_interpreter())
            .await
            .unwrap();
        let stream = TcpStream::connect(handle.address().bound).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_half.write_all(b"NAVIGATE\n\nstatus\n").await.unwrap();

        assert_eq!(
            read_reply(&mut reader).await,
            RemoteReply::Spoken {
                text: "Switched to navigate mode.".to_string(),
                mode: OperatingMode::Navigate,
            }
        );
        assert_eq!(
            read_reply(&mut reader).await,
            RemoteReply::Spoken {
                text: "Current mode is navigate.".to_string(),
                mode: OperatingMode::Navigate,
            }
        );

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_overlong_line_is_rejected() {
        let handle = start("127.0.0.1:0".parse().unwrap(), spawn_interpreter())
            .await
            .unwrap();
        let stream = TcpStream::connect(handle.address().bound).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        // Exactly the limit with no newline, so nothing is left unread
        let long = "x".repeat(MAX_LINE_LEN);
        write_half.write_all(long.as_bytes()).await.unwrap();

        let reply = read_reply(&mut reader).await;
        assert!(matches!(reply, RemoteReply::Error { ref code, .. } if code == "line_too_long"));

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_still_answered() {
        let handle = start("127.0.0.1:0".parse().unwrap(), spawn_interpreter())
            .await
            .unwrap();
        let stream = TcpStream::connect(handle.address().bound).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_half.write_all(b"re\xffad\nstatus\n").await.unwrap();

        match read_reply(&mut reader).await {
            RemoteReply::Spoken { text, mode } => {
                assert!(text.starts_with("Received command: re"));
                assert_eq!(mode, OperatingMode::Passive);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        // The connection stays usable
        assert_eq!(
            read_reply(&mut reader).await,
            RemoteReply::Spoken {
                text: "Current mode is passive.".to_string(),
                mode: OperatingMode::Passive,
            }
        );

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_releases_port() {
        let handle = start("127.0.0.1:0".parse().unwrap(), spawn_interpreter())
            .await
            .unwrap();
        let bound = handle.address().bound;

        handle.stop().await;

        assert!(TcpStream::connect(bound).await.is_err());
    }

    #[tokio::test]
    async fn test_specific_bind_is_advertised_as_is() {
        let bound: SocketAddr = "127.0.0.1:8765".parse().unwrap();
        assert_eq!(advertised_address(bound).await, bound);
    }

    #[tokio::test]
    async fn test_unspecified_bind_gets_concrete_ip() {
        let bound: SocketAddr = "0.0.0.0:8765".parse().unwrap();
        let advertised = advertised_address(bound).await;
        assert!(!advertised.ip().is_unspecified());
        assert_eq!(advertised.port(), 8765);
    }
}
