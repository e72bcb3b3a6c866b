//! Relay connection driving one `SyncSession`.
//!
//! The session is synchronous; this module owns the socket. Every inbound
//! frame goes to `SyncSession::handle_frame`, and whatever the session
//! queues in response (scene handoffs, local edits) is written back before
//! the next read.

use std::time::Duration;

use frames::Frame;
use futures_util::{SinkExt, StreamExt};
use scene::session::{Notice, SessionConfig, SyncSession};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::CliError;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Participant {
    stream: WsStream,
    session: SyncSession,
}

impl Participant {
    /// Connect and wait for `session:connected`.
    pub async fn connect(relay_url: &str, config: SessionConfig) -> Result<Self, CliError> {
        let url = ws_url(relay_url)?;
        let (stream, _) = connect_async(url.as_str()).await.map_err(|error| CliError::WsConnect(Box::new(error)))?;
        let mut participant = Self { stream, session: SyncSession::new(config) };

        loop {
            let frame = participant.recv_next(CONNECT_TIMEOUT).await?;
            participant.session.handle_frame(&frame);
            if participant.session.client_id().is_some() {
                break;
            }
        }
        info!(%url, client_id = participant.session.client_id().unwrap_or("-"), "connected");
        Ok(participant)
    }

    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SyncSession {
        &mut self.session
    }

    /// Join `room` and wait for the relay's acknowledgement. If peers are
    /// already present, also wait up to `bootstrap_timeout` for one of them
    /// to hand over the scene. Returns the number of peers.
    pub async fn join(&mut self, room: &str, bootstrap_timeout: Duration) -> Result<u64, CliError> {
        self.session.join(room);
        self.flush().await?;

        let peers = loop {
            let frame = self.recv_next(CONNECT_TIMEOUT).await?;
            self.session.handle_frame(&frame);
            self.flush().await?;
            let mut joined = None;
            for notice in self.session.drain_notices() {
                match notice {
                    Notice::Joined { peers, .. } => joined = Some(peers),
                    Notice::RelayError { code, message } => {
                        return Err(CliError::Relay { code: code.unwrap_or_else(|| "-".to_owned()), message });
                    }
                    other => report(&other),
                }
            }
            if let Some(peers) = joined {
                break peers;
            }
        };
        info!(room_id = %room, peers, "joined room");

        if peers > 0 && !self.wait_for_bootstrap(bootstrap_timeout).await? {
            warn!(room_id = %room, "no peer sent the scene; starting from an empty canvas");
        }
        Ok(peers)
    }

    async fn wait_for_bootstrap(&mut self, timeout: Duration) -> Result<bool, CliError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            let frame = match self.recv_next(remaining).await {
                Ok(frame) => frame,
                Err(CliError::Timeout) => return Ok(false),
                Err(e) => return Err(e),
            };
            self.session.handle_frame(&frame);
            self.flush().await?;
            let mut bootstrapped = false;
            for notice in self.session.drain_notices() {
                if notice == Notice::Bootstrapped {
                    bootstrapped = true;
                }
                report(&notice);
            }
            if bootstrapped {
                return Ok(true);
            }
        }
    }

    /// Send every frame the session has queued.
    pub async fn flush(&mut self) -> Result<(), CliError> {
        for frame in self.session.drain_outbound() {
            debug!(syscall = %frame.syscall, seq = ?frame.seq, "send frame");
            self.stream
                .send(Message::Binary(frames::encode_frame(&frame).into()))
                .await
                .map_err(|error| CliError::WsConnect(Box::new(error)))?;
        }
        Ok(())
    }

    /// Process room traffic for `duration`, or until the relay closes when
    /// `duration` is `None`.
    pub async fn pump(&mut self, duration: Option<Duration>) -> Result<(), CliError> {
        let deadline = duration.map(|d| Instant::now() + d);
        loop {
            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(());
                    }
                    remaining
                }
                None => Duration::MAX,
            };
            let frame = match self.recv_next(wait).await {
                Ok(frame) => frame,
                Err(CliError::Timeout) => return Ok(()),
                Err(CliError::WsClosed) if deadline.is_none() => return Ok(()),
                Err(e) => return Err(e),
            };
            self.session.handle_frame(&frame);
            self.flush().await?;
            for notice in self.session.drain_notices() {
                report(&notice);
            }
        }
    }

    async fn recv_next(&mut self, timeout: Duration) -> Result<Frame, CliError> {
        let stream = &mut self.stream;
        let fut = async {
            loop {
                let Some(message) = stream.next().await else {
                    return Err(CliError::WsClosed);
                };
                match message.map_err(|error| CliError::WsConnect(Box::new(error)))? {
                    Message::Binary(bytes) => return frames::decode_frame(&bytes).map_err(CliError::from),
                    Message::Text(text) => return frames::from_json(text.as_str()).map_err(CliError::from),
                    Message::Close(_) => return Err(CliError::WsClosed),
                    _ => {}
                }
            }
        };

        tokio::time::timeout(timeout, fut).await.map_err(|_| CliError::Timeout)?
    }
}

fn report(notice: &Notice) {
    match notice {
        Notice::Joined { room, peers } => info!(room_id = %room, peers, "joined"),
        Notice::PeerJoined { username, socket_id } => info!(%username, %socket_id, "peer joined"),
        Notice::PeerLeft { username, socket_id } => info!(%username, %socket_id, "peer left"),
        Notice::Bootstrapped => info!("scene loaded from peer"),
        Notice::RelayError { code, message } => warn!(code = code.as_deref().unwrap_or("-"), %message, "relay error"),
    }
}

/// Websocket endpoint for a relay base URL. `http(s)` is mapped to `ws(s)`.
pub fn ws_url(relay_url: &str) -> Result<String, CliError> {
    let base = relay_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_owned()
    } else {
        return Err(CliError::InvalidBaseUrl(relay_url.to_owned()));
    };
    if base.ends_with("/ws") {
        return Ok(base);
    }
    Ok(format!("{base}/ws"))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
