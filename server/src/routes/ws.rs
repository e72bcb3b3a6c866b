//! WebSocket handler — room relay over frames.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → decode + dispatch by syscall
//! - Frames forwarded by room peers → encode + send to client
//!
//! Handler functions validate and return an `Outcome`. The dispatch layer
//! owns all outbound concerns: reply to sender, forward to the room, or hand
//! a scene to one joiner. Scene payloads pass through untouched.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. `join-room` → `room:joined` to sender, `user:joined` to peers
//! 3. Scene events → forwarded to every other room member
//! 4. Close → `user:left` to the room → cleanup
//!
//! Frames other than `join-room` are ignored until the connection is in a room.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use frames::{ERROR_SYSCALL, FRAME_CODE, FRAME_MESSAGE, Frame, Status, syscall};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::room::{self, RelayError};
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what; handlers never send frames directly.
#[derive(Debug)]
enum Outcome {
    /// Send a frame to the sender only.
    Reply(Frame),
    /// Forward to every other member of the sender's room.
    Forward(Frame),
    /// Deliver a scene to one joiner.
    HandOff { to: String, frame: Frame },
    /// Drop without reply.
    Ignore,
}

/// Encoding used toward one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Protobuf binary messages.
    Binary,
    /// JSON text messages.
    Json,
}

/// Per-connection context passed to dispatch.
pub struct Connection {
    pub client_id: Uuid,
    /// Channel peers use to reach this connection.
    pub tx: mpsc::Sender<Frame>,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let format = match params.get("format").map(String::as_str) {
        Some("json") => WireFormat::Json,
        _ => WireFormat::Binary,
    };
    ws.on_upgrade(move |socket| run_ws(socket, state, format))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, mut format: WireFormat) {
    let client_id = Uuid::new_v4();

    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.client_channel_capacity);
    let conn = Connection { client_id, tx: client_tx };

    let welcome = Frame::event(syscall::SESSION_CONNECTED, json!({ "client_id": client_id }));
    if send_frame(&mut socket, format, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, ?format, "ws: client connected");

    'conn: loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let inbound = match msg {
                    Message::Binary(bytes) => frames::decode_frame(&bytes).map_err(|e| e.to_string()),
                    Message::Text(text) => {
                        format = WireFormat::Json;
                        frames::from_json(text.as_str()).map_err(|e| e.to_string())
                    }
                    Message::Close(_) => break,
                    _ => continue,
                };
                let replies = match inbound {
                    Ok(frame) => process_inbound(&state, &conn, frame).await,
                    Err(e) => {
                        warn!(%client_id, error = %e, "ws: undecodable inbound frame");
                        vec![Frame::error_from(&RelayError::Decode(e))]
                    }
                };
                for frame in replies {
                    if send_frame(&mut socket, format, &frame).await.is_err() {
                        break 'conn;
                    }
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, format, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    room::leave_room(&state, client_id).await;
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Process one decoded inbound frame and return frames for the sender.
///
/// Kept apart from the socket so tests can drive dispatch with channels.
pub(crate) async fn process_inbound(state: &AppState, conn: &Connection, mut req: Frame) -> Vec<Frame> {
    let client_id = conn.client_id;
    req.from = Some(client_id.to_string());

    debug!(%client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");
    let name = req.syscall.clone();

    let result = match name.as_str() {
        syscall::JOIN_ROOM => handle_join(state, conn, &req).await,
        syscall::SEND_STATE => handle_send_state(state, client_id, req).await,
        event if syscall::ROOM_BROADCAST.contains(&event) => handle_room_event(state, client_id, req).await,
        other => handle_unknown(state, client_id, &req, other).await,
    };

    let room_id = state.relay.read().await.room_of(client_id).map(str::to_owned);
    let scoped = |frame: Frame| match &room_id {
        Some(room) => frame.with_room(room.clone()),
        None => frame,
    };

    match result {
        Ok(Outcome::Reply(frame)) => vec![frame],
        Ok(Outcome::Forward(frame)) => match room::forward(state, client_id, &frame).await {
            Ok(_) => vec![],
            Err(e) => vec![scoped(Frame::error_from(&e))],
        },
        Ok(Outcome::HandOff { to, frame }) => match room::hand_off(state, client_id, &to, frame).await {
            Ok(_) => vec![],
            Err(e) => {
                warn!(%client_id, %to, error = %e, "ws: send-state rejected");
                vec![scoped(Frame::error_from(&e))]
            }
        },
        Ok(Outcome::Ignore) => vec![],
        Err(e) => {
            warn!(%client_id, syscall = %name, error = %e, "ws: request rejected");
            vec![scoped(Frame::error_from(&e))]
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn handle_join(state: &AppState, conn: &Connection, req: &Frame) -> Result<Outcome, RelayError> {
    let Some(room_id) = req
        .data_str("roomId")
        .or(req.room_id.as_deref())
        .filter(|r| !r.trim().is_empty())
    else {
        return Err(RelayError::MissingRoomId);
    };
    let username = req.data_str("username").unwrap_or("anonymous");

    let peers = room::join_room(state, conn.client_id, room_id, username, conn.tx.clone()).await;

    let ack = Frame::event(syscall::ROOM_JOINED, json!({ "roomId": room_id, "peers": peers })).with_room(room_id);
    Ok(Outcome::Reply(ack))
}

async fn handle_send_state(state: &AppState, client_id: Uuid, req: Frame) -> Result<Outcome, RelayError> {
    let Some(room_id) = current_room(state, client_id, &req).await else {
        return Ok(Outcome::Ignore);
    };
    let Some(to) = req.data_str("to").map(str::to_owned) else {
        return Err(RelayError::MissingTarget);
    };
    let snapshot = req.data.get("state").cloned().unwrap_or(Value::String(String::new()));

    let mut frame = Frame::event(syscall::LOAD_STATE, json!({ "state": snapshot }))
        .with_room(room_id)
        .with_from(client_id.to_string());
    frame.seq = req.seq;
    Ok(Outcome::HandOff { to, frame })
}

async fn handle_room_event(state: &AppState, client_id: Uuid, mut req: Frame) -> Result<Outcome, RelayError> {
    let Some(room_id) = current_room(state, client_id, &req).await else {
        return Ok(Outcome::Ignore);
    };
    req.room_id = Some(room_id);
    Ok(Outcome::Forward(req))
}

/// Room the sender is in, if the frame is scoped to it. Logs and returns
/// `None` for frames sent outside a room or addressed to another room.
/// Unknown events are reported only to connections inside a room.
async fn handle_unknown(state: &AppState, client_id: Uuid, req: &Frame, name: &str) -> Result<Outcome, RelayError> {
    if current_room(state, client_id, req).await.is_none() {
        return Ok(Outcome::Ignore);
    }
    Err(RelayError::UnknownEvent(name.to_owned()))
}

async fn current_room(state: &AppState, client_id: Uuid, req: &Frame) -> Option<String> {
    let relay = state.relay.read().await;
    let Some(room) = relay.room_of(client_id) else {
        debug!(%client_id, syscall = %req.syscall, "ws: not in a room; ignoring");
        return None;
    };
    if let Some(claimed) = req.room_id.as_deref() {
        if claimed != room {
            debug!(%client_id, syscall = %req.syscall, room_id = %claimed, "ws: frame for another room; ignoring");
            return None;
        }
    }
    Some(room.to_owned())
}

// =============================================================================
// OUTBOUND
// =============================================================================

async fn send_frame(socket: &mut WebSocket, format: WireFormat, frame: &Frame) -> Result<(), ()> {
    let wire = match format {
        WireFormat::Binary => Message::Binary(frames::encode_frame(frame).into()),
        WireFormat::Json => match frames::to_json(frame) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => {
                warn!(error = %e, "ws: failed to serialize frame");
                return Err(());
            }
        },
    };

    if frame.status == Status::Error || frame.syscall == ERROR_SYSCALL {
        let code = frame.data_str(FRAME_CODE).unwrap_or("-");
        let message = frame.data_str(FRAME_MESSAGE).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        debug!(id = %frame.id, syscall = %frame.syscall, "ws: send frame");
    }

    socket.send(wire).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
