//! Room service — join/leave, forwarding, and state handoff.
//!
//! DESIGN
//! ======
//! Wraps `RoomRelay` behind the shared lock and turns membership changes
//! into the presence frames peers see (`user:joined`, `user:left`). The
//! relay never inspects scene payloads; it only routes them.
//!
//! ERROR HANDLING
//! ==============
//! A failed delivery to one member is logged and reported back to the
//! sender. It never affects other members or other rooms.

use frames::{ErrorCode, Frame, syscall};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::{AppState, Departure, Handoff, HandoffError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("roomId required")]
    MissingRoomId,
    #[error("to required")]
    MissingTarget,
    #[error("unknown target: {0}")]
    UnknownTarget(String),
    #[error("forward failed for {failed} of {attempted} members")]
    Forward { failed: usize, attempted: usize },
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("invalid frame: {0}")]
    Decode(String),
}

impl ErrorCode for RelayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingRoomId | Self::MissingTarget => "E_BAD_REQUEST",
            Self::UnknownTarget(_) => "E_UNKNOWN_TARGET",
            Self::Forward { .. } => "E_FORWARD",
            Self::UnknownEvent(_) => "E_UNKNOWN_EVENT",
            Self::Decode(_) => "E_DECODE",
        }
    }
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

/// Add a connection to `room`.
///
/// Leaves the previous room first, announcing `user:left` there. Existing
/// members receive `user:joined`. Returns how many peers were already present.
pub async fn join_room(
    state: &AppState,
    client_id: Uuid,
    room: &str,
    username: &str,
    client_tx: mpsc::Sender<Frame>,
) -> usize {
    let mut relay = state.relay.write().await;
    let joined = relay.join(client_id, room, username, client_tx);

    if let Some(previous) = &joined.previous {
        relay.broadcast(&previous.room, &left_frame(client_id, previous), None);
    }

    let announce = Frame::event(syscall::USER_JOINED, json!({ "username": username, "socketId": client_id }))
        .with_room(room)
        .with_from(client_id.to_string());
    for (member, failure) in relay.broadcast(room, &announce, Some(client_id)) {
        warn!(%client_id, %member, ?failure, room_id = %room, "room: user:joined delivery failed");
    }

    info!(%client_id, room_id = %room, peers = joined.peers, "room: joined");
    joined.peers
}

/// Remove a connection from its room and announce `user:left` to the rest.
pub async fn leave_room(state: &AppState, client_id: Uuid) -> Option<Departure> {
    let mut relay = state.relay.write().await;
    let departure = relay.leave(client_id)?;
    if departure.remaining > 0 {
        relay.broadcast(&departure.room, &left_frame(client_id, &departure), None);
    }
    info!(%client_id, room_id = %departure.room, remaining = departure.remaining, "room: left");
    Some(departure)
}

fn left_frame(client_id: Uuid, departure: &Departure) -> Frame {
    Frame::event(syscall::USER_LEFT, json!({ "username": departure.username, "socketId": client_id }))
        .with_room(departure.room.clone())
        .with_from(client_id.to_string())
}

// =============================================================================
// ROUTING
// =============================================================================

/// Forward `frame` to every other member of the sender's room.
///
/// Returns the number of members that received it, or `None` if the sender
/// is not in a room.
///
/// # Errors
///
/// Returns [`RelayError::Forward`] if any member's delivery failed. Members
/// whose delivery succeeded still received the frame.
pub async fn forward(state: &AppState, client_id: Uuid, frame: &Frame) -> Result<Option<usize>, RelayError> {
    let relay = state.relay.read().await;
    let Some(room) = relay.room_of(client_id) else {
        return Ok(None);
    };
    let attempted = relay.member_count(room).saturating_sub(1);
    let Some(failures) = relay.forward(client_id, frame) else {
        return Ok(None);
    };
    if failures.is_empty() {
        return Ok(Some(attempted));
    }
    for (member, failure) in &failures {
        warn!(%client_id, %member, ?failure, room_id = %room, syscall = %frame.syscall, "room: forward failed");
    }
    Err(RelayError::Forward { failed: failures.len(), attempted })
}

/// Deliver a scene handoff from `client_id` to the connection named `to`.
///
/// # Errors
///
/// Returns [`RelayError::UnknownTarget`] if `to` is not a connection in the
/// sender's room, and [`RelayError::Forward`] if the target's channel rejects it.
pub async fn hand_off(state: &AppState, client_id: Uuid, to: &str, frame: Frame) -> Result<Handoff, RelayError> {
    let Ok(target) = to.parse::<Uuid>() else {
        return Err(RelayError::UnknownTarget(to.to_owned()));
    };
    let mut relay = state.relay.write().await;
    match relay.send_to(client_id, target, frame) {
        Ok(Handoff::Delivered) => {
            info!(%client_id, %target, "room: state handed off");
            Ok(Handoff::Delivered)
        }
        Ok(Handoff::AlreadySatisfied) => {
            debug!(%client_id, %target, "room: duplicate state handoff dropped");
            Ok(Handoff::AlreadySatisfied)
        }
        Err(HandoffError::UnknownTarget) => Err(RelayError::UnknownTarget(to.to_owned())),
        Err(HandoffError::Delivery(failure)) => {
            warn!(%client_id, %target, ?failure, "room: state handoff failed");
            Err(RelayError::Forward { failed: 1, attempted: 1 })
        }
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
