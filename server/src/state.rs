//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the relay configuration and one `RoomRelay`, the membership table
//! for every live room. Rooms are created on first join and dropped when the
//! last member leaves; nothing about a room outlives its members.
//!
//! `RoomRelay` itself is synchronous. Callers lock it, mutate, and deliver
//! through each member's bounded `mpsc` channel with `try_send`, so no await
//! point ever happens while the lock is held.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use frames::Frame;
use tokio::sync::{RwLock, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::config::RelayConfig;

// =============================================================================
// ROOM STATE
// =============================================================================

/// One connection's membership in a room.
#[derive(Debug, Clone)]
pub struct Member {
    pub username: String,
    pub tx: mpsc::Sender<Frame>,
}

/// Per-room live state.
#[derive(Debug, Default)]
pub struct RoomState {
    /// Connected members: `client_id` -> member.
    pub members: HashMap<Uuid, Member>,
    /// Joiners that have not yet received a scene handoff.
    pub awaiting_state: HashSet<Uuid>,
}

/// A member that left a room, by disconnect or by joining another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room: String,
    pub username: String,
    /// Members still in the room. Zero means the room was dropped.
    pub remaining: usize,
}

/// Result of [`RoomRelay::join`].
#[derive(Debug)]
pub struct Joined {
    /// The room left to make this join, if any.
    pub previous: Option<Departure>,
    /// Members already present, excluding the joiner.
    pub peers: usize,
}

/// Why a single delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The member's outbound buffer is full.
    Full,
    /// The member's connection task is gone.
    Closed,
}

/// Result of a targeted state handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    Delivered,
    /// The target already received a scene. First responder wins.
    AlreadySatisfied,
}

/// Error returned by [`RoomRelay::send_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffError {
    /// The target is not a member of the sender's room.
    UnknownTarget,
    Delivery(DeliveryFailure),
}

// =============================================================================
// ROOM RELAY
// =============================================================================

/// Room membership table with forwarding.
#[derive(Debug, Default)]
pub struct RoomRelay {
    rooms: HashMap<String, RoomState>,
    /// `client_id` -> room it is in.
    memberships: HashMap<Uuid, String>,
}

impl RoomRelay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `client_id` to `room`, leaving its previous room first. A joiner
    /// that finds existing members is marked as awaiting a scene handoff.
    pub fn join(&mut self, client_id: Uuid, room: &str, username: &str, tx: mpsc::Sender<Frame>) -> Joined {
        let previous = self.leave(client_id);

        let state = self.rooms.entry(room.to_owned()).or_default();
        let peers = state.members.len();
        state.members.insert(client_id, Member { username: username.to_owned(), tx });
        if peers > 0 {
            state.awaiting_state.insert(client_id);
        }
        self.memberships.insert(client_id, room.to_owned());

        Joined { previous, peers }
    }

    /// Remove `client_id` from its room. Drops the room when it empties.
    pub fn leave(&mut self, client_id: Uuid) -> Option<Departure> {
        let room = self.memberships.remove(&client_id)?;
        let state = self.rooms.get_mut(&room)?;
        let member = state.members.remove(&client_id)?;
        state.awaiting_state.remove(&client_id);
        let remaining = state.members.len();
        if remaining == 0 {
            self.rooms.remove(&room);
        }
        Some(Departure { room, username: member.username, remaining })
    }

    #[must_use]
    pub fn room_of(&self, client_id: Uuid) -> Option<&str> {
        self.memberships.get(&client_id).map(String::as_str)
    }

    #[must_use]
    pub fn room(&self, room: &str) -> Option<&RoomState> {
        self.rooms.get(room)
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, |s| s.members.len())
    }

    /// Deliver `frame` to every member of `room` except `exclude`. Returns the
    /// members whose delivery failed; other members are unaffected.
    pub fn broadcast(&self, room: &str, frame: &Frame, exclude: Option<Uuid>) -> Vec<(Uuid, DeliveryFailure)> {
        let Some(state) = self.rooms.get(room) else {
            return Vec::new();
        };
        state
            .members
            .iter()
            .filter(|(id, _)| exclude != Some(**id))
            .filter_map(|(id, member)| deliver(&member.tx, frame.clone()).err().map(|f| (*id, f)))
            .collect()
    }

    /// Forward `frame` from `client_id` to the rest of its room.
    /// Returns `None` if `client_id` is not in a room.
    pub fn forward(&self, client_id: Uuid, frame: &Frame) -> Option<Vec<(Uuid, DeliveryFailure)>> {
        let room = self.room_of(client_id)?;
        Some(self.broadcast(room, frame, Some(client_id)))
    }

    /// Deliver a scene handoff from `client_id` to `target` in the same room.
    /// Only the first handoff for a waiting joiner is delivered.
    ///
    /// # Errors
    ///
    /// Returns [`HandoffError::UnknownTarget`] if `target` is not in the
    /// sender's room, and [`HandoffError::Delivery`] if its channel rejects the frame.
    pub fn send_to(&mut self, client_id: Uuid, target: Uuid, frame: Frame) -> Result<Handoff, HandoffError> {
        let room = self.memberships.get(&client_id).ok_or(HandoffError::UnknownTarget)?;
        let state = self.rooms.get_mut(room).ok_or(HandoffError::UnknownTarget)?;
        let member = state.members.get(&target).ok_or(HandoffError::UnknownTarget)?;
        if !state.awaiting_state.contains(&target) {
            return Ok(Handoff::AlreadySatisfied);
        }
        deliver(&member.tx, frame).map_err(HandoffError::Delivery)?;
        state.awaiting_state.remove(&target);
        Ok(Handoff::Delivered)
    }
}

fn deliver(tx: &mpsc::Sender<Frame>, frame: Frame) -> Result<(), DeliveryFailure> {
    tx.try_send(frame).map_err(|e| match e {
        TrySendError::Full(_) => DeliveryFailure::Full,
        TrySendError::Closed(_) => DeliveryFailure::Closed,
    })
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RwLock<RoomRelay>>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self { relay: Arc::new(RwLock::new(RoomRelay::new())), config: Arc::new(config) }
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
