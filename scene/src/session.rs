//! Participant runtime.
//!
//! [`SyncSession`] owns everything one participant needs: its surface, shape
//! registry, echo filters, history log and remote selection overlay. It is
//! synchronous and transport-agnostic. The host feeds inbound frames to
//! [`SyncSession::handle_frame`], drives local edits through the edit
//! methods, and ships whatever [`SyncSession::drain_outbound`] returns.
//!
//! Until [`SyncSession::join`] is called no frames are produced; edits and
//! history still work locally.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::{BTreeSet, VecDeque};

use frames::{ERROR_SYSCALL, FRAME_CODE, FRAME_MESSAGE, Frame, Status, syscall};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::apply::{Applied, Applier};
use crate::codec::{self, BulkPurpose, Operation};
use crate::consts::{DEFAULT_BACKGROUND, DEFAULT_HISTORY_LIMIT, ECHO_WINDOW_MS};
use crate::doc::{Geometry, ObjectId, Props, Scene, Style};
use crate::echo::{Clock, EchoGuard, OriginFilter, OriginVerdict, SystemClock};
use crate::history::{HistoryError, HistoryLog};
use crate::registry::ShapeRegistry;
use crate::selection::RemoteSelections;
use crate::surface::{ChangeEvent, MemorySurface, Surface};
use crate::transform::{self, GroupTransform};

/// Per-participant tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Name announced in `join-room`.
    pub username: String,
    /// Echo guard window. Zero disables the timestamp filter.
    pub echo_window_ms: i64,
    pub history_limit: usize,
    /// Background of a fresh or cleared scene.
    pub background: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            username: "anonymous".to_owned(),
            echo_window_ms: ECHO_WINDOW_MS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            background: DEFAULT_BACKGROUND.to_owned(),
        }
    }
}

/// Gate for destructive actions.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Confirms everything. For non-interactive hosts that were told to proceed.
#[derive(Debug, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Something the host may want to surface to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The relay acknowledged the join. `peers` is how many were already present.
    Joined { room: String, peers: u64 },
    PeerJoined { username: String, socket_id: String },
    PeerLeft { username: String, socket_id: String },
    /// A full scene was loaded from a peer after joining.
    Bootstrapped,
    /// A scoped error event from the relay.
    RelayError { code: Option<String>, message: String },
}

pub struct SyncSession<S: Surface = MemorySurface, C: Clock = SystemClock> {
    config: SessionConfig,
    surface: S,
    clock: C,
    registry: ShapeRegistry,
    echo: EchoGuard,
    origin: OriginFilter,
    history: HistoryLog,
    selections: RemoteSelections,
    local_selection: BTreeSet<ObjectId>,
    client_id: Option<String>,
    room: Option<String>,
    seq: u64,
    outbox: VecDeque<Frame>,
    notices: Vec<Notice>,
}

impl SyncSession {
    /// A session over an in-memory surface and the system clock.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_parts(config, MemorySurface::new(), SystemClock)
    }
}

impl<S: Surface, C: Clock> SyncSession<S, C> {
    pub fn with_parts(config: SessionConfig, mut surface: S, clock: C) -> Self {
        let mut registry = ShapeRegistry::new();
        {
            let mut muted = surface.suppress_change_events();
            if muted.scene().is_empty() {
                muted.replace_scene(blank_scene(&config));
            }
            let mut index = 0;
            while let Some(obj) = muted.object_at_mut(index) {
                registry.ensure_id(obj);
                index += 1;
            }
        }
        let mut history = HistoryLog::new(config.history_limit);
        history.clear(surface.to_snapshot());

        Self {
            echo: EchoGuard::new(config.echo_window_ms),
            config,
            surface,
            clock,
            registry,
            origin: OriginFilter::new(),
            history,
            selections: RemoteSelections::new(),
            local_selection: BTreeSet::new(),
            client_id: None,
            room: None,
            seq: 0,
            outbox: VecDeque::new(),
            notices: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Direct surface access for host-driven edits. Call
    /// [`SyncSession::flush_changes`] afterwards to broadcast them.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    #[must_use]
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    #[must_use]
    pub fn registry(&self) -> &ShapeRegistry {
        &self.registry
    }

    #[must_use]
    pub fn remote_selections(&self) -> &RemoteSelections {
        &self.selections
    }

    #[must_use]
    pub fn local_selection(&self) -> &BTreeSet<ObjectId> {
        &self.local_selection
    }

    /// Connection id assigned by the relay, once `session:connected` arrived.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    #[must_use]
    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    /// Frames ready to send, in order.
    pub fn drain_outbound(&mut self) -> Vec<Frame> {
        self.outbox.drain(..).collect()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // =========================================================================
    // ROOM
    // =========================================================================

    /// Join `room`. Replaces any previous room; the relay leaves the old one.
    pub fn join(&mut self, room: impl Into<String>) {
        let room = room.into();
        info!(room_id = %room, username = %self.config.username, "joining room");
        let frame = Frame::event(syscall::JOIN_ROOM, json!({ "roomId": room, "username": self.config.username }))
            .with_room(room.clone());
        self.room = Some(room);
        self.selections.clear();
        self.push(frame);
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Handle one frame from the relay. Never fails; anything unusable is
    /// logged and dropped.
    pub fn handle_frame(&mut self, frame: &Frame) {
        if let (Some(theirs), Some(ours)) = (frame.room_id.as_deref(), self.room.as_deref()) {
            if theirs != ours {
                debug!(syscall = %frame.syscall, room_id = %theirs, "frame for another room; ignoring");
                return;
            }
        }

        if frame.status == Status::Error || frame.syscall == ERROR_SYSCALL {
            let message = frame.data_str(FRAME_MESSAGE).unwrap_or("relay error").to_owned();
            let code = frame.data_str(FRAME_CODE).map(str::to_owned);
            warn!(code = ?code, %message, "relay reported an error");
            self.notices.push(Notice::RelayError { code, message });
            return;
        }

        match frame.syscall.as_str() {
            syscall::SESSION_CONNECTED => {
                if let Some(id) = frame.data_str("client_id") {
                    debug!(client_id = %id, "connected");
                    self.client_id = Some(id.to_owned());
                    self.origin.set_own(id);
                }
            }
            syscall::ROOM_JOINED => {
                let room = frame.data_str("roomId").or(frame.room_id.as_deref()).unwrap_or_default().to_owned();
                let peers = frame.data.get("peers").and_then(Value::as_f64).map_or(0, f64_to_count);
                self.notices.push(Notice::Joined { room, peers });
            }
            syscall::USER_JOINED => self.on_user_joined(frame),
            syscall::USER_LEFT => {
                let (username, socket_id) = peer_fields(frame);
                self.origin.forget(&socket_id);
                if self.selections.remove_peer(&socket_id) {
                    self.surface.highlight(&self.selections.union());
                }
                self.notices.push(Notice::PeerLeft { username, socket_id });
            }
            _ => self.apply_remote(frame),
        }
    }

    fn on_user_joined(&mut self, frame: &Frame) {
        let (username, socket_id) = peer_fields(frame);
        info!(%username, %socket_id, "peer joined; sending scene");
        if self.room.is_some() && !socket_id.is_empty() {
            let op = Operation::BulkState {
                purpose: BulkPurpose::Handoff { to: socket_id.clone() },
                snapshot: self.surface.to_snapshot(),
            };
            self.send(&op);
        }
        self.notices.push(Notice::PeerJoined { username, socket_id });
    }

    fn apply_remote(&mut self, frame: &Frame) {
        let op = match codec::decode(frame) {
            Ok(op) => op,
            Err(e) => {
                warn!(syscall = %frame.syscall, error = %e, "dropping undecodable frame");
                return;
            }
        };

        match self.origin.check(frame.from.as_deref(), frame.seq) {
            OriginVerdict::Accept => {}
            verdict => {
                debug!(syscall = %frame.syscall, ?verdict, "dropping echoed frame");
                return;
            }
        }

        if let Operation::Modify { id, .. } = &op {
            if self.echo.should_suppress(id, self.clock.now_ms()) {
                debug!(%id, "modify inside echo window; dropping");
                return;
            }
        }

        let peer = frame.from.clone().unwrap_or_default();
        let applied = Applier {
            surface: &mut self.surface,
            registry: &mut self.registry,
            selections: &mut self.selections,
        }
        .apply(&peer, op);

        match applied {
            Applied::Loaded { purpose: BulkPurpose::Clear } => {
                self.local_selection.clear();
                self.history.clear(self.surface.to_snapshot());
            }
            Applied::Loaded { purpose: BulkPurpose::Undo { discarded } } => {
                if let Some(discarded) = discarded {
                    self.history.pop_if_top(&discarded);
                }
                self.history.record_if_changed(self.surface.to_snapshot());
                self.prune_local_selection();
            }
            Applied::Loaded { purpose: BulkPurpose::Bootstrap } => {
                self.history.record_if_changed(self.surface.to_snapshot());
                self.prune_local_selection();
                self.notices.push(Notice::Bootstrapped);
            }
            ref other if other.changed_scene() => {
                self.history.record_if_changed(self.surface.to_snapshot());
            }
            _ => {}
        }
    }

    fn prune_local_selection(&mut self) {
        let surface = &self.surface;
        self.local_selection.retain(|id| surface.find_object(id).is_some());
    }

    // =========================================================================
    // LOCAL EDITS
    // =========================================================================

    /// Create and attach a primitive. Returns its id.
    pub fn draw(&mut self, geometry: Geometry, style: Style) -> ObjectId {
        let mut obj = self.surface.create_primitive(geometry, style);
        let id = self.registry.ensure_id(&mut obj);
        self.surface.add_object(obj);
        self.flush_changes();
        id
    }

    /// Apply a sparse property update to a local object. Returns whether it exists.
    pub fn modify(&mut self, id: &str, props: &Props) -> bool {
        let found = self.surface.modify_object(id, props);
        self.flush_changes();
        found
    }

    /// Replace the local selection and announce it if it changed.
    pub fn select(&mut self, ids: BTreeSet<ObjectId>) {
        if ids == self.local_selection {
            return;
        }
        self.local_selection = ids;
        let op = Operation::SelectionUpdate { ids: self.local_selection.clone() };
        self.send(&op);
    }

    /// Move, scale or rotate the local selection as a group. Each member goes
    /// out as its own absolute Modify. Returns how many objects changed.
    pub fn transform_selection(&mut self, t: &GroupTransform) -> usize {
        let updates = transform::flatten(self.surface.scene(), &self.local_selection, t);
        let count = updates.len();
        for (id, props) in updates {
            self.surface.modify_object(&id, &props);
        }
        self.flush_changes();
        count
    }

    /// Undo the newest history entry and push the result to the room.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::CannotUndo`] when only the initial entry is left;
    /// nothing changes and nothing is sent.
    pub fn undo(&mut self) -> Result<(), HistoryError> {
        let step = self.history.undo()?;
        {
            let mut muted = self.surface.suppress_change_events();
            if let Err(e) = muted.load_snapshot(&step.new_current) {
                warn!(error = %e, "failed to restore history entry");
            }
        }
        self.prune_local_selection();
        let op = Operation::BulkState {
            purpose: BulkPurpose::Undo { discarded: Some(step.discarded) },
            snapshot: step.new_current,
        };
        self.send(&op);
        Ok(())
    }

    /// Empty the scene for everyone, if `confirm` agrees. Returns whether it ran.
    pub fn clear(&mut self, confirm: &impl Confirm) -> bool {
        if !confirm.confirm("Clear the canvas for everyone in the room?") {
            debug!("clear not confirmed");
            return false;
        }
        {
            let mut muted = self.surface.suppress_change_events();
            muted.replace_scene(blank_scene(&self.config));
        }
        self.registry.forget_all();
        self.local_selection.clear();
        let empty = self.surface.to_snapshot();
        self.history.clear(empty.clone());
        self.send(&Operation::BulkState { purpose: BulkPurpose::Clear, snapshot: empty });
        true
    }

    /// Turn queued surface change events into outbound operations. The whole
    /// batch is one history entry, so a group edit undoes in one step.
    pub fn flush_changes(&mut self) {
        let events = self.surface.drain_events();
        if events.is_empty() {
            return;
        }
        for event in events {
            match event {
                ChangeEvent::ObjectAdded { id } => {
                    let index = match id {
                        Some(id) => self.surface.all_objects().iter().position(|o| *o == id),
                        None => self.surface.scene().objects().iter().position(|o| !o.has_id()),
                    };
                    let Some(obj) = index.and_then(|i| self.surface.object_at_mut(i)) else {
                        debug!("added object is gone before flush; skipping");
                        continue;
                    };
                    self.registry.ensure_id(obj);
                    let object = obj.clone();
                    self.send(&Operation::Draw { object });
                }
                ChangeEvent::ObjectModified { id } => {
                    let Some(props) = self.surface.serialize_object(&id, &[]) else {
                        continue;
                    };
                    self.echo.record(&id, self.clock.now_ms());
                    self.send(&Operation::Modify { id, props });
                }
                // No wire operation removes a single object; the change lives
                // in local history only.
                ChangeEvent::ObjectRemoved { .. } => {}
                ChangeEvent::Cleared => {
                    self.registry.forget_all();
                    for id in self.surface.all_objects().iter().filter(|id| !id.is_empty()) {
                        self.registry.observe(id);
                    }
                }
            }
        }
        self.history.record_if_changed(self.surface.to_snapshot());
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    fn send(&mut self, op: &Operation) {
        let Some(room) = self.room.as_deref() else {
            return;
        };
        let frame = codec::encode(op, room);
        self.push(frame);
    }

    fn push(&mut self, frame: Frame) {
        self.seq += 1;
        let mut frame = frame.with_seq(self.seq);
        if let Some(id) = &self.client_id {
            frame = frame.with_from(id.clone());
        }
        self.outbox.push_back(frame);
    }
}

fn blank_scene(config: &SessionConfig) -> Scene {
    let mut scene = Scene::new();
    scene.set_background(config.background.clone());
    scene
}

fn peer_fields(frame: &Frame) -> (String, String) {
    let username = frame.data_str("username").unwrap_or_default().to_owned();
    let socket_id = frame.data_str("socketId").unwrap_or_default().to_owned();
    (username, socket_id)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn f64_to_count(v: f64) -> u64 {
    if v.is_finite() && v > 0.0 { v as u64 } else { 0 }
}
