//! Operation codec: scene operations to and from wire frames.
//!
//! Pure and stateless. [`encode`] never fails; [`decode`] reports anything it
//! cannot turn into an [`Operation`] as a [`DecodeError`] and never panics.
//! Callers log and drop undecodable frames.

#[cfg(test)]
#[path = "codec_test.rs"]
mod codec_test;

use std::collections::BTreeSet;

use frames::{Frame, syscall};
use serde_json::{Map, Value};

use crate::doc::{ObjectId, Props, Scene, SceneObject, ShapeKind, SnapshotError};
use crate::props;

const TYPE: &str = "type";
const PROPS: &str = "props";
const ID: &str = "id";
const IDS: &str = "ids";
const STATE: &str = "state";
const TO: &str = "to";
const DISCARDED: &str = "discarded";

/// A scene mutation as exchanged between participants.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Add a new object on top of the scene.
    Draw { object: SceneObject },
    /// Sparse property update of an existing object.
    Modify { id: ObjectId, props: Props },
    /// The sender's current selection. Advisory only.
    SelectionUpdate { ids: BTreeSet<ObjectId> },
    /// Authoritative full-scene replacement.
    BulkState { purpose: BulkPurpose, snapshot: String },
}

/// Why a full scene is being sent. Selects the wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkPurpose {
    /// Existing member answering a join, addressed to connection `to`.
    Handoff { to: String },
    /// Relay delivering a handoff to the joiner.
    Bootstrap,
    /// Scene after an undo. `discarded` is the snapshot that was popped.
    Undo { discarded: Option<String> },
    /// Scene after a clear.
    Clear,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown shape kind `{0}`")]
    UnknownKind(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` has the wrong type")]
    WrongType(&'static str),
    #[error("unknown event `{0}`")]
    UnknownSyscall(String),
    #[error("malformed snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl frames::ErrorCode for DecodeError {
    fn error_code(&self) -> &'static str {
        "E_DECODE"
    }
}

// =============================================================================
// ENCODE
// =============================================================================

/// Encode an operation as a room-scoped event frame.
#[must_use]
pub fn encode(op: &Operation, room_id: &str) -> Frame {
    let (name, data) = match op {
        Operation::Draw { object } => (
            syscall::SHAPE_DRAW,
            object_data([
                (TYPE, Value::String(object.kind().wire_tag().to_owned())),
                (PROPS, Value::Object(props::to_props(object, &[props::ID]))),
            ]),
        ),
        Operation::Modify { id, props } => (
            syscall::SHAPE_MODIFY,
            object_data([(ID, Value::String(id.clone())), (PROPS, Value::Object(props.clone()))]),
        ),
        Operation::SelectionUpdate { ids } => (
            syscall::SELECTION_UPDATE,
            object_data([(IDS, ids.iter().cloned().map(Value::String).collect())]),
        ),
        Operation::BulkState { purpose, snapshot } => {
            let state = (STATE, Value::String(snapshot.clone()));
            match purpose {
                BulkPurpose::Handoff { to } => {
                    (syscall::SEND_STATE, object_data([(TO, Value::String(to.clone())), state]))
                }
                BulkPurpose::Bootstrap => (syscall::LOAD_STATE, object_data([state])),
                BulkPurpose::Undo { discarded } => {
                    let mut data = object_data([state]);
                    if let (Value::Object(map), Some(d)) = (&mut data, discarded) {
                        map.insert(DISCARDED.into(), Value::String(d.clone()));
                    }
                    (syscall::CANVAS_UNDO, data)
                }
                BulkPurpose::Clear => (syscall::CANVAS_CLEAR, object_data([state])),
            }
        }
    };
    Frame::event(name, data).with_room(room_id)
}

fn object_data<const N: usize>(fields: [(&str, Value); N]) -> Value {
    Value::Object(fields.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
}

// =============================================================================
// DECODE
// =============================================================================

/// Decode a room operation frame.
///
/// # Errors
///
/// Returns [`DecodeError`] for non-operation events, unknown shape kinds,
/// missing or mistyped fields, and snapshots that do not parse.
pub fn decode(frame: &Frame) -> Result<Operation, DecodeError> {
    let data = frame.data.as_object().ok_or(DecodeError::WrongType("data"))?;
    match frame.syscall.as_str() {
        syscall::SHAPE_DRAW => {
            let tag = required_str(data, TYPE)?;
            let kind = ShapeKind::from_wire(tag).ok_or_else(|| DecodeError::UnknownKind(tag.to_owned()))?;
            let object = props::from_props(kind, required_object(data, PROPS)?)?;
            Ok(Operation::Draw { object })
        }
        syscall::SHAPE_MODIFY => Ok(Operation::Modify {
            id: required_str(data, ID)?.to_owned(),
            props: required_object(data, PROPS)?.clone(),
        }),
        syscall::SELECTION_UPDATE => {
            let Value::Array(items) = data.get(IDS).ok_or(DecodeError::MissingField(IDS))? else {
                return Err(DecodeError::WrongType(IDS));
            };
            let ids = items
                .iter()
                .map(|v| v.as_str().map(str::to_owned).ok_or(DecodeError::WrongType(IDS)))
                .collect::<Result<_, _>>()?;
            Ok(Operation::SelectionUpdate { ids })
        }
        syscall::SEND_STATE => {
            let to = required_str(data, TO)?.to_owned();
            bulk(data, BulkPurpose::Handoff { to })
        }
        syscall::LOAD_STATE => bulk(data, BulkPurpose::Bootstrap),
        syscall::CANVAS_UNDO => {
            let discarded = match data.get(DISCARDED) {
                None | Some(Value::Null) => None,
                Some(v) => Some(snapshot_text(v).ok_or(DecodeError::WrongType(DISCARDED))?),
            };
            bulk(data, BulkPurpose::Undo { discarded })
        }
        syscall::CANVAS_CLEAR => bulk(data, BulkPurpose::Clear),
        other => Err(DecodeError::UnknownSyscall(other.to_owned())),
    }
}

fn bulk(data: &Map<String, Value>, purpose: BulkPurpose) -> Result<Operation, DecodeError> {
    let raw = data.get(STATE).ok_or(DecodeError::MissingField(STATE))?;
    let snapshot = snapshot_text(raw).ok_or(DecodeError::WrongType(STATE))?;
    Scene::from_snapshot(&snapshot)?;
    Ok(Operation::BulkState { purpose, snapshot })
}

/// Snapshots travel as JSON text; a raw JSON object is accepted and re-serialized.
fn snapshot_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => Some(v.to_string()),
        _ => None,
    }
}

fn required_str<'a>(data: &'a Map<String, Value>, key: &'static str) -> Result<&'a str, DecodeError> {
    data.get(key)
        .ok_or(DecodeError::MissingField(key))?
        .as_str()
        .ok_or(DecodeError::WrongType(key))
}

fn required_object<'a>(data: &'a Map<String, Value>, key: &'static str) -> Result<&'a Props, DecodeError> {
    data.get(key)
        .ok_or(DecodeError::MissingField(key))?
        .as_object()
        .ok_or(DecodeError::WrongType(key))
}
