//! Shared frame model and wire codecs for the realtime scene relay.
//!
//! This crate owns the wire representation used by both `server` and the
//! participant crates. Every message on the socket is a [`Frame`]: the event
//! name lives in `syscall`, the room scope in `room_id`, and the payload in a
//! flexible `serde_json::Value`. Frames travel either as compact protobuf
//! bytes ([`encode_frame`]) or as JSON text ([`to_json`]).

use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Frame data key for error messages.
pub const FRAME_MESSAGE: &str = "message";

/// Frame data key for grepable error codes.
pub const FRAME_CODE: &str = "code";

/// Syscall used for scoped error events sent back to a connection.
pub const ERROR_SYSCALL: &str = "error";

/// Event names carried in [`Frame::syscall`].
pub mod syscall {
    /// Relay → connection, on upgrade. `{client_id}`.
    pub const SESSION_CONNECTED: &str = "session:connected";
    /// Client → relay. `{roomId, username}`.
    pub const JOIN_ROOM: &str = "join-room";
    /// Relay → joiner, after membership is recorded. `{roomId, peers}`.
    pub const ROOM_JOINED: &str = "room:joined";
    /// Relay → existing members. `{username, socketId}`.
    pub const USER_JOINED: &str = "user:joined";
    /// Relay → remaining members. `{username, socketId}`.
    pub const USER_LEFT: &str = "user:left";
    /// Member → relay, targeted. `{to, state}`.
    pub const SEND_STATE: &str = "canvas:send-state";
    /// Relay → joiner. `{state}`.
    pub const LOAD_STATE: &str = "canvas:load-state";
    pub const SHAPE_DRAW: &str = "shape:draw";
    pub const SHAPE_MODIFY: &str = "shape:modify";
    pub const SELECTION_UPDATE: &str = "selection:update";
    pub const CANVAS_UNDO: &str = "canvas:undo";
    pub const CANVAS_CLEAR: &str = "canvas:clear";

    /// Room operations the relay forwards verbatim to every other member.
    pub const ROOM_BROADCAST: &[&str] = &[SHAPE_DRAW, SHAPE_MODIFY, SELECTION_UPDATE, CANVAS_UNDO, CANVAS_CLEAR];
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned by [`decode_frame`] and [`from_json`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes could not be decoded as a protobuf `WireFrame`.
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The text could not be parsed as a JSON frame.
    #[error("failed to decode json frame: {0}")]
    Json(#[from] serde_json::Error),
    /// The `status` integer on the wire does not map to a known [`Status`] variant.
    #[error("invalid frame status: {0}")]
    InvalidStatus(i32),
}

/// Grepable error code for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

// =============================================================================
// TYPES
// =============================================================================

/// Whether a frame carries an ordinary event or a scoped error report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// A room event or a client request.
    Event,
    /// An error scoped to the connection it is sent to.
    Error,
}

impl Status {
    /// Convert status into wire enum integer value.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Event => WireFrameStatus::Event as i32,
            Self::Error => WireFrameStatus::Error as i32,
        }
    }

    /// Parse a status from wire enum integer value.
    fn from_i32(value: i32) -> Result<Self, CodecError> {
        match WireFrameStatus::try_from(value) {
            Ok(WireFrameStatus::Event) => Ok(Self::Event),
            Ok(WireFrameStatus::Error) => Ok(Self::Error),
            Err(_) => Err(CodecError::InvalidStatus(value)),
        }
    }
}

/// A single message on the realtime wire protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Unique identifier for this frame (UUID string).
    pub id: String,
    /// Milliseconds since the Unix epoch when the frame was created.
    pub ts: i64,
    /// Room scope for this frame, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Originating connection. Stamped by the relay on every forwarded frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Per-origin monotonically increasing sequence number, if the sender tags one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// Event name, e.g. `"shape:draw"`.
    pub syscall: String,
    /// Event or error.
    pub status: Status,
    /// Arbitrary JSON payload.
    #[serde(default = "empty_object")]
    pub data: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

impl Frame {
    /// Create an event frame with the given payload.
    pub fn event(syscall: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ts: now_ms(),
            room_id: None,
            from: None,
            seq: None,
            syscall: syscall.into(),
            status: Status::Event,
            data,
        }
    }

    /// Create a scoped error event carrying a plain message.
    pub fn error(message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert(FRAME_MESSAGE.into(), Value::String(message.into()));
        Self { status: Status::Error, ..Self::event(ERROR_SYSCALL, Value::Object(data)) }
    }

    /// Create a scoped error event from a typed error.
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::error(err.to_string()).with_data(FRAME_CODE, err.error_code())
    }

    #[must_use]
    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    #[must_use]
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    /// Insert a key into the payload. A non-object payload is replaced by an object.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if !self.data.is_object() {
            self.data = empty_object();
        }
        if let Some(map) = self.data.as_object_mut() {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// String field of the payload, if present.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

// =============================================================================
// PROTOBUF CODEC
// =============================================================================

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let wire = frame_to_wire(frame);

    let mut out = Vec::with_capacity(wire.encoded_len());
    // Encoding into a growable Vec cannot hit `BufferTooSmall`.
    wire.encode(&mut out).unwrap_or_default();
    out
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes and
/// [`CodecError::InvalidStatus`] for out-of-range status values.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireFrame::decode(bytes)?;
    wire_to_frame(wire)
}

// =============================================================================
// JSON CODEC
// =============================================================================

/// Encode a frame as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the payload cannot be serialized.
pub fn to_json(frame: &Frame) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode a frame from JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed text or missing envelope fields.
pub fn from_json(text: &str) -> Result<Frame, CodecError> {
    Ok(serde_json::from_str(text)?)
}

fn frame_to_wire(frame: &Frame) -> WireFrame {
    WireFrame {
        id: frame.id.clone(),
        ts: frame.ts,
        room_id: frame.room_id.clone(),
        from: frame.from.clone(),
        syscall: frame.syscall.clone(),
        status: frame.status.as_i32(),
        data: Some(json_to_proto_value(&frame.data)),
        seq: frame.seq,
    }
}

fn wire_to_frame(wire: WireFrame) -> Result<Frame, CodecError> {
    Ok(Frame {
        id: wire.id,
        ts: wire.ts,
        room_id: wire.room_id,
        from: wire.from,
        seq: wire.seq,
        syscall: wire.syscall,
        status: Status::from_i32(wire.status)?,
        data: wire.data.map_or_else(empty_object, |v| proto_to_json_value(&v)),
    })
}

fn json_to_proto_value(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => prost_types::value::Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(v) => prost_types::value::Kind::BoolValue(*v),
        Value::Number(v) => prost_types::value::Kind::NumberValue(v.as_f64().unwrap_or(0.0)),
        Value::String(v) => prost_types::value::Kind::StringValue(v.clone()),
        Value::Array(v) => prost_types::value::Kind::ListValue(prost_types::ListValue {
            values: v.iter().map(json_to_proto_value).collect(),
        }),
        Value::Object(v) => prost_types::value::Kind::StructValue(prost_types::Struct {
            fields: v
                .iter()
                .map(|(k, v)| (k.clone(), json_to_proto_value(v)))
                .collect(),
        }),
    };

    prost_types::Value { kind: Some(kind) }
}

fn proto_to_json_value(value: &prost_types::Value) -> Value {
    let Some(kind) = &value.kind else {
        return Value::Null;
    };

    match kind {
        prost_types::value::Kind::NullValue(_) => Value::Null,
        prost_types::value::Kind::NumberValue(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
        prost_types::value::Kind::StringValue(v) => Value::String(v.clone()),
        prost_types::value::Kind::BoolValue(v) => Value::Bool(*v),
        prost_types::value::Kind::StructValue(v) => Value::Object(
            v.fields
                .iter()
                .map(|(k, v)| (k.clone(), proto_to_json_value(v)))
                .collect(),
        ),
        prost_types::value::Kind::ListValue(v) => Value::Array(v.values.iter().map(proto_to_json_value).collect()),
    }
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(int64, tag = "3")]
    ts: i64,
    #[prost(string, optional, tag = "4")]
    room_id: Option<String>,
    #[prost(string, optional, tag = "5")]
    from: Option<String>,
    #[prost(string, tag = "6")]
    syscall: String,
    #[prost(enumeration = "WireFrameStatus", tag = "7")]
    status: i32,
    #[prost(message, optional, tag = "8")]
    data: Option<prost_types::Value>,
    #[prost(uint64, optional, tag = "9")]
    seq: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
enum WireFrameStatus {
    Event = 0,
    Error = 2,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
