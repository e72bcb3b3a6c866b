#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;
use crate::doc::{Geometry, Point, Style};

/// Encode, push through the protobuf wire, decode.
fn over_the_wire(op: &Operation) -> Operation {
    let frame = encode(op, "room-1");
    let bytes = frames::encode_frame(&frame);
    let back = frames::decode_frame(&bytes).expect("decode frame");
    assert_eq!(back.room_id.as_deref(), Some("room-1"));
    decode(&back).expect("decode op")
}

fn draw(geometry: Geometry, id: &str) -> Operation {
    Operation::Draw { object: SceneObject::new(geometry, Style::default()).with_id(id) }
}

fn frame(name: &str, data: Value) -> Frame {
    Frame::event(name, data)
}

// =============================================================
// Round trips
// =============================================================

#[test]
fn rectangle_draw_round_trips() {
    let op = draw(Geometry::Rectangle { left: 10.0, top: 10.0, width: 50.0, height: 50.0 }, "r1");
    assert_eq!(over_the_wire(&op), op);
}

#[test]
fn circle_draw_round_trips() {
    let op = draw(Geometry::Circle { left: 3.0, top: 4.0, radius: 12.5 }, "c1");
    assert_eq!(over_the_wire(&op), op);
}

#[test]
fn line_draw_round_trips() {
    let op = draw(Geometry::Line { x1: 0.0, y1: 0.0, x2: 100.0, y2: 50.0 }, "l1");
    assert_eq!(over_the_wire(&op), op);
}

#[test]
fn freehand_draw_carries_full_point_sequence() {
    let points = vec![Point::new(0.0, 0.0), Point::new(1.5, 2.0), Point::new(3.0, 7.25)];
    let op = draw(Geometry::FreehandPath { points }, "p1");
    let back = over_the_wire(&op);
    assert_eq!(back, op);
    let Operation::Draw { object } = back else {
        panic!("expected draw");
    };
    assert_eq!(object.id, "p1");
}

#[test]
fn modify_round_trips() {
    let props = json!({"left": 40.0, "fill": "#ff0000"}).as_object().cloned().expect("object");
    let op = Operation::Modify { id: "r1".into(), props };
    assert_eq!(over_the_wire(&op), op);
}

#[test]
fn multi_id_selection_round_trips_as_set() {
    let ids: BTreeSet<ObjectId> = ["c", "a", "b"].into_iter().map(String::from).collect();
    let op = Operation::SelectionUpdate { ids };
    let frame = encode(&op, "room-1");
    assert_eq!(frame.data["ids"], json!(["a", "b", "c"]));
    assert_eq!(over_the_wire(&op), op);
}

#[test]
fn bulk_state_purposes_map_to_messages() {
    let snapshot = Scene::new().to_snapshot();
    let cases = [
        (BulkPurpose::Handoff { to: "conn-2".into() }, syscall::SEND_STATE),
        (BulkPurpose::Bootstrap, syscall::LOAD_STATE),
        (BulkPurpose::Undo { discarded: Some(snapshot.clone()) }, syscall::CANVAS_UNDO),
        (BulkPurpose::Clear, syscall::CANVAS_CLEAR),
    ];
    for (purpose, name) in cases {
        let op = Operation::BulkState { purpose, snapshot: snapshot.clone() };
        assert_eq!(encode(&op, "room-1").syscall, name);
        assert_eq!(over_the_wire(&op), op);
    }
}

#[test]
fn handoff_carries_target() {
    let op = Operation::BulkState { purpose: BulkPurpose::Handoff { to: "conn-9".into() }, snapshot: String::new() };
    let frame = encode(&op, "room-1");
    assert_eq!(frame.data_str("to"), Some("conn-9"));
    assert_eq!(frame.data_str("state"), Some(""));
}

// =============================================================
// Decode errors
// =============================================================

#[test]
fn unknown_kind_is_reported_not_panicked() {
    let f = frame(syscall::SHAPE_DRAW, json!({"type": "hexagon", "props": {"id": "h"}}));
    assert!(matches!(decode(&f), Err(DecodeError::UnknownKind(k)) if k == "hexagon"));
}

#[test]
fn draw_alias_type_is_accepted() {
    let f = frame(
        syscall::SHAPE_DRAW,
        json!({"type": "rect", "props": {"id": "r", "left": 0, "top": 0, "width": 1, "height": 1}}),
    );
    assert!(matches!(decode(&f), Ok(Operation::Draw { .. })));
}

#[test]
fn draw_without_props_is_missing_field() {
    let f = frame(syscall::SHAPE_DRAW, json!({"type": "circle"}));
    assert!(matches!(decode(&f), Err(DecodeError::MissingField("props"))));
}

#[test]
fn draw_without_id_decodes_with_empty_id() {
    let f = frame(syscall::SHAPE_DRAW, json!({"type": "circle", "props": {"left": 0, "top": 0, "radius": 2}}));
    let Ok(Operation::Draw { object }) = decode(&f) else {
        panic!("expected draw");
    };
    assert!(!object.has_id());
}

#[test]
fn modify_with_non_string_id_is_wrong_type() {
    let f = frame(syscall::SHAPE_MODIFY, json!({"id": 7, "props": {}}));
    assert!(matches!(decode(&f), Err(DecodeError::WrongType("id"))));
}

#[test]
fn selection_with_non_string_entry_is_wrong_type() {
    let f = frame(syscall::SELECTION_UPDATE, json!({"ids": ["a", 1]}));
    assert!(matches!(decode(&f), Err(DecodeError::WrongType("ids"))));
}

#[test]
fn malformed_snapshot_is_reported() {
    let f = frame(syscall::LOAD_STATE, json!({"state": "{not json"}));
    assert!(matches!(decode(&f), Err(DecodeError::Snapshot(_))));
}

#[test]
fn object_state_is_accepted_as_snapshot() {
    let f = frame(syscall::CANVAS_CLEAR, json!({"state": {"objects": []}}));
    let Ok(Operation::BulkState { purpose, snapshot }) = decode(&f) else {
        panic!("expected bulk state");
    };
    assert_eq!(purpose, BulkPurpose::Clear);
    assert!(Scene::from_snapshot(&snapshot).expect("parse").is_empty());
}

#[test]
fn non_operation_events_are_unknown_syscalls() {
    let f = frame(syscall::JOIN_ROOM, json!({"roomId": "r"}));
    assert!(matches!(decode(&f), Err(DecodeError::UnknownSyscall(s)) if s == "join-room"));
}

#[test]
fn non_object_payload_is_rejected() {
    let f = frame(syscall::SHAPE_MODIFY, json!([1, 2]));
    assert!(matches!(decode(&f), Err(DecodeError::WrongType("data"))));
}

#[test]
fn decode_error_maps_to_wire_code() {
    use frames::ErrorCode;
    assert_eq!(DecodeError::MissingField("id").error_code(), "E_DECODE");
}
