use super::*;

fn sample_frame() -> Frame {
    Frame {
        id: "id-1".to_owned(),
        ts: 42,
        room_id: Some("room-1".to_owned()),
        from: Some("conn-1".to_owned()),
        seq: Some(7),
        syscall: "shape:modify".to_owned(),
        status: Status::Event,
        data: serde_json::json!({
            "id": "s1",
            "props": {"left": 1.25, "top": 3.5},
            "ok": true,
            "tags": ["a", "b"],
            "nil": null
        }),
    }
}

#[test]
fn status_numeric_mapping_matches_wire_enum() {
    assert_eq!(Status::Event.as_i32(), 0);
    assert_eq!(Status::Error.as_i32(), 2);
}

#[test]
fn status_round_trips_from_wire_values() {
    assert_eq!(Status::from_i32(0).expect("status"), Status::Event);
    assert_eq!(Status::from_i32(2).expect("status"), Status::Error);
}

#[test]
fn status_from_wire_rejects_out_of_range_value() {
    let err = Status::from_i32(99).expect_err("status should be invalid");
    assert!(matches!(err, CodecError::InvalidStatus(99)));
}

#[test]
fn encode_decode_round_trip_preserves_frame() {
    let frame = sample_frame();
    let bytes = encode_frame(&frame);
    let decoded = decode_frame(&bytes).expect("decode should succeed");
    assert_eq!(decoded, frame);
}

#[test]
fn decode_frame_rejects_malformed_bytes() {
    let err = decode_frame(&[0xff, 0x00, 0x01]).expect_err("bytes should fail");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn decode_frame_rejects_invalid_wire_status() {
    let wire = WireFrame {
        id: "id-1".to_owned(),
        ts: 1,
        room_id: None,
        from: None,
        syscall: "join-room".to_owned(),
        status: 77,
        data: Some(json_to_proto_value(&serde_json::json!({}))),
        seq: None,
    };
    let mut bytes = Vec::new();
    wire.encode(&mut bytes).expect("encode");

    let err = decode_frame(&bytes).expect_err("status should fail");
    assert!(matches!(err, CodecError::InvalidStatus(77)));
}

#[test]
fn decode_frame_defaults_missing_data_to_empty_object() {
    let wire = WireFrame {
        id: "id-1".to_owned(),
        ts: 1,
        room_id: None,
        from: None,
        syscall: "join-room".to_owned(),
        status: Status::Event.as_i32(),
        data: None,
        seq: None,
    };
    let mut bytes = Vec::new();
    wire.encode(&mut bytes).expect("encode");

    let frame = decode_frame(&bytes).expect("decode");
    assert_eq!(frame.data, serde_json::json!({}));
}

#[test]
fn integer_json_numbers_are_normalized_to_float_numbers() {
    let frame = Frame::event("shape:draw", serde_json::json!({"width": 50}));
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode");
    assert_eq!(decoded.data.get("width"), Some(&serde_json::json!(50.0)));
}

#[test]
fn json_round_trip_preserves_frame() {
    let frame = sample_frame();
    let text = to_json(&frame).expect("serialize");
    let decoded = from_json(&text).expect("deserialize");
    assert_eq!(decoded, frame);
}

#[test]
fn json_frame_omits_absent_optional_fields() {
    let frame = Frame::event("join-room", serde_json::json!({"roomId": "r"}));
    let text = to_json(&frame).expect("serialize");
    assert!(!text.contains("room_id"));
    assert!(!text.contains("seq"));
}

#[test]
fn json_frame_without_data_defaults_to_empty_object() {
    let text = r#"{"id":"x","ts":1,"syscall":"join-room","status":"event"}"#;
    let frame = from_json(text).expect("deserialize");
    assert_eq!(frame.data, serde_json::json!({}));
}

#[test]
fn from_json_rejects_garbage() {
    let err = from_json("not json").expect_err("should fail");
    assert!(matches!(err, CodecError::Json(_)));
}

#[test]
fn event_builders_set_envelope_fields() {
    let frame = Frame::event("shape:draw", serde_json::json!({}))
        .with_room("room-9")
        .with_from("conn-2")
        .with_seq(3)
        .with_data("type", "rectangle");

    assert_eq!(frame.status, Status::Event);
    assert_eq!(frame.room_id.as_deref(), Some("room-9"));
    assert_eq!(frame.from.as_deref(), Some("conn-2"));
    assert_eq!(frame.seq, Some(3));
    assert_eq!(frame.data_str("type"), Some("rectangle"));
    assert!(frame.ts > 0);
}

#[test]
fn with_data_replaces_non_object_payload() {
    let frame = Frame::event("selection:update", Value::Null).with_data("ids", serde_json::json!(["a"]));
    assert_eq!(frame.data, serde_json::json!({"ids": ["a"]}));
}

#[test]
fn error_from_typed() {
    #[derive(Debug, thiserror::Error)]
    #[error("not in a room")]
    struct NotInRoom;

    impl ErrorCode for NotInRoom {
        fn error_code(&self) -> &'static str {
            "E_NOT_IN_ROOM"
        }
    }

    let err = Frame::error_from(&NotInRoom);

    assert_eq!(err.status, Status::Error);
    assert_eq!(err.syscall, ERROR_SYSCALL);
    assert_eq!(err.data_str("code"), Some("E_NOT_IN_ROOM"));
    assert_eq!(err.data_str("message"), Some("not in a room"));
}

#[test]
fn status_serializes_as_lowercase_json() {
    assert_eq!(serde_json::to_string(&Status::Event).expect("serialize"), "\"event\"");
    assert_eq!(serde_json::to_string(&Status::Error).expect("serialize"), "\"error\"");
}

#[test]
fn status_rejects_non_lowercase_json() {
    assert!(serde_json::from_str::<Status>("\"Error\"").is_err());
}

#[test]
fn room_broadcast_lists_scene_events_only() {
    assert_eq!(syscall::ROOM_BROADCAST.len(), 5);
    for name in [syscall::SHAPE_DRAW, syscall::SHAPE_MODIFY, syscall::SELECTION_UPDATE, syscall::CANVAS_UNDO, syscall::CANVAS_CLEAR] {
        assert!(syscall::ROOM_BROADCAST.contains(&name), "{name} is forwarded to the room");
    }
    for name in [syscall::JOIN_ROOM, syscall::SEND_STATE, syscall::LOAD_STATE, syscall::USER_JOINED] {
        assert!(!syscall::ROOM_BROADCAST.contains(&name), "{name} is not a room broadcast");
    }
}
