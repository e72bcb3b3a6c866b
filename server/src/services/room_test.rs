use frames::{Frame, syscall};
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::*;
use crate::config::RelayConfig;
use crate::state::AppState;

fn test_state() -> AppState {
    AppState::new(RelayConfig::default())
}

async fn joined(state: &AppState, room: &str, name: &str, capacity: usize) -> (Uuid, mpsc::Receiver<Frame>) {
    let (tx, rx) = mpsc::channel(capacity);
    let id = Uuid::new_v4();
    join_room(state, id, room, name, tx).await;
    (id, rx)
}

#[tokio::test]
async fn join_announces_user_joined_to_existing_members() {
    let state = test_state();
    let (_a, mut ra) = joined(&state, "room-a", "alice", 8).await;
    let (b, mut rb) = joined(&state, "room-a", "bob", 8).await;

    let frame = ra.try_recv().expect("user:joined");
    assert_eq!(frame.syscall, syscall::USER_JOINED);
    assert_eq!(frame.room_id.as_deref(), Some("room-a"));
    assert_eq!(frame.data_str("username"), Some("bob"));
    assert_eq!(frame.data_str("socketId"), Some(b.to_string().as_str()));
    assert!(rb.try_recv().is_err(), "joiner is not told about itself");
}

#[tokio::test]
async fn join_reports_existing_peer_count() {
    let state = test_state();
    let (tx, _rx) = mpsc::channel(8);
    assert_eq!(join_room(&state, Uuid::new_v4(), "room-a", "alice", tx.clone()).await, 0);
    assert_eq!(join_room(&state, Uuid::new_v4(), "room-a", "bob", tx).await, 1);
}

#[tokio::test]
async fn switching_rooms_announces_user_left_in_the_old_room() {
    let state = test_state();
    let (_a, mut ra) = joined(&state, "room-a", "alice", 8).await;
    let (tx_b, _rb) = mpsc::channel(8);
    let b = Uuid::new_v4();
    join_room(&state, b, "room-a", "bob", tx_b.clone()).await;
    ra.try_recv().expect("user:joined");

    join_room(&state, b, "room-b", "bob", tx_b).await;
    let left = ra.try_recv().expect("user:left");
    assert_eq!(left.syscall, syscall::USER_LEFT);
    assert_eq!(left.data_str("username"), Some("bob"));
    assert_eq!(state.relay.read().await.room_of(b), Some("room-b"));
}

#[tokio::test]
async fn leave_announces_and_drops_empty_room() {
    let state = test_state();
    let (a, _ra) = joined(&state, "room-a", "alice", 8).await;
    let (b, mut rb) = joined(&state, "room-a", "bob", 8).await;

    let departure = leave_room(&state, a).await.expect("departure");
    assert_eq!(departure.remaining, 1);
    assert_eq!(rb.try_recv().expect("user:left").syscall, syscall::USER_LEFT);

    leave_room(&state, b).await.expect("departure");
    assert_eq!(state.relay.read().await.room_count(), 0);
    assert!(leave_room(&state, b).await.is_none());
}

#[tokio::test]
async fn forward_counts_recipients() {
    let state = test_state();
    let (a, _ra) = joined(&state, "room-a", "alice", 8).await;
    let (_b, _rb) = joined(&state, "room-a", "bob", 8).await;
    let (_c, _rc) = joined(&state, "room-a", "carol", 8).await;

    let frame = Frame::event(syscall::SHAPE_DRAW, json!({})).with_room("room-a");
    assert_eq!(forward(&state, a, &frame).await, Ok(Some(2)));
}

#[tokio::test]
async fn forward_outside_a_room_is_none() {
    let state = test_state();
    let frame = Frame::event(syscall::SHAPE_DRAW, json!({}));
    assert_eq!(forward(&state, Uuid::new_v4(), &frame).await, Ok(None));
}

#[tokio::test]
async fn forward_to_full_member_is_forward_error() {
    let state = test_state();
    let (a, _ra) = joined(&state, "room-a", "alice", 8).await;
    // Bob buffers a single frame.
    let (_b, _rb) = joined(&state, "room-a", "bob", 1).await;

    let frame = Frame::event(syscall::SHAPE_DRAW, json!({})).with_room("room-a");
    assert_eq!(forward(&state, a, &frame).await, Ok(Some(1)));
    assert_eq!(forward(&state, a, &frame).await, Err(RelayError::Forward { failed: 1, attempted: 1 }));
}

#[tokio::test]
async fn hand_off_rejects_malformed_and_unknown_targets() {
    let state = test_state();
    let (a, _ra) = joined(&state, "room-a", "alice", 8).await;
    let frame = Frame::event(syscall::LOAD_STATE, json!({"state": ""}));

    assert_eq!(
        hand_off(&state, a, "not-a-uuid", frame.clone()).await,
        Err(RelayError::UnknownTarget("not-a-uuid".into()))
    );
    let stranger = Uuid::new_v4().to_string();
    assert_eq!(hand_off(&state, a, &stranger, frame).await, Err(RelayError::UnknownTarget(stranger.clone())));
}

#[tokio::test]
async fn hand_off_delivers_once() {
    let state = test_state();
    let (a, _ra) = joined(&state, "room-a", "alice", 8).await;
    let (b, mut rb) = joined(&state, "room-a", "bob", 8).await;
    let frame = Frame::event(syscall::LOAD_STATE, json!({"state": ""}));

    assert_eq!(hand_off(&state, a, &b.to_string(), frame.clone()).await, Ok(Handoff::Delivered));
    assert_eq!(hand_off(&state, a, &b.to_string(), frame).await, Ok(Handoff::AlreadySatisfied));
    assert_eq!(rb.try_recv().expect("load").syscall, syscall::LOAD_STATE);
    assert!(rb.try_recv().is_err());
}

#[test]
fn error_codes_are_stable() {
    assert_eq!(RelayError::MissingRoomId.error_code(), "E_BAD_REQUEST");
    assert_eq!(RelayError::UnknownTarget("x".into()).error_code(), "E_UNKNOWN_TARGET");
    assert_eq!(RelayError::Forward { failed: 1, attempted: 2 }.error_code(), "E_FORWARD");
    assert_eq!(RelayError::UnknownEvent("x".into()).error_code(), "E_UNKNOWN_EVENT");
    assert_eq!(RelayError::Decode("x".into()).error_code(), "E_DECODE");
}
