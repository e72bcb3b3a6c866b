use frames::{Frame, syscall};
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::*;

fn member(capacity: usize) -> (Uuid, mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Uuid::new_v4(), tx, rx)
}

fn op() -> Frame {
    Frame::event(syscall::SHAPE_DRAW, json!({})).with_room("room-a")
}

#[test]
fn first_joiner_sees_no_peers_and_is_not_awaiting() {
    let mut relay = RoomRelay::new();
    let (a, tx, _rx) = member(4);

    let joined = relay.join(a, "room-a", "alice", tx);
    assert_eq!(joined.peers, 0);
    assert!(joined.previous.is_none());
    assert_eq!(relay.room_of(a), Some("room-a"));
    assert!(relay.room("room-a").expect("room").awaiting_state.is_empty());
}

#[test]
fn later_joiner_awaits_state() {
    let mut relay = RoomRelay::new();
    let (a, tx_a, _ra) = member(4);
    let (b, tx_b, _rb) = member(4);

    relay.join(a, "room-a", "alice", tx_a);
    let joined = relay.join(b, "room-a", "bob", tx_b);
    assert_eq!(joined.peers, 1);
    assert!(relay.room("room-a").expect("room").awaiting_state.contains(&b));
}

#[test]
fn joining_another_room_leaves_the_first() {
    let mut relay = RoomRelay::new();
    let (a, tx, _rx) = member(4);

    relay.join(a, "room-a", "alice", tx.clone());
    let joined = relay.join(a, "room-b", "alice", tx);
    assert_eq!(
        joined.previous,
        Some(Departure { room: "room-a".into(), username: "alice".into(), remaining: 0 })
    );
    assert_eq!(relay.room_of(a), Some("room-b"));
    assert!(relay.room("room-a").is_none());
    assert_eq!(relay.room_count(), 1);
}

#[test]
fn last_leave_drops_the_room() {
    let mut relay = RoomRelay::new();
    let (a, tx_a, _ra) = member(4);
    let (b, tx_b, _rb) = member(4);
    relay.join(a, "room-a", "alice", tx_a);
    relay.join(b, "room-a", "bob", tx_b);

    let first = relay.leave(a).expect("departure");
    assert_eq!(first.remaining, 1);
    assert_eq!(relay.member_count("room-a"), 1);

    let second = relay.leave(b).expect("departure");
    assert_eq!(second.remaining, 0);
    assert_eq!(relay.room_count(), 0);
    assert!(relay.leave(b).is_none());
}

#[test]
fn forward_excludes_sender() {
    let mut relay = RoomRelay::new();
    let (a, tx_a, mut ra) = member(4);
    let (b, tx_b, mut rb) = member(4);
    let (c, tx_c, mut rc) = member(4);
    relay.join(a, "room-a", "alice", tx_a);
    relay.join(b, "room-a", "bob", tx_b);
    relay.join(c, "room-a", "carol", tx_c);

    let failures = relay.forward(a, &op()).expect("in room");
    assert!(failures.is_empty());
    assert!(ra.try_recv().is_err());
    assert_eq!(rb.try_recv().expect("bob").syscall, syscall::SHAPE_DRAW);
    assert_eq!(rc.try_recv().expect("carol").syscall, syscall::SHAPE_DRAW);
}

#[test]
fn forward_does_not_cross_rooms() {
    let mut relay = RoomRelay::new();
    let (a, tx_a, _ra) = member(4);
    let (b, tx_b, mut rb) = member(4);
    relay.join(a, "room-a", "alice", tx_a);
    relay.join(b, "room-b", "bob", tx_b);

    relay.forward(a, &op()).expect("in room");
    assert!(rb.try_recv().is_err());
}

#[test]
fn forward_outside_a_room_is_none() {
    let relay = RoomRelay::new();
    assert!(relay.forward(Uuid::new_v4(), &op()).is_none());
}

#[test]
fn full_member_is_reported_and_others_still_receive() {
    let mut relay = RoomRelay::new();
    let (a, tx_a, _ra) = member(4);
    let (b, tx_b, _rb) = member(1);
    let (c, tx_c, mut rc) = member(4);
    relay.join(a, "room-a", "alice", tx_a);
    relay.join(b, "room-a", "bob", tx_b);
    relay.join(c, "room-a", "carol", tx_c);

    relay.forward(a, &op()).expect("in room");
    let failures = relay.forward(a, &op()).expect("in room");
    assert_eq!(failures, vec![(b, DeliveryFailure::Full)]);
    assert!(rc.try_recv().is_ok());
    assert!(rc.try_recv().is_ok());
}

#[test]
fn closed_member_is_reported() {
    let mut relay = RoomRelay::new();
    let (a, tx_a, _ra) = member(4);
    let (b, tx_b, rb) = member(4);
    relay.join(a, "room-a", "alice", tx_a);
    relay.join(b, "room-a", "bob", tx_b);
    drop(rb);

    let failures = relay.forward(a, &op()).expect("in room");
    assert_eq!(failures, vec![(b, DeliveryFailure::Closed)]);
}

#[test]
fn first_handoff_wins() {
    let mut relay = RoomRelay::new();
    let (a, tx_a, _ra) = member(4);
    let (b, tx_b, _rb) = member(4);
    let (c, tx_c, mut rc) = member(4);
    relay.join(a, "room-a", "alice", tx_a);
    relay.join(b, "room-a", "bob", tx_b);
    relay.join(c, "room-a", "carol", tx_c);

    let load = Frame::event(syscall::LOAD_STATE, json!({"state": ""})).with_room("room-a");
    assert_eq!(relay.send_to(a, c, load.clone()), Ok(Handoff::Delivered));
    assert_eq!(relay.send_to(b, c, load), Ok(Handoff::AlreadySatisfied));
    assert!(rc.try_recv().is_ok());
    assert!(rc.try_recv().is_err());
}

#[test]
fn handoff_to_stranger_is_unknown_target() {
    let mut relay = RoomRelay::new();
    let (a, tx_a, _ra) = member(4);
    let (b, tx_b, _rb) = member(4);
    relay.join(a, "room-a", "alice", tx_a);
    relay.join(b, "room-b", "bob", tx_b);

    let load = Frame::event(syscall::LOAD_STATE, json!({"state": ""}));
    assert_eq!(relay.send_to(a, b, load.clone()), Err(HandoffError::UnknownTarget));
    assert_eq!(relay.send_to(Uuid::new_v4(), b, load), Err(HandoffError::UnknownTarget));
}

#[test]
fn failed_handoff_leaves_target_awaiting() {
    let mut relay = RoomRelay::new();
    let (a, tx_a, _ra) = member(4);
    let (b, tx_b, rb) = member(4);
    let (c, tx_c, _rc) = member(4);
    relay.join(a, "room-a", "alice", tx_a);
    relay.join(c, "room-a", "carol", tx_c);
    relay.join(b, "room-a", "bob", tx_b);
    drop(rb);

    let load = Frame::event(syscall::LOAD_STATE, json!({"state": ""}));
    assert_eq!(relay.send_to(a, b, load), Err(HandoffError::Delivery(DeliveryFailure::Closed)));
    assert!(relay.room("room-a").expect("room").awaiting_state.contains(&b));
}
