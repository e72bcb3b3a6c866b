use super::*;
use crate::doc::{Geometry, Style};

fn unnamed() -> SceneObject {
    SceneObject::new(Geometry::Circle { left: 0.0, top: 0.0, radius: 1.0 }, Style::default())
}

#[test]
fn ensure_id_assigns_when_missing() {
    let mut reg = ShapeRegistry::new();
    let mut obj = unnamed();
    let id = reg.ensure_id(&mut obj);
    assert!(!id.is_empty());
    assert_eq!(obj.id, id);
    assert!(reg.is_known(&id));
}

#[test]
fn ensure_id_keeps_existing_id() {
    let mut reg = ShapeRegistry::new();
    let mut obj = unnamed().with_id("fixed");
    assert_eq!(reg.ensure_id(&mut obj), "fixed");
    assert_eq!(reg.ensure_id(&mut obj), "fixed");
}

#[test]
fn fresh_ids_are_distinct() {
    let mut reg = ShapeRegistry::new();
    let a = reg.ensure_id(&mut unnamed());
    let b = reg.ensure_id(&mut unnamed());
    assert_ne!(a, b);
}

#[test]
fn observe_marks_peer_ids_known() {
    let mut reg = ShapeRegistry::new();
    assert!(!reg.is_known("peer-1"));
    reg.observe("peer-1");
    assert!(reg.is_known("peer-1"));
    reg.forget_all();
    assert!(!reg.is_known("peer-1"));
}
