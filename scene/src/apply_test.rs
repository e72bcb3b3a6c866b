#![allow(clippy::float_cmp)]

use std::collections::BTreeSet;

use serde_json::json;

use super::*;
use crate::doc::{Geometry, Props, Scene, SceneObject, Style};
use crate::surface::{ChangeEvent, MemorySurface};

struct Fixture {
    surface: MemorySurface,
    registry: ShapeRegistry,
    selections: RemoteSelections,
}

impl Fixture {
    fn new() -> Self {
        Self { surface: MemorySurface::new(), registry: ShapeRegistry::new(), selections: RemoteSelections::new() }
    }

    fn apply(&mut self, op: Operation) -> Applied {
        Applier { surface: &mut self.surface, registry: &mut self.registry, selections: &mut self.selections }
            .apply("peer-1", op)
    }
}

fn rect(id: &str, left: f64) -> SceneObject {
    SceneObject::new(Geometry::Rectangle { left, top: 10.0, width: 50.0, height: 50.0 }, Style::default()).with_id(id)
}

fn props(v: serde_json::Value) -> Props {
    v.as_object().cloned().unwrap_or_default()
}

#[test]
fn draw_appends_without_raising_events() {
    let mut fx = Fixture::new();
    let applied = fx.apply(Operation::Draw { object: rect("r1", 10.0) });
    assert!(matches!(applied, Applied::Drew { ref id } if id == "r1"));
    assert!(applied.changed_scene());
    assert_eq!(fx.surface.all_objects(), vec!["r1".to_owned()]);
    assert!(fx.surface.drain_events().is_empty());
    assert!(!fx.surface.is_suppressed());
    assert!(fx.registry.is_known("r1"));
}

#[test]
fn redelivered_draw_replaces_in_place() {
    let mut fx = Fixture::new();
    fx.apply(Operation::Draw { object: rect("r1", 10.0) });
    fx.apply(Operation::Draw { object: rect("r2", 0.0) });
    let applied = fx.apply(Operation::Draw { object: rect("r1", 99.0) });

    assert!(matches!(applied, Applied::Redrew { .. }));
    assert_eq!(fx.surface.all_objects(), vec!["r1".to_owned(), "r2".to_owned()]);
    let Some(obj) = fx.surface.find_object("r1") else {
        panic!("r1 missing");
    };
    assert_eq!(obj.bounds().left, 99.0);
}

#[test]
fn draw_without_id_gets_one() {
    let mut fx = Fixture::new();
    let obj = SceneObject::new(Geometry::Circle { left: 0.0, top: 0.0, radius: 3.0 }, Style::default());
    let Applied::Drew { id } = fx.apply(Operation::Draw { object: obj }) else {
        panic!("expected draw");
    };
    assert!(!id.is_empty());
    assert!(fx.surface.find_object(&id).is_some());
}

#[test]
fn modify_overwrites_present_fields() {
    let mut fx = Fixture::new();
    fx.apply(Operation::Draw { object: rect("r1", 10.0) });
    let applied = fx.apply(Operation::Modify { id: "r1".into(), props: props(json!({"left": 40, "fill": "#ff0000"})) });

    assert!(matches!(applied, Applied::Modified { .. }));
    let Some(obj) = fx.surface.find_object("r1") else {
        panic!("r1 missing");
    };
    assert_eq!(obj.bounds().left, 40.0);
    assert_eq!(obj.style.fill, "#ff0000");
    assert!(fx.surface.drain_events().is_empty());
}

#[test]
fn modify_of_vanished_id_is_silent_noop() {
    let mut fx = Fixture::new();
    let applied = fx.apply(Operation::Modify { id: "ghost".into(), props: props(json!({"left": 1})) });
    assert!(matches!(applied, Applied::Missing { .. }));
    assert!(!applied.changed_scene());
    assert!(fx.surface.scene().is_empty());
}

#[test]
fn selection_update_highlights_known_ids() {
    let mut fx = Fixture::new();
    fx.apply(Operation::Draw { object: rect("a", 0.0) });
    let ids: BTreeSet<String> = ["a", "zzz"].into_iter().map(String::from).collect();
    let applied = fx.apply(Operation::SelectionUpdate { ids });

    assert!(matches!(applied, Applied::Selection));
    assert!(!applied.changed_scene());
    assert_eq!(fx.surface.highlighted().iter().collect::<Vec<_>>(), vec!["a"]);
}

#[test]
fn bulk_state_replaces_scene_and_assigns_missing_ids() {
    let mut fx = Fixture::new();
    fx.apply(Operation::Draw { object: rect("old", 0.0) });

    let snapshot = r#"{"objects":[
        {"type":"rectangle","id":"keep","left":1,"top":2,"width":3,"height":4},
        {"type":"circle","left":0,"top":0,"radius":1}
    ]}"#;
    let applied = fx.apply(Operation::BulkState { purpose: BulkPurpose::Bootstrap, snapshot: snapshot.into() });

    assert!(matches!(applied, Applied::Loaded { purpose: BulkPurpose::Bootstrap }));
    let ids = fx.surface.all_objects();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], "keep");
    assert!(!ids[1].is_empty());
    assert!(fx.surface.find_object("old").is_none());
    assert!(fx.surface.drain_events().is_empty());
}

#[test]
fn bootstrap_is_idempotent() {
    let mut source = Scene::new();
    source.push(rect("r1", 10.0));
    source.push(rect("r2", 70.0));
    let snapshot = source.to_snapshot();

    let mut fx = Fixture::new();
    fx.apply(Operation::BulkState { purpose: BulkPurpose::Bootstrap, snapshot: snapshot.clone() });
    let once = fx.surface.to_snapshot();
    fx.apply(Operation::BulkState { purpose: BulkPurpose::Bootstrap, snapshot });
    assert_eq!(fx.surface.to_snapshot(), once);
    assert_eq!(once, source.to_snapshot());
}

#[test]
fn malformed_snapshot_is_rejected_and_scene_kept() {
    let mut fx = Fixture::new();
    fx.apply(Operation::Draw { object: rect("r1", 10.0) });
    let applied = fx.apply(Operation::BulkState { purpose: BulkPurpose::Clear, snapshot: "[]".into() });
    assert!(matches!(applied, Applied::Rejected(_)));
    assert_eq!(fx.surface.all_objects(), vec!["r1".to_owned()]);
    assert!(!fx.surface.is_suppressed());
}

#[test]
fn handoff_is_ignored_by_participants() {
    let mut fx = Fixture::new();
    let applied = fx.apply(Operation::BulkState {
        purpose: BulkPurpose::Handoff { to: "x".into() },
        snapshot: Scene::new().to_snapshot(),
    });
    assert!(matches!(applied, Applied::Ignored));
}

#[test]
fn local_events_resume_after_apply() {
    let mut fx = Fixture::new();
    fx.apply(Operation::Draw { object: rect("r1", 10.0) });
    fx.surface.add_object(rect("mine", 0.0));
    assert_eq!(fx.surface.drain_events(), vec![ChangeEvent::ObjectAdded { id: Some("mine".into()) }]);
}

#[test]
fn modify_and_selection_ids_are_observed() {
    let mut fx = Fixture::new();
    fx.apply(Operation::Modify { id: "elsewhere".into(), props: props(json!({"left": 1})) });
    fx.apply(Operation::SelectionUpdate { ids: BTreeSet::from(["s1".to_owned(), "s2".to_owned()]) });
    assert!(fx.registry.is_known("elsewhere"));
    assert!(fx.registry.is_known("s1"));
    assert!(fx.registry.is_known("s2"));
}

#[test]
fn clear_forgets_ids_from_before() {
    let mut fx = Fixture::new();
    fx.apply(Operation::Draw { object: rect("r1", 10.0) });
    fx.apply(Operation::BulkState { purpose: BulkPurpose::Clear, snapshot: Scene::new().to_snapshot() });
    assert!(!fx.registry.is_known("r1"));
    assert!(fx.surface.scene().is_empty());
}
