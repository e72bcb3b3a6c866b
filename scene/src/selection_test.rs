use super::*;
use crate::doc::{Geometry, SceneObject, Style};

fn ids(list: &[&str]) -> BTreeSet<ObjectId> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn latest_update_replaces_peer_entry() {
    let mut sel = RemoteSelections::new();
    sel.set("p1", ids(&["a", "b"]));
    sel.set("p1", ids(&["c"]));
    assert_eq!(sel.union(), ids(&["c"]));
}

#[test]
fn union_spans_peers() {
    let mut sel = RemoteSelections::new();
    sel.set("p1", ids(&["a", "b"]));
    sel.set("p2", ids(&["b", "c"]));
    assert_eq!(sel.union(), ids(&["a", "b", "c"]));
}

#[test]
fn empty_update_and_departure_remove_peer() {
    let mut sel = RemoteSelections::new();
    sel.set("p1", ids(&["a"]));
    sel.set("p1", BTreeSet::new());
    assert!(!sel.remove_peer("p1"));

    sel.set("p2", ids(&["a"]));
    assert!(sel.remove_peer("p2"));
    assert!(!sel.remove_peer("p2"));
    assert!(sel.union().is_empty());
}

#[test]
fn prune_drops_vanished_ids() {
    let mut scene = Scene::new();
    scene.push(
        SceneObject::new(Geometry::Circle { left: 0.0, top: 0.0, radius: 1.0 }, Style::default()).with_id("a"),
    );
    let mut sel = RemoteSelections::new();
    sel.set("p1", ids(&["a", "gone"]));
    sel.set("p2", ids(&["gone"]));
    sel.prune(&scene);
    assert_eq!(sel.union(), ids(&["a"]));
    assert!(!sel.remove_peer("p2"));
}
