//! Shape identity assignment.
//!
//! Every object that enters a scene carries an id before any message about
//! it is sent. Ids are random UUIDs and never change for the life of the
//! object, across moves, style changes and snapshot reloads.

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;

use std::collections::HashSet;

use uuid::Uuid;

use crate::doc::{ObjectId, SceneObject};

/// Tracks which ids this participant has seen.
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    known: HashSet<ObjectId>,
}

impl ShapeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the object's id, assigning a fresh one if it has none. An
    /// existing id is kept unchanged.
    pub fn ensure_id(&mut self, obj: &mut SceneObject) -> ObjectId {
        if !obj.has_id() {
            obj.id = Uuid::new_v4().to_string();
        }
        self.known.insert(obj.id.clone());
        obj.id.clone()
    }

    /// Record an id received from a peer.
    pub fn observe(&mut self, id: &str) {
        if !self.known.contains(id) {
            self.known.insert(id.to_owned());
        }
    }

    #[must_use]
    pub fn is_known(&self, id: &str) -> bool {
        self.known.contains(id)
    }

    /// Drop every id. The scene was replaced wholesale.
    pub fn forget_all(&mut self) {
        self.known.clear();
    }
}
