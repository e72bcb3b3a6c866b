//! Local scene applier for remote operations.
//!
//! Every apply runs inside a suppressed-events scope so nothing it does is
//! mistaken for a local edit and broadcast again. Misses are silent: a Modify
//! for a vanished object is a no-op, not an error.

#[cfg(test)]
#[path = "apply_test.rs"]
mod apply_test;

use tracing::{debug, warn};

use crate::codec::{BulkPurpose, Operation};
use crate::doc::{ObjectId, SnapshotError};
use crate::registry::ShapeRegistry;
use crate::selection::RemoteSelections;
use crate::surface::Surface;

/// What an apply did to the local scene.
#[derive(Debug)]
pub enum Applied {
    /// A new object was appended on top.
    Drew { id: ObjectId },
    /// A Draw for an id already present replaced that object in place.
    Redrew { id: ObjectId },
    Modified { id: ObjectId },
    /// Modify for an id that does not exist locally.
    Missing { id: ObjectId },
    /// The peer's selection overlay was replaced.
    Selection,
    /// The scene was replaced from a snapshot.
    Loaded { purpose: BulkPurpose },
    /// The snapshot could not be loaded; the scene is unchanged.
    Rejected(SnapshotError),
    /// The operation is not meant for participants.
    Ignored,
}

impl Applied {
    /// True when the scene content changed and history should record it.
    #[must_use]
    pub fn changed_scene(&self) -> bool {
        matches!(
            self,
            Self::Drew { .. } | Self::Redrew { .. } | Self::Modified { .. } | Self::Loaded { .. }
        )
    }
}

/// Borrowed view over the participant state an apply mutates.
pub struct Applier<'a, S: Surface> {
    pub surface: &'a mut S,
    pub registry: &'a mut ShapeRegistry,
    pub selections: &'a mut RemoteSelections,
}

impl<S: Surface> Applier<'_, S> {
    /// Apply a remote operation from `peer`.
    pub fn apply(&mut self, peer: &str, op: Operation) -> Applied {
        let mut surface = self.surface.suppress_change_events();

        match op {
            Operation::Draw { mut object } => {
                if !object.has_id() {
                    warn!(peer, kind = object.kind().wire_tag(), "draw without id; assigning one");
                }
                let id = self.registry.ensure_id(&mut object);
                let existing = surface.all_objects().iter().position(|o| *o == id);
                match existing.and_then(|index| surface.object_at_mut(index)) {
                    Some(slot) => {
                        *slot = object;
                        Applied::Redrew { id }
                    }
                    None => {
                        surface.add_object(object);
                        Applied::Drew { id }
                    }
                }
            }
            Operation::Modify { id, props } => {
                self.registry.observe(&id);
                if surface.modify_object(&id, &props) {
                    Applied::Modified { id }
                } else {
                    debug!(peer, %id, "modify for unknown object; ignoring");
                    Applied::Missing { id }
                }
            }
            Operation::SelectionUpdate { ids } => {
                for id in &ids {
                    self.registry.observe(id);
                }
                self.selections.set(peer, ids);
                self.selections.prune(surface.scene());
                surface.highlight(&self.selections.union());
                Applied::Selection
            }
            Operation::BulkState { purpose: BulkPurpose::Handoff { .. }, .. } => Applied::Ignored,
            Operation::BulkState { purpose, snapshot } => {
                if let Err(e) = surface.load_snapshot(&snapshot) {
                    warn!(peer, error = %e, "failed to load remote snapshot");
                    return Applied::Rejected(e);
                }
                if matches!(purpose, BulkPurpose::Clear) {
                    self.registry.forget_all();
                }
                let mut index = 0;
                while let Some(obj) = surface.object_at_mut(index) {
                    if !obj.has_id() {
                        warn!(peer, index, "snapshot object without id; assigning one");
                    }
                    self.registry.ensure_id(obj);
                    index += 1;
                }
                self.selections.prune(surface.scene());
                surface.highlight(&self.selections.union());
                Applied::Loaded { purpose }
            }
        }
    }
}
