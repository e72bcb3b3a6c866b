//! Drawing-surface capability interface.
//!
//! The sync core never renders. It drives whatever surface the host provides
//! through [`Surface`]: create and attach objects, look them up, serialize
//! them, replace the whole scene, and mute change notifications while remote
//! input is being applied. [`MemorySurface`] is the headless implementation
//! used by the CLI and by tests.
//!
//! Surfaces report local edits as queued [`ChangeEvent`]s that the session
//! drains. Events raised while a [`Suppressed`] guard is alive are discarded,
//! which is what keeps remote applies from being re-broadcast.

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;

use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};

use crate::doc::{Geometry, ObjectId, Props, Scene, SceneObject, SnapshotError, Style};
use crate::props;

/// A change made to the surface outside a suppressed scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// An object was attached on top. `id` is `None` when it had no id yet.
    ObjectAdded { id: Option<ObjectId> },
    ObjectModified { id: ObjectId },
    ObjectRemoved { id: ObjectId },
    /// Every object was removed, or the scene was replaced wholesale.
    Cleared,
}

pub trait Surface {
    /// Build a detached primitive. It joins the scene on [`Surface::add_object`].
    fn create_primitive(&self, geometry: Geometry, style: Style) -> SceneObject {
        SceneObject::new(geometry, style)
    }

    /// Attach an object on top of the draw order.
    fn add_object(&mut self, obj: SceneObject);

    fn remove_object(&mut self, id: &str) -> Option<SceneObject>;

    /// Direct access by draw-order index. Mutations through this reference
    /// raise no events.
    fn object_at_mut(&mut self, index: usize) -> Option<&mut SceneObject>;

    fn find_object(&self, id: &str) -> Option<&SceneObject>;

    /// Ids in draw order.
    fn all_objects(&self) -> Vec<ObjectId> {
        self.scene().objects().iter().map(|o| o.id.clone()).collect()
    }

    /// Apply a sparse property update. Returns whether the object exists.
    fn modify_object(&mut self, id: &str, props: &Props) -> bool;

    fn clear(&mut self);

    fn scene(&self) -> &Scene;

    /// Swap in a whole new scene.
    fn replace_scene(&mut self, scene: Scene);

    /// Show the given ids as selected by a remote peer.
    fn highlight(&mut self, ids: &BTreeSet<ObjectId>);

    /// Serialize one object's wire props plus the named envelope fields.
    fn serialize_object(&self, id: &str, extra: &[&str]) -> Option<Props> {
        self.find_object(id).map(|o| props::to_props(o, extra))
    }

    fn to_snapshot(&self) -> String {
        self.scene().to_snapshot()
    }

    /// Replace the scene from snapshot text. Returns once the scene is loaded.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the text does not parse; the scene is left
    /// untouched.
    fn load_snapshot(&mut self, snapshot: &str) -> Result<(), SnapshotError> {
        let scene = Scene::from_snapshot(snapshot)?;
        self.replace_scene(scene);
        Ok(())
    }

    /// Take every queued change event.
    fn drain_events(&mut self) -> Vec<ChangeEvent>;

    fn begin_suppress(&mut self);

    fn end_suppress(&mut self);

    /// Mute change events until the returned guard drops.
    fn suppress_change_events(&mut self) -> Suppressed<'_, Self>
    where
        Self: Sized,
    {
        self.begin_suppress();
        Suppressed { surface: self }
    }
}

/// Scope guard returned by [`Surface::suppress_change_events`]. Events are
/// restored when it drops, on every exit path.
pub struct Suppressed<'a, S: Surface> {
    surface: &'a mut S,
}

impl<S: Surface> Deref for Suppressed<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.surface
    }
}

impl<S: Surface> DerefMut for Suppressed<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.surface
    }
}

impl<S: Surface> Drop for Suppressed<'_, S> {
    fn drop(&mut self) {
        self.surface.end_suppress();
    }
}

// =============================================================================
// MEMORY SURFACE
// =============================================================================

/// Headless surface over a [`Scene`].
#[derive(Debug, Default)]
pub struct MemorySurface {
    scene: Scene,
    events: Vec<ChangeEvent>,
    suppress_depth: u32,
    highlighted: BTreeSet<ObjectId>,
}

impl MemorySurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_scene(scene: Scene) -> Self {
        Self { scene, ..Self::default() }
    }

    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.suppress_depth > 0
    }

    /// Ids currently highlighted for remote selections.
    #[must_use]
    pub fn highlighted(&self) -> &BTreeSet<ObjectId> {
        &self.highlighted
    }

    fn emit(&mut self, event: ChangeEvent) {
        if self.suppress_depth == 0 {
            self.events.push(event);
        }
    }
}

impl Surface for MemorySurface {
    fn add_object(&mut self, obj: SceneObject) {
        let id = obj.has_id().then(|| obj.id.clone());
        self.scene.push(obj);
        self.emit(ChangeEvent::ObjectAdded { id });
    }

    fn remove_object(&mut self, id: &str) -> Option<SceneObject> {
        let removed = self.scene.remove(id)?;
        self.highlighted.remove(id);
        self.emit(ChangeEvent::ObjectRemoved { id: id.to_owned() });
        Some(removed)
    }

    fn object_at_mut(&mut self, index: usize) -> Option<&mut SceneObject> {
        self.scene.object_at_mut(index)
    }

    fn find_object(&self, id: &str) -> Option<&SceneObject> {
        self.scene.get(id)
    }

    fn modify_object(&mut self, id: &str, p: &Props) -> bool {
        let Some(obj) = self.scene.get_mut(id) else {
            return false;
        };
        if props::apply_props(obj, p) {
            self.emit(ChangeEvent::ObjectModified { id: id.to_owned() });
        }
        true
    }

    fn clear(&mut self) {
        self.scene.clear();
        self.highlighted.clear();
        self.emit(ChangeEvent::Cleared);
    }

    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn replace_scene(&mut self, scene: Scene) {
        self.scene = scene;
        let scene = &self.scene;
        self.highlighted.retain(|id| scene.get(id).is_some());
        self.emit(ChangeEvent::Cleared);
    }

    fn highlight(&mut self, ids: &BTreeSet<ObjectId>) {
        let scene = &self.scene;
        self.highlighted = ids.iter().filter(|id| scene.get(id).is_some()).cloned().collect();
    }

    fn drain_events(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.events)
    }

    fn begin_suppress(&mut self) {
        self.suppress_depth += 1;
    }

    fn end_suppress(&mut self) {
        self.suppress_depth = self.suppress_depth.saturating_sub(1);
    }
}
