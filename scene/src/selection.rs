//! Remote selection overlay.
//!
//! Each peer's latest `selection:update` replaces that peer's entry. The
//! surface highlights the union. Selections never lock objects.

#[cfg(test)]
#[path = "selection_test.rs"]
mod selection_test;

use std::collections::{BTreeSet, HashMap};

use crate::doc::{ObjectId, Scene};

#[derive(Debug, Default)]
pub struct RemoteSelections {
    by_peer: HashMap<String, BTreeSet<ObjectId>>,
}

impl RemoteSelections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `peer`'s selection. An empty set removes the peer.
    pub fn set(&mut self, peer: &str, ids: BTreeSet<ObjectId>) {
        if ids.is_empty() {
            self.by_peer.remove(peer);
        } else {
            self.by_peer.insert(peer.to_owned(), ids);
        }
    }

    /// Drop a departed peer. Returns whether it had a selection.
    pub fn remove_peer(&mut self, peer: &str) -> bool {
        self.by_peer.remove(peer).is_some()
    }

    /// Every id selected by any peer.
    #[must_use]
    pub fn union(&self) -> BTreeSet<ObjectId> {
        self.by_peer.values().flatten().cloned().collect()
    }

    /// Forget ids that no longer exist in `scene`.
    pub fn prune(&mut self, scene: &Scene) {
        for ids in self.by_peer.values_mut() {
            ids.retain(|id| scene.get(id).is_some());
        }
        self.by_peer.retain(|_, ids| !ids.is_empty());
    }

    pub fn clear(&mut self) {
        self.by_peer.clear();
    }
}
