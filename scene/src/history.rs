//! Per-participant history of scene snapshots.
//!
//! There is no shared operation log, so undo cannot mean "remove my own last
//! edit". Undo pops the newest snapshot and the result is pushed to the room
//! as an authoritative full-state replacement; peers load it directly. Any
//! participant can therefore undo any other participant's latest change.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::collections::VecDeque;

use crate::doc::Scene;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("nothing to undo")]
    CannotUndo,
}

impl frames::ErrorCode for HistoryError {
    fn error_code(&self) -> &'static str {
        "E_CANNOT_UNDO"
    }
}

/// Result of a successful [`HistoryLog::undo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoStep {
    /// Snapshot that should now be rendered.
    pub new_current: String,
    /// Snapshot that was popped.
    pub discarded: String,
}

/// Bounded stack of snapshots. The newest entry is the current scene.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<String>,
    limit: usize,
}

impl HistoryLog {
    /// A log holding one entry, the empty scene. `limit` is clamped to at least 2
    /// so an undo is always possible after one edit.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let mut log = Self { entries: VecDeque::new(), limit: limit.max(2) };
        log.entries.push_back(Scene::new().to_snapshot());
        log
    }

    /// Append a snapshot, dropping the oldest entry past the limit.
    pub fn record(&mut self, snapshot: impl Into<String>) {
        self.entries.push_back(snapshot.into());
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    /// Append unless the snapshot equals the current top. Returns whether it
    /// was appended.
    pub fn record_if_changed(&mut self, snapshot: impl Into<String>) -> bool {
        let snapshot = snapshot.into();
        if self.top() == Some(snapshot.as_str()) {
            return false;
        }
        self.record(snapshot);
        true
    }

    /// Pop the newest entry.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::CannotUndo`] when one entry or fewer remain;
    /// the log is left unchanged.
    pub fn undo(&mut self) -> Result<UndoStep, HistoryError> {
        if self.entries.len() <= 1 {
            return Err(HistoryError::CannotUndo);
        }
        let discarded = self.entries.pop_back().ok_or(HistoryError::CannotUndo)?;
        let new_current = self.entries.back().cloned().ok_or(HistoryError::CannotUndo)?;
        Ok(UndoStep { new_current, discarded })
    }

    /// Reset to a single entry, `empty_snapshot`.
    pub fn clear(&mut self, empty_snapshot: impl Into<String>) {
        self.entries.clear();
        self.entries.push_back(empty_snapshot.into());
    }

    /// Pop the top entry if it equals `snapshot` and another entry remains.
    /// Keeps a receiver's log aligned with a peer's undo.
    pub fn pop_if_top(&mut self, snapshot: &str) -> bool {
        if self.entries.len() > 1 && self.top() == Some(snapshot) {
            self.entries.pop_back();
            return true;
        }
        false
    }

    #[must_use]
    pub fn top(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.entries.len() > 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}
