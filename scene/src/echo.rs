//! Echo suppression for remote operations.
//!
//! Two filters run on every inbound operation:
//!
//! - [`OriginFilter`] drops frames stamped with this participant's own origin
//!   id, and frames whose per-origin sequence number does not advance.
//! - [`EchoGuard`] drops a remote Modify for an object this participant edited
//!   locally less than the configured window ago. The window also swallows a
//!   genuine concurrent edit from a peer inside it; that loss is accepted.

#[cfg(test)]
#[path = "echo_test.rs"]
mod echo_test;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::doc::ObjectId;

// =============================================================================
// CLOCK
// =============================================================================

/// Millisecond wall clock.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        frames::now_ms()
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    #[must_use]
    pub fn starting_at(ms: i64) -> Self {
        Self { now: Arc::new(AtomicI64::new(ms)) }
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// =============================================================================
// ECHO GUARD
// =============================================================================

/// Per-object timestamp of the last local modification.
#[derive(Debug)]
pub struct EchoGuard {
    last_local: HashMap<ObjectId, i64>,
    window_ms: i64,
}

impl EchoGuard {
    /// A `window_ms` of zero disables suppression.
    #[must_use]
    pub fn new(window_ms: i64) -> Self {
        Self { last_local: HashMap::new(), window_ms: window_ms.max(0) }
    }

    #[must_use]
    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    /// Note a local modification of `id` at `now`.
    pub fn record(&mut self, id: &str, now: i64) {
        self.prune(now);
        self.last_local.insert(id.to_owned(), now);
    }

    /// True iff `id` was modified locally within `[now - window, now]`.
    #[must_use]
    pub fn should_suppress(&self, id: &str, now: i64) -> bool {
        self.last_local.get(id).is_some_and(|last| now - last < self.window_ms)
    }

    /// Number of ids currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.last_local.len()
    }

    fn prune(&mut self, now: i64) {
        let window = self.window_ms;
        self.last_local.retain(|_, last| now - *last < window);
    }
}

// =============================================================================
// ORIGIN FILTER
// =============================================================================

/// Outcome of [`OriginFilter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginVerdict {
    Accept,
    /// The frame carries this participant's own origin id.
    OwnEcho,
    /// The origin's sequence number did not advance.
    Replay,
}

/// Exact echo filter based on origin id and per-origin sequence.
#[derive(Debug, Default)]
pub struct OriginFilter {
    own: Option<String>,
    last_seq: HashMap<String, u64>,
}

impl OriginFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_own(&mut self, own: impl Into<String>) {
        self.own = Some(own.into());
    }

    #[must_use]
    pub fn own(&self) -> Option<&str> {
        self.own.as_deref()
    }

    /// Classify a frame by its `from` and `seq`. Frames without an origin are
    /// accepted; frames without a sequence skip the replay check.
    pub fn check(&mut self, from: Option<&str>, seq: Option<u64>) -> OriginVerdict {
        let Some(from) = from else {
            return OriginVerdict::Accept;
        };
        if self.own.as_deref() == Some(from) {
            return OriginVerdict::OwnEcho;
        }
        let Some(seq) = seq else {
            return OriginVerdict::Accept;
        };
        match self.last_seq.get(from) {
            Some(last) if seq <= *last => OriginVerdict::Replay,
            _ => {
                self.last_seq.insert(from.to_owned(), seq);
                OriginVerdict::Accept
            }
        }
    }

    /// Forget a departed origin so a reconnect under the same id starts fresh.
    pub fn forget(&mut self, from: &str) {
        self.last_seq.remove(from);
    }
}
