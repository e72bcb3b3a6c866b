//! Shared constants for the scene crate.

// ── Echo suppression ────────────────────────────────────────────

/// A remote Modify for an object edited locally less than this many
/// milliseconds ago is treated as an echo and dropped.
pub const ECHO_WINDOW_MS: i64 = 1000;

// ── History ─────────────────────────────────────────────────────

/// Default maximum number of snapshots kept by a participant's history log.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

// ── Scene defaults ──────────────────────────────────────────────

/// Background color of a fresh or cleared scene.
pub const DEFAULT_BACKGROUND: &str = "#ffffff";

/// Stroke color used when a draw carries no `stroke`.
pub const DEFAULT_STROKE: &str = "#000000";

/// Fill used when a draw carries no `fill`.
pub const DEFAULT_FILL: &str = "transparent";

/// Stroke width used when a draw carries no `strokeWidth`.
pub const DEFAULT_STROKE_WIDTH: f64 = 1.0;

/// Font family for text objects that carry none.
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Font size for text objects that carry none.
pub const DEFAULT_FONT_SIZE: f64 = 20.0;

/// Snapshot format version written by [`crate::doc::Scene::to_snapshot`].
pub const SNAPSHOT_VERSION: i64 = 1;

// ── Text metrics ────────────────────────────────────────────────

/// Approximate glyph advance as a fraction of the font size.
pub const TEXT_ADVANCE_RATIO: f64 = 0.6;

/// Line height as a multiple of the font size.
pub const TEXT_LINE_HEIGHT: f64 = 1.16;
