//! Document model: scene objects, their geometry and style, and the ordered
//! scene that owns them.
//!
//! This module defines what is on a participant's canvas (`SceneObject`,
//! `ShapeKind`, `Geometry`), the derived bounding box that is recomputed on
//! every geometry or transform change (`Bounds`), and the `Scene` itself,
//! including its canonical JSON snapshot form.
//!
//! Draw order is insertion order. There is no z-index field; a new object is
//! always appended on top.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::consts::{
    DEFAULT_BACKGROUND, DEFAULT_FILL, DEFAULT_STROKE, DEFAULT_STROKE_WIDTH, SNAPSHOT_VERSION, TEXT_ADVANCE_RATIO,
    TEXT_LINE_HEIGHT,
};
use crate::props;

/// Opaque identifier for a scene object. Never derived from content.
pub type ObjectId = String;

/// Flat wire properties of an object, keyed by field name.
pub type Props = Map<String, Value>;

/// The kind of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Axis-aligned rectangle given by its top-left corner and extent.
    Rectangle,
    /// Circle given by its bounding-box corner and radius.
    Circle,
    /// Straight segment between two endpoints.
    Line,
    /// Freehand stroke as a point sequence.
    #[serde(rename = "pen")]
    FreehandPath,
    /// Text anchored at its top-left corner.
    Text,
}

impl ShapeKind {
    /// Tag written into `shape:draw` messages and snapshots.
    #[must_use]
    pub fn wire_tag(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
            Self::Line => "line",
            Self::FreehandPath => "pen",
            Self::Text => "text",
        }
    }

    /// Parse a wire tag. Accepts the drawing library's native type names
    /// (`rect`, `path`, `textbox`, `i-text`) as aliases.
    #[must_use]
    pub fn from_wire(tag: &str) -> Option<Self> {
        match tag {
            "rectangle" | "rect" => Some(Self::Rectangle),
            "circle" => Some(Self::Circle),
            "line" => Some(Self::Line),
            "pen" | "path" => Some(Self::FreehandPath),
            "text" | "textbox" | "i-text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// A 2D point in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Kind-specific geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Rectangle { left: f64, top: f64, width: f64, height: f64 },
    Circle { left: f64, top: f64, radius: f64 },
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    FreehandPath { points: Vec<Point> },
    Text { text: String, left: f64, top: f64, font_size: f64, font_family: String },
}

impl Geometry {
    #[must_use]
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Rectangle { .. } => ShapeKind::Rectangle,
            Self::Circle { .. } => ShapeKind::Circle,
            Self::Line { .. } => ShapeKind::Line,
            Self::FreehandPath { .. } => ShapeKind::FreehandPath,
            Self::Text { .. } => ShapeKind::Text,
        }
    }

    /// Untransformed box of the geometry. Its top-left corner is the origin
    /// that scale and rotation are applied around.
    #[must_use]
    pub fn local_box(&self) -> Bounds {
        match self {
            Self::Rectangle { left, top, width, height } => Bounds::new(*left, *top, *width, *height),
            Self::Circle { left, top, radius } => Bounds::new(*left, *top, radius * 2.0, radius * 2.0),
            Self::Line { x1, y1, x2, y2 } => Bounds::from_points(&[Point::new(*x1, *y1), Point::new(*x2, *y2)]),
            Self::FreehandPath { points } => Bounds::from_points(points),
            Self::Text { text, left, top, font_size, .. } => {
                let lines = text.lines().count().max(1);
                let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
                #[allow(clippy::cast_precision_loss)]
                let (w, h) = (
                    longest as f64 * font_size * TEXT_ADVANCE_RATIO,
                    lines as f64 * font_size * TEXT_LINE_HEIGHT,
                );
                Bounds::new(*left, *top, w, h)
            }
        }
    }
}

/// Stroke and fill.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub stroke: String,
    pub stroke_width: f64,
    pub fill: String,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            stroke: DEFAULT_STROKE.to_owned(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            fill: DEFAULT_FILL.to_owned(),
        }
    }
}

/// Per-object scale and rotation (degrees, clockwise) around the local-box origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub angle: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self { scale_x: 1.0, scale_y: 1.0, angle: 0.0 }
    }
}

/// Axis-aligned bounding box in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    #[must_use]
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    /// Smallest box containing every point. Empty input yields a zero box at the origin.
    #[must_use]
    pub fn from_points(points: &[Point]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Smallest box containing both.
    #[must_use]
    pub fn union(&self, other: &Bounds) -> Bounds {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        Bounds::new(left, top, self.right().max(other.right()) - left, self.bottom().max(other.bottom()) - top)
    }
}

/// A renderable object with a stable identity.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Empty until the shape registry assigns one.
    pub id: ObjectId,
    pub geometry: Geometry,
    pub style: Style,
    pub transform: Transform,
    bounds: Bounds,
}

impl SceneObject {
    /// Build an object without an id. Bounds are computed immediately.
    #[must_use]
    pub fn new(geometry: Geometry, style: Style) -> Self {
        let mut obj = Self {
            id: ObjectId::new(),
            geometry,
            style,
            transform: Transform::default(),
            bounds: Bounds::default(),
        };
        obj.recompute_bounds();
        obj
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<ObjectId>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }

    #[must_use]
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Derived bounding box, current as of the last geometry or transform change.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Recompute the bounding box from geometry and transform. Must be called
    /// after mutating either through the public fields.
    pub fn recompute_bounds(&mut self) {
        let local = self.geometry.local_box();
        let origin = Point::new(local.left, local.top);
        let Transform { scale_x, scale_y, angle } = self.transform;
        let (sin, cos) = angle.to_radians().sin_cos();
        let corners = [(0.0, 0.0), (local.width, 0.0), (0.0, local.height), (local.width, local.height)].map(|(dx, dy)| {
            let (sx, sy) = (dx * scale_x, dy * scale_y);
            Point::new(origin.x + sx * cos - sy * sin, origin.y + sx * sin + sy * cos)
        });
        self.bounds = Bounds::from_points(&corners);
    }
}

// =============================================================================
// SCENE
// =============================================================================

/// Error returned by [`Scene::from_snapshot`].
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot must be a json object")]
    NotAnObject,
    #[error("snapshot `objects` must be an array")]
    ObjectsNotArray,
}

impl frames::ErrorCode for SnapshotError {
    fn error_code(&self) -> &'static str {
        "E_SNAPSHOT"
    }
}

/// Ordered collection of objects plus a background color.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    background: String,
    objects: Vec<SceneObject>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// An empty scene with the default background.
    #[must_use]
    pub fn new() -> Self {
        Self { background: DEFAULT_BACKGROUND.to_owned(), objects: Vec::new() }
    }

    #[must_use]
    pub fn background(&self) -> &str {
        &self.background
    }

    pub fn set_background(&mut self, background: impl Into<String>) {
        self.background = background.into();
    }

    /// Objects in draw order.
    #[must_use]
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    /// Append an object on top of the draw order.
    pub fn push(&mut self, obj: SceneObject) {
        self.objects.push(obj);
    }

    /// Linear scan by id. Scenes are editor-sized.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn object_at_mut(&mut self, index: usize) -> Option<&mut SceneObject> {
        self.objects.get_mut(index)
    }

    /// Remove by id, keeping the draw order of the rest.
    pub fn remove(&mut self, id: &str) -> Option<SceneObject> {
        let index = self.objects.iter().position(|o| o.id == id)?;
        Some(self.objects.remove(index))
    }

    /// Remove every object and restore the default background.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.background = DEFAULT_BACKGROUND.to_owned();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Canonical JSON snapshot. Keys are sorted, so equal scenes serialize to
    /// identical text.
    #[must_use]
    pub fn to_snapshot(&self) -> String {
        let objects: Vec<Value> = self
            .objects
            .iter()
            .map(|o| Value::Object(props::to_props(o, &[props::ID, props::TYPE])))
            .collect();
        let mut root = Map::new();
        root.insert("version".into(), Value::from(SNAPSHOT_VERSION));
        root.insert("background".into(), Value::String(self.background.clone()));
        root.insert("objects".into(), Value::Array(objects));
        Value::Object(root).to_string()
    }

    /// Parse a snapshot. An empty string is the empty scene. Objects with an
    /// unknown `type` or malformed geometry are skipped with a warning; objects
    /// without an `id` are kept with an empty one for the registry to fill.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the text is not a JSON object with an
    /// `objects` array.
    pub fn from_snapshot(snapshot: &str) -> Result<Self, SnapshotError> {
        let mut scene = Self::new();
        if snapshot.trim().is_empty() {
            return Ok(scene);
        }

        let root: Value = serde_json::from_str(snapshot)?;
        let Some(root) = root.as_object() else {
            return Err(SnapshotError::NotAnObject);
        };
        if let Some(bg) = root.get("background").and_then(Value::as_str) {
            scene.background = bg.to_owned();
        }
        let objects = match root.get("objects") {
            None | Some(Value::Null) => return Ok(scene),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(SnapshotError::ObjectsNotArray),
        };

        for (index, item) in objects.iter().enumerate() {
            let Some(fields) = item.as_object() else {
                warn!(index, "snapshot: skipping non-object entry");
                continue;
            };
            let tag = fields.get(props::TYPE).and_then(Value::as_str).unwrap_or("");
            let Some(kind) = ShapeKind::from_wire(tag) else {
                warn!(index, tag, "snapshot: skipping object of unknown type");
                continue;
            };
            match props::from_props(kind, fields) {
                Ok(obj) => scene.objects.push(obj),
                Err(e) => warn!(index, error = %e, "snapshot: skipping malformed object"),
            }
        }
        Ok(scene)
    }
}
