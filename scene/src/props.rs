//! Flat wire properties for scene objects.
//!
//! Objects travel as a flat map of named fields (`left`, `top`, `width`,
//! `stroke`, `scaleX`, ...). This module converts between that map and
//! [`SceneObject`], and applies sparse property updates in place.

#[cfg(test)]
#[path = "props_test.rs"]
mod props_test;

use serde_json::Value;

use crate::codec::DecodeError;
use crate::consts::{DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE};
use crate::doc::{Geometry, Point, Props, SceneObject, ShapeKind, Style, Transform};

pub const ID: &str = "id";
pub const TYPE: &str = "type";
pub const LEFT: &str = "left";
pub const TOP: &str = "top";
pub const WIDTH: &str = "width";
pub const HEIGHT: &str = "height";
pub const RADIUS: &str = "radius";
pub const X1: &str = "x1";
pub const Y1: &str = "y1";
pub const X2: &str = "x2";
pub const Y2: &str = "y2";
pub const PATH: &str = "path";
pub const TEXT: &str = "text";
pub const FONT_SIZE: &str = "fontSize";
pub const FONT_FAMILY: &str = "fontFamily";
pub const STROKE: &str = "stroke";
pub const STROKE_WIDTH: &str = "strokeWidth";
pub const FILL: &str = "fill";
pub const SCALE_X: &str = "scaleX";
pub const SCALE_Y: &str = "scaleY";
pub const ANGLE: &str = "angle";

// =============================================================================
// OBJECT -> PROPS
// =============================================================================

/// Serialize an object's geometry, style and transform. `extra` names
/// envelope fields to include as well; [`ID`] and [`TYPE`] are recognized.
#[must_use]
pub fn to_props(obj: &SceneObject, extra: &[&str]) -> Props {
    let mut p = Props::new();
    if extra.contains(&ID) {
        p.insert(ID.into(), Value::String(obj.id.clone()));
    }
    if extra.contains(&TYPE) {
        p.insert(TYPE.into(), Value::String(obj.kind().wire_tag().to_owned()));
    }

    match &obj.geometry {
        Geometry::Rectangle { left, top, width, height } => {
            put(&mut p, LEFT, *left);
            put(&mut p, TOP, *top);
            put(&mut p, WIDTH, *width);
            put(&mut p, HEIGHT, *height);
        }
        Geometry::Circle { left, top, radius } => {
            put(&mut p, LEFT, *left);
            put(&mut p, TOP, *top);
            put(&mut p, RADIUS, *radius);
        }
        Geometry::Line { x1, y1, x2, y2 } => {
            put(&mut p, X1, *x1);
            put(&mut p, Y1, *y1);
            put(&mut p, X2, *x2);
            put(&mut p, Y2, *y2);
        }
        Geometry::FreehandPath { points } => {
            let path = points.iter().map(|pt| Value::Array(vec![num(pt.x), num(pt.y)])).collect();
            p.insert(PATH.into(), Value::Array(path));
        }
        Geometry::Text { text, left, top, font_size, font_family } => {
            p.insert(TEXT.into(), Value::String(text.clone()));
            put(&mut p, LEFT, *left);
            put(&mut p, TOP, *top);
            put(&mut p, FONT_SIZE, *font_size);
            p.insert(FONT_FAMILY.into(), Value::String(font_family.clone()));
        }
    }

    p.insert(STROKE.into(), Value::String(obj.style.stroke.clone()));
    put(&mut p, STROKE_WIDTH, obj.style.stroke_width);
    p.insert(FILL.into(), Value::String(obj.style.fill.clone()));
    put(&mut p, SCALE_X, obj.transform.scale_x);
    put(&mut p, SCALE_Y, obj.transform.scale_y);
    put(&mut p, ANGLE, obj.transform.angle);
    p
}

fn num(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

fn put(p: &mut Props, key: &str, v: f64) {
    p.insert(key.into(), num(v));
}

// =============================================================================
// PROPS -> OBJECT
// =============================================================================

/// Build an object of `kind` from a full property map. Geometry fields are
/// required; style and transform fall back to defaults. The `id` field is
/// copied if present.
///
/// # Errors
///
/// Returns [`DecodeError::MissingField`] or [`DecodeError::WrongType`] when a
/// geometry field is absent or not of the expected type.
pub fn from_props(kind: ShapeKind, p: &Props) -> Result<SceneObject, DecodeError> {
    let geometry = match kind {
        ShapeKind::Rectangle => Geometry::Rectangle {
            left: required_f64(p, LEFT)?,
            top: required_f64(p, TOP)?,
            width: required_f64(p, WIDTH)?,
            height: required_f64(p, HEIGHT)?,
        },
        ShapeKind::Circle => Geometry::Circle {
            left: required_f64(p, LEFT)?,
            top: required_f64(p, TOP)?,
            radius: required_f64(p, RADIUS)?,
        },
        ShapeKind::Line => Geometry::Line {
            x1: required_f64(p, X1)?,
            y1: required_f64(p, Y1)?,
            x2: required_f64(p, X2)?,
            y2: required_f64(p, Y2)?,
        },
        ShapeKind::FreehandPath => {
            let raw = p.get(PATH).ok_or(DecodeError::MissingField(PATH))?;
            Geometry::FreehandPath { points: parse_path(raw)? }
        }
        ShapeKind::Text => Geometry::Text {
            text: required_str(p, TEXT)?,
            left: required_f64(p, LEFT)?,
            top: required_f64(p, TOP)?,
            font_size: optional_f64(p, FONT_SIZE)?.unwrap_or(DEFAULT_FONT_SIZE),
            font_family: optional_str(p, FONT_FAMILY)?.unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_owned()),
        },
    };

    let defaults = Style::default();
    let style = Style {
        stroke: optional_str(p, STROKE)?.unwrap_or(defaults.stroke),
        stroke_width: optional_f64(p, STROKE_WIDTH)?.unwrap_or(defaults.stroke_width),
        fill: optional_str(p, FILL)?.unwrap_or(defaults.fill),
    };
    let identity = Transform::default();
    let transform = Transform {
        scale_x: optional_f64(p, SCALE_X)?.unwrap_or(identity.scale_x),
        scale_y: optional_f64(p, SCALE_Y)?.unwrap_or(identity.scale_y),
        angle: optional_f64(p, ANGLE)?.unwrap_or(identity.angle),
    };

    let mut obj = SceneObject::new(geometry, style);
    obj.transform = transform;
    obj.recompute_bounds();
    if let Some(id) = optional_str(p, ID)? {
        obj.id = id;
    }
    Ok(obj)
}

fn optional_f64(p: &Props, key: &'static str) -> Result<Option<f64>, DecodeError> {
    match p.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or(DecodeError::WrongType(key)),
    }
}

fn required_f64(p: &Props, key: &'static str) -> Result<f64, DecodeError> {
    optional_f64(p, key)?.ok_or(DecodeError::MissingField(key))
}

fn optional_str(p: &Props, key: &'static str) -> Result<Option<String>, DecodeError> {
    match p.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(DecodeError::WrongType(key)),
    }
}

fn required_str(p: &Props, key: &'static str) -> Result<String, DecodeError> {
    optional_str(p, key)?.ok_or(DecodeError::MissingField(key))
}

/// Parse a point list. Each entry may be `[x, y]`, `{"x": .., "y": ..}`, or a
/// path command array such as `["M", x, y]` / `["Q", cx, cy, x, y]`, in which
/// case the last two numbers are the point.
///
/// # Errors
///
/// Returns [`DecodeError::WrongType`] for anything else.
pub fn parse_path(raw: &Value) -> Result<Vec<Point>, DecodeError> {
    let Value::Array(entries) = raw else {
        return Err(DecodeError::WrongType(PATH));
    };
    entries.iter().map(parse_point).collect()
}

fn parse_point(entry: &Value) -> Result<Point, DecodeError> {
    match entry {
        Value::Array(items) => {
            let nums: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
            match nums.as_slice() {
                [.., x, y] => Ok(Point::new(*x, *y)),
                _ => Err(DecodeError::WrongType(PATH)),
            }
        }
        Value::Object(fields) => {
            let x = fields.get("x").and_then(Value::as_f64);
            let y = fields.get("y").and_then(Value::as_f64);
            match (x, y) {
                (Some(x), Some(y)) => Ok(Point::new(x, y)),
                _ => Err(DecodeError::WrongType(PATH)),
            }
        }
        _ => Err(DecodeError::WrongType(PATH)),
    }
}

// =============================================================================
// SPARSE APPLY
// =============================================================================

/// Apply the fields present in `p` to `obj`. Fields that do not belong to the
/// object's kind, fields of the wrong type, and `id` are ignored. Bounds are
/// recomputed. Returns whether any field changed.
pub fn apply_props(obj: &mut SceneObject, p: &Props) -> bool {
    let before = obj.clone();

    match &mut obj.geometry {
        Geometry::Rectangle { left, top, width, height } => {
            set_f64(p, LEFT, left);
            set_f64(p, TOP, top);
            set_f64(p, WIDTH, width);
            set_f64(p, HEIGHT, height);
        }
        Geometry::Circle { left, top, radius } => {
            set_f64(p, LEFT, left);
            set_f64(p, TOP, top);
            set_f64(p, RADIUS, radius);
        }
        Geometry::Line { x1, y1, x2, y2 } => {
            set_f64(p, X1, x1);
            set_f64(p, Y1, y1);
            set_f64(p, X2, x2);
            set_f64(p, Y2, y2);
        }
        Geometry::FreehandPath { points } => {
            if let Some(Ok(parsed)) = p.get(PATH).map(parse_path) {
                *points = parsed;
            }
        }
        Geometry::Text { text, left, top, font_size, font_family } => {
            set_str(p, TEXT, text);
            set_f64(p, LEFT, left);
            set_f64(p, TOP, top);
            set_f64(p, FONT_SIZE, font_size);
            set_str(p, FONT_FAMILY, font_family);
        }
    }

    set_str(p, STROKE, &mut obj.style.stroke);
    set_f64(p, STROKE_WIDTH, &mut obj.style.stroke_width);
    set_str(p, FILL, &mut obj.style.fill);
    set_f64(p, SCALE_X, &mut obj.transform.scale_x);
    set_f64(p, SCALE_Y, &mut obj.transform.scale_y);
    set_f64(p, ANGLE, &mut obj.transform.angle);

    obj.recompute_bounds();
    *obj != before
}

fn set_f64(p: &Props, key: &str, slot: &mut f64) {
    if let Some(v) = p.get(key).and_then(Value::as_f64) {
        *slot = v;
    }
}

fn set_str(p: &Props, key: &str, slot: &mut String) {
    if let Some(v) = p.get(key).and_then(Value::as_str) {
        v.clone_into(slot);
    }
}
