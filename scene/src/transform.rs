//! Group transforms over a multi-object selection.
//!
//! A transform applied to a selection is expressed relative to the group, but
//! receivers only understand per-object scene coordinates. [`flatten`] bakes
//! the group transform into each member and yields one absolute property set
//! per object, ready to go out as individual Modify operations.

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;

use std::collections::BTreeSet;

use crate::doc::{Bounds, Geometry, ObjectId, Point, Props, Scene};
use crate::props;

/// 2D affine matrix. `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Self = Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    #[must_use]
    pub fn translate(dx: f64, dy: f64) -> Self {
        Self { e: dx, f: dy, ..Self::IDENTITY }
    }

    #[must_use]
    pub fn scale(sx: f64, sy: f64) -> Self {
        Self { a: sx, d: sy, ..Self::IDENTITY }
    }

    /// Clockwise rotation in degrees (y axis points down).
    #[must_use]
    pub fn rotate(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self { a: cos, b: sin, c: -sin, d: cos, ..Self::IDENTITY }
    }

    /// `self` followed by `next`.
    #[must_use]
    pub fn then(&self, next: &Matrix) -> Matrix {
        Matrix {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            e: next.a * self.e + next.c * self.f + next.e,
            f: next.b * self.e + next.d * self.f + next.f,
        }
    }

    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        Point::new(self.a * p.x + self.c * p.y + self.e, self.b * p.x + self.d * p.y + self.f)
    }
}

/// Transform of a whole selection, about the center of its union bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupTransform {
    pub dx: f64,
    pub dy: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub angle: f64,
}

impl Default for GroupTransform {
    fn default() -> Self {
        Self { dx: 0.0, dy: 0.0, scale_x: 1.0, scale_y: 1.0, angle: 0.0 }
    }
}

impl GroupTransform {
    #[must_use]
    pub fn moved(dx: f64, dy: f64) -> Self {
        Self { dx, dy, ..Self::default() }
    }

    /// Scene-space matrix for a group centered at `center`.
    #[must_use]
    pub fn matrix_about(&self, center: Point) -> Matrix {
        Matrix::translate(-center.x, -center.y)
            .then(&Matrix::scale(self.scale_x, self.scale_y))
            .then(&Matrix::rotate(self.angle))
            .then(&Matrix::translate(center.x + self.dx, center.y + self.dy))
    }
}

/// Union bounds of the objects in `ids` that exist in `scene`.
#[must_use]
pub fn selection_bounds(scene: &Scene, ids: &BTreeSet<ObjectId>) -> Option<Bounds> {
    ids.iter()
        .filter_map(|id| scene.get(id))
        .map(crate::doc::SceneObject::bounds)
        .reduce(|acc, b| acc.union(&b))
}

/// Bake `t` into every selected object. Returns `(id, props)` with absolute
/// geometry and transform for each object that exists, in selection order.
///
/// Anchored kinds (rectangle, circle, text) move their anchor and accumulate
/// scale and angle. Lines and paths have the transform baked into their points.
#[must_use]
pub fn flatten(scene: &Scene, ids: &BTreeSet<ObjectId>, t: &GroupTransform) -> Vec<(ObjectId, Props)> {
    let Some(bounds) = selection_bounds(scene, ids) else {
        return Vec::new();
    };
    let m = t.matrix_about(bounds.center());

    ids.iter()
        .filter_map(|id| scene.get(id))
        .map(|obj| {
            let mut moved = obj.clone();
            match &mut moved.geometry {
                Geometry::Rectangle { left, top, .. } | Geometry::Circle { left, top, .. } | Geometry::Text { left, top, .. } => {
                    let p = m.apply(Point::new(*left, *top));
                    *left = p.x;
                    *top = p.y;
                    moved.transform.scale_x *= t.scale_x;
                    moved.transform.scale_y *= t.scale_y;
                    moved.transform.angle = normalize_angle(moved.transform.angle + t.angle);
                }
                Geometry::Line { x1, y1, x2, y2 } => {
                    let a = m.apply(Point::new(*x1, *y1));
                    let b = m.apply(Point::new(*x2, *y2));
                    (*x1, *y1, *x2, *y2) = (a.x, a.y, b.x, b.y);
                }
                Geometry::FreehandPath { points } => {
                    for p in points.iter_mut() {
                        *p = m.apply(*p);
                    }
                }
            }
            moved.recompute_bounds();
            (obj.id.clone(), props::to_props(&moved, &[]))
        })
        .collect()
}

fn normalize_angle(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}
