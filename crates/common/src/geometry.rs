//! Geometric primitives and the 2D affine matrix.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A 2D point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point {
    type Output = Point;
    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// A 2D size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size { width: 0.0, height: 0.0 };

    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// An axis-aligned rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const ZERO: Rect = Rect { x: 0.0, y: 0.0, width: 0.0, height: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    /// Smallest rectangle containing every point. Empty input gives `Rect::ZERO`.
    pub fn from_points(points: &[Point]) -> Rect {
        let Some(first) = points.first() else {
            return Rect::ZERO;
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[inline]
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.right(), self.y),
            Point::new(self.right(), self.bottom()),
            Point::new(self.x, self.bottom()),
        ]
    }

    /// Inclusive on all edges, so zero-width boxes still accept points on their line.
    #[inline]
    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Overlap of two rectangles. Disjoint rectangles give a zero-sized rect
    /// positioned inside `self`, never a negative size.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Rect::new(
            x.min(self.right()),
            y.min(self.bottom()),
            (right - x).max(0.0),
            (bottom - y).max(0.0),
        )
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    #[inline]
    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    #[inline]
    pub fn inflate(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x - dx, self.y - dy, self.width + dx * 2.0, self.height + dy * 2.0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// A 2D affine transform.
///
/// Maps `(x, y)` to `(a*x + c*y + tx, b*x + d*y + ty)`, i.e. the columns of the
/// 3x3 matrix are `(a, b, 0)`, `(c, d, 0)` and `(tx, ty, 1)`.
///
/// The builder methods post-multiply: `m.translate(..).rotate(..)` applies the
/// rotation first and the translation last, which is the order a parent/child
/// chain needs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, tx: 0.0, ty: 0.0 };

    #[inline]
    pub const fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    pub fn from_translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn from_scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `angle` radians (clockwise on a y-down canvas).
    pub fn from_rotation(angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// `self ∘ other`: the result applies `other` first, then `self`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            tx: self.a * other.tx + self.c * other.ty + self.tx,
            ty: self.b * other.tx + self.d * other.ty + self.ty,
        }
    }

    #[must_use]
    pub fn translate(&self, tx: f32, ty: f32) -> Matrix {
        self.multiply(&Matrix::from_translation(tx, ty))
    }

    #[must_use]
    pub fn rotate(&self, angle: f32) -> Matrix {
        self.multiply(&Matrix::from_rotation(angle))
    }

    #[must_use]
    pub fn scale(&self, sx: f32, sy: f32) -> Matrix {
        self.multiply(&Matrix::from_scale(sx, sy))
    }

    #[inline]
    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse transform, or `None` when the matrix is singular.
    pub fn invert(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Matrix {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            tx: (self.c * self.ty - self.d * self.tx) * inv,
            ty: (self.b * self.tx - self.a * self.ty) * inv,
        })
    }

    #[inline]
    pub fn transform_point(&self, point: Point) -> Point {
        Point::new(
            self.a * point.x + self.c * point.y + self.tx,
            self.b * point.x + self.d * point.y + self.ty,
        )
    }

    /// Axis-aligned bounds of the transformed rectangle.
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = rect.corners().map(|p| self.transform_point(p));
        Rect::from_points(&corners)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Column-major 3x3 layout for `uniformMatrix3fv`.
    pub fn to_mat3(&self) -> [f32; 9] {
        [self.a, self.b, 0.0, self.c, self.d, 0.0, self.tx, self.ty, 1.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point, b: Point) {
        assert!((a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3, "{a:?} != {b:?}");
    }

    #[test]
    fn test_invert_round_trips_points() {
        let matrices = [
            Matrix::IDENTITY.translate(10.0, -4.0).rotate(0.7).scale(2.0, 0.5),
            Matrix::from_scale(-3.0, 1.5).translate(7.0, 7.0),
            Matrix::new(1.0, 0.3, -0.2, 0.8, 5.0, 9.0),
        ];
        let points = [Point::new(0.0, 0.0), Point::new(12.5, -3.0), Point::new(-100.0, 42.0)];

        for m in &matrices {
            let inv = m.invert().unwrap();
            for p in points {
                assert_close(inv.transform_point(m.transform_point(p)), p);
                assert_close(m.multiply(&inv).transform_point(p), p);
            }
        }
    }

    #[test]
    fn test_zero_scale_is_singular() {
        assert!(Matrix::IDENTITY.scale(0.0, 0.0).invert().is_none());
        assert!(Matrix::IDENTITY.scale(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn test_multiply_order() {
        let t = Matrix::from_translation(10.0, 0.0);
        let s = Matrix::from_scale(2.0, 2.0);
        let p = Point::new(1.0, 1.0);

        // scale first, then translate
        assert_close(t.multiply(&s).transform_point(p), Point::new(12.0, 2.0));
        // translate first, then scale
        assert_close(s.multiply(&t).transform_point(p), Point::new(22.0, 2.0));
    }

    #[test]
    fn test_multiply_is_associative() {
        let a = Matrix::from_rotation(0.4).translate(3.0, 1.0);
        let b = Matrix::from_scale(2.0, 3.0);
        let c = Matrix::from_translation(-5.0, 8.0).rotate(1.1);
        let p = Point::new(4.0, -2.0);

        let left = a.multiply(&b).multiply(&c);
        let right = a.multiply(&b.multiply(&c));
        assert_close(left.transform_point(p), right.transform_point(p));
    }

    #[test]
    fn test_transform_rect_rotated_is_axis_aligned() {
        let m = Matrix::from_rotation(std::f32::consts::FRAC_PI_2);
        let r = m.transform_rect(&Rect::new(0.0, 0.0, 10.0, 20.0));
        assert!((r.x + 20.0).abs() < 1e-4);
        assert!((r.width - 20.0).abs() < 1e-4);
        assert!((r.height - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_intersect_never_negative() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 5.0, 5.0);
        let i = a.intersect(&b);
        assert_eq!(i.width, 0.0);
        assert_eq!(i.height, 0.0);

        let clamp = a.intersect(&Rect::new(-50.0, -50.0, 500.0, 500.0));
        assert_eq!(clamp, a);
    }

    #[test]
    fn test_mat3_layout() {
        let m = Matrix::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(m.to_mat3(), [1.0, 2.0, 0.0, 3.0, 4.0, 0.0, 5.0, 6.0, 1.0]);
    }
}
