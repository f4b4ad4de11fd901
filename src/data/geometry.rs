/// 2D geometry kernel: points, rays, intersections, and the operator-marked
/// calibration square / channel anchors built on top of them.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("rays do not intersect ahead of both origins ({context})")]
    NoIntersection { context: &'static str },
    #[error("degenerate region: {width:.2} x {height:.2} px")]
    Degenerate { width: f64, height: f64 },
}

/// 2D point / vector in image pixel space (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const ZERO: Point2D = Point2D { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn scale(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s)
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn magnitude(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction; the zero vector maps to itself.
    pub fn normalize(self) -> Self {
        let mag = self.magnitude();
        if mag == 0.0 {
            Self::ZERO
        } else {
            self.scale(1.0 / mag)
        }
    }

    pub fn distance(self, other: Self) -> f64 {
        (self - other).magnitude()
    }

    /// Direction angle of `self - other`, `atan2(dy, dx)`.
    pub fn angle(self, other: Self) -> f64 {
        let d = self - other;
        d.y.atan2(d.x)
    }

    /// `(x, y) -> (-y, x)`
    pub fn rotate90(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// `(x, y) -> (y, -x)`
    pub fn rotate270(self) -> Self {
        Self::new(self.y, -self.x)
    }

    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs())
    }

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn midpoint(self, other: Self) -> Self {
        (self + other).scale(0.5)
    }
}

impl Add for Point2D {
    type Output = Point2D;
    fn add(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2D {
    type Output = Point2D;
    fn sub(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point2D {
    type Output = Point2D;
    fn mul(self, rhs: f64) -> Point2D {
        self.scale(rhs)
    }
}

impl Neg for Point2D {
    type Output = Point2D;
    fn neg(self) -> Point2D {
        Point2D::new(-self.x, -self.y)
    }
}

impl std::fmt::Display for Point2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Parametric ray `origin + t * direction`, `t >= 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub origin: Point2D,
    pub direction: Point2D,
}

impl Line {
    pub fn new(origin: Point2D, direction: Point2D) -> Self {
        Self { origin, direction }
    }
}

/// Intersect two rays. Returns `None` for parallel rays or when the crossing
/// lies behind either origin.
pub fn find_intersection(line1: &Line, line2: &Line) -> Option<Point2D> {
    let (p1, d1) = (line1.origin, line1.direction);
    let (p2, d2) = (line2.origin, line2.direction);

    let denom = d1.x * d2.y - d1.y * d2.x;
    if denom == 0.0 {
        return None;
    }

    let delta = p2 - p1;
    let t = (delta.x * d2.y - delta.y * d2.x) / denom;
    let s = (delta.x * d1.y - delta.y * d1.x) / denom;

    if t < 0.0 || s < 0.0 {
        return None;
    }

    Some(p1 + d1 * t)
}

/// The printed 10 mm calibration square, built from an operator-drawn diagonal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSquare {
    /// Corners ordered `[p1, top_right, p2, bottom_left]`
    pub corners: [Point2D; 4],
}

impl CalibrationSquare {
    /// Diagonal `p1` (top-left) to `p2` (bottom-right).
    pub fn from_diagonal(p1: Point2D, p2: Point2D) -> Self {
        let center = p1.midpoint(p2);
        let half = (p2 - p1).scale(0.5);
        Self {
            corners: [p1, center + half.rotate270(), p2, center + half.rotate90()],
        }
    }

    /// Side length in source pixels
    pub fn side(&self) -> f64 {
        self.corners[0].distance(self.corners[1])
    }

    /// Unit vector along the square's top edge
    pub fn edge_direction(&self) -> Point2D {
        (self.corners[1] - self.corners[0]).normalize()
    }

    /// Unit vector along the square's left edge, pointing down the strip
    pub fn normal_direction(&self) -> Point2D {
        self.edge_direction().rotate90()
    }
}

/// Two opposite corners of the lead grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelAnchors {
    pub p1: Point2D,
    pub p2: Point2D,
}

impl ChannelAnchors {
    /// Expand the anchors into a crop quadrilateral `[p1, top_right, p2,
    /// bottom_left]` whose edges follow the calibration square's axes.
    pub fn crop_quad(&self, square: &CalibrationSquare) -> Result<[Point2D; 4], GeometryError> {
        let u = square.edge_direction();
        let n = square.normal_direction();
        if u.is_zero() {
            return Err(GeometryError::Degenerate {
                width: 0.0,
                height: 0.0,
            });
        }

        let top_right = find_intersection(&Line::new(self.p1, u), &Line::new(self.p2, -n))
            .ok_or(GeometryError::NoIntersection {
                context: "top-right corner",
            })?;
        let bottom_left = find_intersection(&Line::new(self.p1, n), &Line::new(self.p2, -u))
            .ok_or(GeometryError::NoIntersection {
                context: "bottom-left corner",
            })?;

        Ok([self.p1, top_right, self.p2, bottom_left])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point2D, b: Point2D) -> bool {
        a.distance(b) < 1e-9
    }

    #[test]
    fn test_vector_ops_do_not_mutate() {
        let a = Point2D::new(3.0, 4.0);
        let b = Point2D::new(1.0, -2.0);
        assert_eq!(a + b, Point2D::new(4.0, 2.0));
        assert_eq!(a - b, Point2D::new(2.0, 6.0));
        assert_eq!(a.scale(2.0), Point2D::new(6.0, 8.0));
        assert_eq!(a.dot(b), -5.0);
        assert_eq!(a.magnitude(), 5.0);
        assert_eq!(a, Point2D::new(3.0, 4.0));
    }

    #[test]
    fn test_normalize_zero_is_zero() {
        assert_eq!(Point2D::ZERO.normalize(), Point2D::ZERO);
        let n = Point2D::new(0.0, 7.0).normalize();
        assert!(close(n, Point2D::new(0.0, 1.0)));
    }

    #[test]
    fn test_rotations() {
        let v = Point2D::new(2.0, 1.0);
        assert_eq!(v.rotate90(), Point2D::new(-1.0, 2.0));
        assert_eq!(v.rotate270(), Point2D::new(1.0, -2.0));
        assert_eq!(v.rotate90().rotate270(), v);
    }

    #[test]
    fn test_angle_is_atan2_of_difference() {
        let a = Point2D::new(1.0, 1.0);
        assert!((a.angle(Point2D::ZERO) - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
        assert!((Point2D::new(5.0, 0.0).angle(Point2D::new(1.0, 0.0))).abs() < 1e-12);
    }

    #[test]
    fn test_intersection_forward_rays() {
        let l1 = Line::new(Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0));
        let l2 = Line::new(Point2D::new(10.0, 0.0), Point2D::new(-1.0, 1.0));
        let p = find_intersection(&l1, &l2).unwrap();
        assert!(close(p, Point2D::new(5.0, 5.0)));
    }

    #[test]
    fn test_intersection_parallel_is_none() {
        let l1 = Line::new(Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0));
        let l2 = Line::new(Point2D::new(0.0, 5.0), Point2D::new(2.0, 0.0));
        assert!(find_intersection(&l1, &l2).is_none());
    }

    #[test]
    fn test_intersection_behind_origin_is_none() {
        let l1 = Line::new(Point2D::new(0.0, 0.0), Point2D::new(-1.0, -1.0));
        let l2 = Line::new(Point2D::new(10.0, 0.0), Point2D::new(-1.0, 1.0));
        assert!(find_intersection(&l1, &l2).is_none());
    }

    #[test]
    fn test_square_from_diagonal_axis_aligned() {
        let sq = CalibrationSquare::from_diagonal(Point2D::new(0.0, 0.0), Point2D::new(10.0, 10.0));
        assert!(close(sq.corners[1], Point2D::new(10.0, 0.0)));
        assert!(close(sq.corners[3], Point2D::new(0.0, 10.0)));
        assert!((sq.side() - 10.0).abs() < 1e-9);
        assert!(close(sq.edge_direction(), Point2D::new(1.0, 0.0)));
        assert!(close(sq.normal_direction(), Point2D::new(0.0, 1.0)));
    }

    #[test]
    fn test_square_sides_equal_when_rotated() {
        let sq = CalibrationSquare::from_diagonal(Point2D::new(3.0, 1.0), Point2D::new(11.0, 17.0));
        let [a, b, c, d] = sq.corners;
        let sides = [a.distance(b), b.distance(c), c.distance(d), d.distance(a)];
        for s in sides {
            assert!((s - sides[0]).abs() < 1e-9);
        }
        assert!((b - a).dot(c - b).abs() < 1e-9);
    }

    #[test]
    fn test_crop_quad_follows_square_axes() {
        let sq = CalibrationSquare::from_diagonal(Point2D::new(0.0, 0.0), Point2D::new(10.0, 10.0));
        let anchors = ChannelAnchors {
            p1: Point2D::new(5.0, 5.0),
            p2: Point2D::new(105.0, 65.0),
        };
        let quad = anchors.crop_quad(&sq).unwrap();
        assert!(close(quad[1], Point2D::new(105.0, 5.0)));
        assert!(close(quad[3], Point2D::new(5.0, 65.0)));
    }

    #[test]
    fn test_crop_quad_rejects_inverted_anchors() {
        let sq = CalibrationSquare::from_diagonal(Point2D::new(0.0, 0.0), Point2D::new(10.0, 10.0));
        let anchors = ChannelAnchors {
            p1: Point2D::new(100.0, 60.0),
            p2: Point2D::new(5.0, 5.0),
        };
        assert!(matches!(
            anchors.crop_quad(&sq),
            Err(GeometryError::NoIntersection { .. })
        ));
    }
}
