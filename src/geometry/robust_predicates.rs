// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Robust geometric predicates for CSG operations
//! Orientation signs come from Shewchuk's adaptive-exact predicates (`robust` crate)

use nalgebra::{Point3, Vector3};
use robust::{Coord, Coord3D};

/// Compute oriented volume of tetrahedron (a, b, c, d), times six.
///
/// Positive if d is on the side the normal `(b - a) x (c - a)` points to,
/// negative on the other side, exactly zero only if the four points are coplanar.
pub fn oriented_volume(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
) -> f64 {
    // robust::orient3d is positive when d lies below the counter-clockwise plane
    -robust::orient3d(coord3(a), coord3(b), coord3(c), coord3(d))
}

/// Twice the signed area of the 2D triangle (a, b, c), positive when counter-clockwise
pub fn orient_2d(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    robust::orient2d(coord2(a), coord2(b), coord2(c))
}

/// Positive if `d` lies strictly inside the circumcircle of the counter-clockwise triangle (a, b, c)
pub fn in_circle(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64 {
    robust::incircle(coord2(a), coord2(b), coord2(c), coord2(d))
}

fn coord3(p: &Point3<f64>) -> Coord3D<f64> {
    Coord3D {
        x: p.x,
        y: p.y,
        z: p.z,
    }
}

fn coord2(p: [f64; 2]) -> Coord<f64> {
    Coord { x: p[0], y: p[1] }
}

/// Classify point relative to plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneClassification {
    /// Point is on the side the normal points to
    Front,
    /// Point is on the opposite side
    Back,
    /// Point is within tolerance of the plane
    OnPlane,
}

/// Oriented plane through three points.
///
/// Distances are computed from the exact orientation determinant, so their
/// sign stays consistent even for points extremely close to the plane.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub points: [Point3<f64>; 3],
    pub normal: Vector3<f64>,
    scale: f64,
}

impl Plane {
    /// `None` if the points are collinear
    pub fn from_points(a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> Option<Self> {
        let cross = (b - a).cross(&(c - a));
        let scale = cross.norm();
        if !(scale > f64::MIN_POSITIVE) || !scale.is_finite() {
            return None;
        }
        Some(Self {
            points: [a, b, c],
            normal: cross / scale,
            scale,
        })
    }

    /// Plane containing the directed edge `a -> b` and perpendicular to this plane,
    /// with its normal pointing away from the triangle interior
    pub fn edge_plane(&self, a: Point3<f64>, b: Point3<f64>) -> Option<Self> {
        let length = (b - a).norm();
        Plane::from_points(a, b, a + self.normal * length)
    }

    /// Same plane with opposite orientation
    pub fn flipped(&self) -> Self {
        let [a, b, c] = self.points;
        Self {
            points: [a, c, b],
            normal: -self.normal,
            scale: self.scale,
        }
    }

    /// Signed distance from the plane
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        let [a, b, c] = &self.points;
        oriented_volume(a, b, c, point) / self.scale
    }

    /// Classify a point relative to the plane with tolerance `eps`
    pub fn classify(&self, point: &Point3<f64>, eps: f64) -> PlaneClassification {
        let distance = self.signed_distance(point);
        if distance > eps {
            PlaneClassification::Front
        } else if distance < -eps {
            PlaneClassification::Back
        } else {
            PlaneClassification::OnPlane
        }
    }
}

/// Check whether `point` lies in the closed triangle (a, b, c) after projection
/// along `normal`, allowing a margin of `eps`
pub fn point_in_triangle(
    point: &Point3<f64>,
    triangle: &[Point3<f64>; 3],
    normal: &Vector3<f64>,
    eps: f64,
) -> bool {
    for i in 0..3 {
        let a = triangle[i];
        let b = triangle[(i + 1) % 3];
        let edge = b - a;
        let length = edge.norm();
        if length <= f64::MIN_POSITIVE {
            return false;
        }
        // Outward normal of the edge within the triangle plane
        let outward = edge.cross(normal) / length;
        if outward.dot(&(point - a)) > eps {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oriented_volume_sign() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);

        assert!(oriented_volume(&a, &b, &c, &Point3::new(0.0, 0.0, 1.0)) > 0.0);
        assert!(oriented_volume(&a, &b, &c, &Point3::new(0.0, 0.0, -1.0)) < 0.0);
        assert_eq!(oriented_volume(&a, &b, &c, &Point3::new(0.3, 0.3, 0.0)), 0.0);
    }

    #[test]
    fn test_orient_2d() {
        assert!(orient_2d([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]) > 0.0);
        assert!(orient_2d([0.0, 0.0], [0.0, 1.0], [1.0, 0.0]) < 0.0);
        assert_eq!(orient_2d([0.0, 0.0], [1.0, 1.0], [2.0, 2.0]), 0.0);
    }

    #[test]
    fn test_plane_distance() {
        let plane = Plane::from_points(
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(1.0, 0.0, 2.0),
            Point3::new(0.0, 1.0, 2.0),
        )
        .unwrap();
        assert!((plane.signed_distance(&Point3::new(5.0, 5.0, 5.0)) - 3.0).abs() < 1e-12);
        assert_eq!(plane.classify(&Point3::new(9.0, -4.0, 2.0), 1e-9), PlaneClassification::OnPlane);
        assert_eq!(plane.flipped().classify(&Point3::new(0.0, 0.0, 3.0), 1e-9), PlaneClassification::Back);
    }

    #[test]
    fn test_degenerate_plane() {
        let p = Point3::new(1.0, 1.0, 1.0);
        assert!(Plane::from_points(p, p, Point3::new(2.0, 2.0, 2.0)).is_none());
    }

    #[test]
    fn test_edge_plane_points_outward() {
        let plane = Plane::from_points(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        )
        .unwrap();
        let edge = plane
            .edge_plane(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(edge.classify(&Point3::new(0.2, 0.2, 0.0), 1e-9), PlaneClassification::Back);
        assert_eq!(edge.classify(&Point3::new(0.2, -0.2, 0.0), 1e-9), PlaneClassification::Front);
    }

    #[test]
    fn test_point_in_triangle() {
        let tri = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let n = Vector3::z();
        assert!(point_in_triangle(&Point3::new(0.25, 0.25, 0.0), &tri, &n, 1e-9));
        assert!(point_in_triangle(&Point3::new(0.5, 0.0, 0.0), &tri, &n, 1e-9));
        assert!(!point_in_triangle(&Point3::new(0.8, 0.8, 0.0), &tri, &n, 1e-9));
    }
}
