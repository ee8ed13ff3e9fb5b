// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Conservative triangle-triangle contact test.
//!
//! Used to decide which facets of one operand must be split against a facet
//! of the other. False positives only cost extra splits; a missed contact
//! would leave a fragment straddling the other surface, so every test here
//! leans towards reporting contact.

use super::robust_predicates::Plane;
use super::BoundingBox;
use nalgebra::Point3;

/// How two facets touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    /// Strictly separated
    None,
    /// Planes cross; split by the other facet's plane
    Crossing,
    /// Same plane; split by the other facet's edge planes
    Coplanar,
}

/// Side of `plane` the three points occupy: -1 or 1 when strictly on one side,
/// 0 when mixed, `None` when all within `eps` of the plane
fn side(points: &[Point3<f64>; 3], plane: &Plane, eps: f64) -> Option<i8> {
    let distances: [f64; 3] = std::array::from_fn(|i| plane.signed_distance(&points[i]));
    if distances.iter().all(|d| d.abs() <= eps) {
        return None;
    }
    // A vertex on the plane counts as contact on both sides
    let front = distances.iter().any(|&d| d >= -eps);
    let back = distances.iter().any(|&d| d <= eps);
    Some(match (front, back) {
        (true, false) => 1,
        (false, true) => -1,
        _ => 0,
    })
}

/// Classify the contact between facet `a` and facet `b`
pub fn facet_contact(a: &[Point3<f64>; 3], b: &[Point3<f64>; 3], eps: f64) -> Contact {
    let box_a = BoundingBox::from_points(a).expanded(eps);
    let box_b = BoundingBox::from_points(b);
    if !box_a.intersects(&box_b) {
        return Contact::None;
    }

    let (Some(plane_a), Some(plane_b)) = (
        Plane::from_points(a[0], a[1], a[2]),
        Plane::from_points(b[0], b[1], b[2]),
    ) else {
        return Contact::None;
    };

    match side(a, &plane_b, eps) {
        None => return Contact::Coplanar,
        Some(0) => {}
        Some(_) => return Contact::None,
    }
    match side(b, &plane_a, eps) {
        // a crosses b's plane but b lies in a's plane: only numerically possible
        None => Contact::Coplanar,
        Some(0) => Contact::Crossing,
        Some(_) => Contact::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(points: [[f64; 3]; 3]) -> [Point3<f64>; 3] {
        points.map(|p| Point3::new(p[0], p[1], p[2]))
    }

    #[test]
    fn test_crossing_triangles() {
        let a = tri([[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]]);
        let b = tri([[0.5, 0.5, -1.0], [0.5, 0.5, 1.0], [1.5, -0.5, 0.0]]);
        assert_eq!(facet_contact(&a, &b, 1e-9), Contact::Crossing);
        assert_eq!(facet_contact(&b, &a, 1e-9), Contact::Crossing);
    }

    #[test]
    fn test_separated_triangles() {
        let a = tri([[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]]);
        let above = tri([[0.0, 0.0, 1.0], [2.0, 0.0, 1.5], [0.0, 2.0, 1.0]]);
        assert_eq!(facet_contact(&a, &above, 1e-9), Contact::None);
        let far = tri([[5.0, 5.0, 0.0], [6.0, 5.0, 0.0], [5.0, 6.0, 0.0]]);
        assert_eq!(facet_contact(&a, &far, 1e-9), Contact::None);
    }

    #[test]
    fn test_coplanar_triangles() {
        let a = tri([[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]]);
        let b = tri([[1.0, 1.0, 0.0], [0.5, 0.0, 0.0], [3.0, 0.0, 0.0]]);
        assert_eq!(facet_contact(&a, &b, 1e-9), Contact::Coplanar);
    }

    #[test]
    fn test_touching_at_vertex_counts_as_contact() {
        let a = tri([[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]]);
        let b = tri([[0.5, 0.5, 0.0], [0.5, 0.5, 1.0], [1.0, 0.0, 1.0]]);
        assert_eq!(facet_contact(&a, &b, 1e-9), Contact::Crossing);
    }
}
