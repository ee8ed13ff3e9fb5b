// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Convex facet fragments and plane splitting.
//! Fragments keep the plane of the facet they were cut from.

use super::robust_predicates::{Plane, PlaneClassification};
use super::BoundingBox;
use nalgebra::Point3;

/// Convex planar polygon cut from an input facet
#[derive(Debug, Clone)]
pub struct Polygon {
    pub points: Vec<Point3<f64>>,
    pub plane: Plane,
}

impl Polygon {
    pub fn new(points: Vec<Point3<f64>>, plane: Plane) -> Self {
        Self { points, plane }
    }

    /// `None` for a degenerate triangle
    pub fn from_triangle(points: [Point3<f64>; 3]) -> Option<Self> {
        let [a, b, c] = points;
        Plane::from_points(a, b, c).map(|plane| Self::new(points.to_vec(), plane))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.points)
    }

    /// Vertex average; lies strictly inside for a convex polygon
    pub fn centroid(&self) -> Point3<f64> {
        let sum = self
            .points
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords);
        Point3::from(sum / self.points.len() as f64)
    }

    /// Reverse orientation
    pub fn flip(&mut self) {
        self.points.reverse();
        self.plane = self.plane.flipped();
    }

    /// Split by `plane`. Returns the parts in front of and behind the plane.
    ///
    /// Vertices within `eps` of the plane belong to both sides. Pieces with
    /// fewer than three vertices are dropped. A polygon lying in the plane
    /// goes to the side its own normal faces.
    pub fn split(&self, plane: &Plane, eps: f64) -> (Option<Polygon>, Option<Polygon>) {
        let distances: Vec<f64> = self.points.iter().map(|p| plane.signed_distance(p)).collect();
        let sides: Vec<PlaneClassification> = distances
            .iter()
            .map(|&d| {
                if d > eps {
                    PlaneClassification::Front
                } else if d < -eps {
                    PlaneClassification::Back
                } else {
                    PlaneClassification::OnPlane
                }
            })
            .collect();

        let has_front = sides.contains(&PlaneClassification::Front);
        let has_back = sides.contains(&PlaneClassification::Back);
        match (has_front, has_back) {
            // Coplanar: side chosen by facing
            (false, false) if plane.normal.dot(&self.plane.normal) >= 0.0 => {
                return (Some(self.clone()), None)
            }
            (false, false) => return (None, Some(self.clone())),
            (true, false) => return (Some(self.clone()), None),
            (false, true) => return (None, Some(self.clone())),
            (true, true) => {}
        }

        let n = self.points.len();
        let mut front = Vec::with_capacity(n + 1);
        let mut back = Vec::with_capacity(n + 1);
        for i in 0..n {
            let j = (i + 1) % n;
            let (pi, si) = (self.points[i], sides[i]);
            let sj = sides[j];

            if si != PlaneClassification::Back {
                front.push(pi);
            }
            if si != PlaneClassification::Front {
                back.push(pi);
            }

            let crosses = matches!(
                (si, sj),
                (PlaneClassification::Front, PlaneClassification::Back)
                    | (PlaneClassification::Back, PlaneClassification::Front)
            );
            if crosses {
                let t = distances[i] / (distances[i] - distances[j]);
                let point = pi + (self.points[j] - pi) * t;
                front.push(point);
                back.push(point);
            }
        }

        let piece = |points: Vec<Point3<f64>>| {
            (points.len() >= 3).then(|| Polygon::new(points, self.plane))
        };
        (piece(front), piece(back))
    }
}
