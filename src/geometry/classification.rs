// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Fragment classification for CSG operations.
//! Decides whether a fragment lies inside, outside, or on the boundary of the other solid.

use super::bvh::BVH;
use super::robust_predicates::{point_in_triangle, Plane};
use super::{BoundingBox, Mesh};
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Classification of a face fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Inside,
    Outside,
    /// On a facet of the other solid, facing the same way
    SameBoundary,
    /// On a facet of the other solid, facing the opposite way
    OppositeBoundary,
}

/// Point-in-solid oracle for one closed mesh
pub struct SolidClassifier<'a> {
    mesh: &'a Mesh,
    bvh: BVH,
    planes: Vec<Option<Plane>>,
    eps: f64,
}

impl<'a> SolidClassifier<'a> {
    pub fn new(mesh: &'a Mesh, eps: f64) -> Self {
        let planes = (0..mesh.triangle_count())
            .map(|t| {
                let [a, b, c] = mesh.triangle_points(t);
                Plane::from_points(a, b, c)
            })
            .collect();
        Self {
            mesh,
            bvh: BVH::from_mesh(mesh, 0.0),
            planes,
            eps,
        }
    }

    /// Classify a fragment by a point strictly inside it and its facing
    pub fn classify(&self, point: &Point3<f64>, normal: &Vector3<f64>) -> Classification {
        if let Some(facing) = self.boundary_facing(point) {
            return if facing.dot(normal) >= 0.0 {
                Classification::SameBoundary
            } else {
                Classification::OppositeBoundary
            };
        }
        if self.winding_number(point) > 0.5 {
            Classification::Inside
        } else {
            Classification::Outside
        }
    }

    /// Normal of a facet containing `point`, if any
    fn boundary_facing(&self, point: &Point3<f64>) -> Option<Vector3<f64>> {
        let region = BoundingBox::new(*point, *point).expanded(self.eps);
        self.bvh.query(&region).into_iter().find_map(|t| {
            let plane = self.planes[t].as_ref()?;
            if plane.signed_distance(point).abs() > self.eps {
                return None;
            }
            point_in_triangle(point, &self.mesh.triangle_points(t), &plane.normal, self.eps)
                .then_some(plane.normal)
        })
    }

    /// Generalized winding number: 1 inside a closed outward-oriented mesh, 0 outside.
    /// Overlapping shells add up.
    pub fn winding_number(&self, point: &Point3<f64>) -> f64 {
        let total: f64 = (0..self.mesh.triangle_count())
            .map(|t| {
                let [a, b, c] = self.mesh.triangle_points(t);
                solid_angle(&(a - point), &(b - point), &(c - point))
            })
            .sum();
        total / (4.0 * PI)
    }
}

/// Signed solid angle of a triangle seen from the origin (Van Oosterom and Strackee)
fn solid_angle(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    let (la, lb, lc) = (a.norm(), b.norm(), c.norm());
    let numerator = a.dot(&b.cross(c));
    let denominator = la * lb * lc + a.dot(b) * lc + a.dot(c) * lb + b.dot(c) * la;
    2.0 * numerator.atan2(denominator)
}
