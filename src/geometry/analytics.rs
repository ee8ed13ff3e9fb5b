// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry analytics and statistics

use super::mesh_utils::{connected_components, is_closed, is_manifold};
use super::{BoundingBox, Mesh};
use serde::{Deserialize, Serialize};

/// Geometry statistics and analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryStats {
    pub vertex_count: usize,
    pub triangle_count: usize,
    /// Signed volume, positive for outward-oriented meshes
    pub volume: f64,
    pub surface_area: f64,
    pub bounding_box: BoundingBox,
    /// Volume centroid, or the vertex average for meshes without volume
    pub centroid: [f64; 3],
    /// Every directed edge is matched by a reversed one
    pub is_watertight: bool,
    /// Every edge has exactly two facets
    pub is_manifold: bool,
    /// Number of connected shells
    pub components: usize,
}

impl GeometryStats {
    pub fn empty() -> Self {
        Self {
            vertex_count: 0,
            triangle_count: 0,
            volume: 0.0,
            surface_area: 0.0,
            bounding_box: BoundingBox::empty(),
            centroid: [0.0; 3],
            is_watertight: true,
            is_manifold: true,
            components: 0,
        }
    }

    /// Report lines as `(label, value)` pairs
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let size = if self.bounding_box.is_empty() {
            "-".to_string()
        } else {
            let s = self.bounding_box.size();
            format!("{:.3} x {:.3} x {:.3}", s.x, s.y, s.z)
        };
        vec![
            ("Vertices", self.vertex_count.to_string()),
            ("Triangles", self.triangle_count.to_string()),
            ("Volume", format!("{:.4}", self.volume)),
            ("Surface area", format!("{:.4}", self.surface_area)),
            ("Size", size),
            (
                "Centroid",
                format!(
                    "({:.3}, {:.3}, {:.3})",
                    self.centroid[0], self.centroid[1], self.centroid[2]
                ),
            ),
            ("Components", self.components.to_string()),
            ("Watertight", yes_no(self.is_watertight)),
            ("Manifold", yes_no(self.is_manifold)),
        ]
    }
}

fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}

/// Analyze mesh geometry and compute statistics
pub fn analyze(mesh: &Mesh) -> GeometryStats {
    if mesh.vertices.is_empty() || mesh.triangles.is_empty() {
        return GeometryStats::empty();
    }

    let volume = mesh.volume();
    GeometryStats {
        vertex_count: mesh.vertex_count(),
        triangle_count: mesh.triangle_count(),
        volume,
        surface_area: mesh.surface_area(),
        bounding_box: mesh.bounding_box(),
        centroid: calculate_centroid(mesh, volume),
        is_watertight: is_closed(mesh),
        is_manifold: is_manifold(mesh),
        components: connected_components(mesh).len(),
    }
}

/// Centroid of the enclosed volume, from signed tetrahedra against the origin
fn calculate_centroid(mesh: &Mesh, volume: f64) -> [f64; 3] {
    if volume.abs() <= f64::EPSILON {
        let sum = mesh
            .vertices
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, v| acc + v.coords);
        let c = sum / mesh.vertices.len() as f64;
        return [c.x, c.y, c.z];
    }

    let mut weighted = nalgebra::Vector3::zeros();
    for t in 0..mesh.triangle_count() {
        let [v0, v1, v2] = mesh.triangle_points(t);
        let tet_volume = v0.coords.dot(&v1.coords.cross(&v2.coords)) / 6.0;
        weighted += (v0.coords + v1.coords + v2.coords) / 4.0 * tet_volume;
    }
    let c = weighted / volume;
    [c.x, c.y, c.z]
}
