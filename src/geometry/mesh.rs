// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh representation and utilities

use super::BoundingBox;
use crate::error::{CsgError, Result};
use crate::utils::math::triangle_normal;
use ahash::AHashMap;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Triangle defined by three vertex indices, counter-clockwise seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle {
    pub indices: [usize; 3],
}

impl Triangle {
    pub fn new(indices: [usize; 3]) -> Self {
        Self { indices }
    }

    /// Same triangle with opposite winding
    pub fn flipped(&self) -> Self {
        Self::new([self.indices[0], self.indices[2], self.indices[1]])
    }

    pub fn is_degenerate(&self) -> bool {
        let [a, b, c] = self.indices;
        a == b || b == c || a == c
    }

    /// Directed edges in winding order
    pub fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.indices;
        [(a, b), (b, c), (c, a)]
    }
}

/// Triangular mesh.
///
/// Meshes produced by the kernel and the boolean engine are closed and
/// oriented with outward normals. Operations return new meshes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Point3<f64>>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new()
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            triangles: Vec::with_capacity(triangle_count),
        }
    }

    pub fn from_parts(vertices: Vec<Point3<f64>>, triangles: Vec<Triangle>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, position: Point3<f64>) -> usize {
        let index = self.vertices.len();
        self.vertices.push(position);
        index
    }

    /// Add a triangle
    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Get vertex count
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get triangle count
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangle_points(&self, index: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.triangles[index].indices;
        [self.vertices[a], self.vertices[b], self.vertices[c]]
    }

    /// Unit normal of a triangle, zero if degenerate
    pub fn triangle_normal(&self, index: usize) -> Vector3<f64> {
        let [a, b, c] = self.triangle_points(index);
        triangle_normal(&a, &b, &c)
    }

    /// Transform all vertices by a matrix.
    ///
    /// A negative determinant mirrors the mesh, so every triangle is
    /// reversed to keep normals pointing outward.
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for vertex in &mut self.vertices {
            *vertex = matrix.transform_point(vertex);
        }
        if matrix.fixed_view::<3, 3>(0, 0).clone_owned().determinant() < 0.0 {
            self.flip_orientation();
        }
    }

    /// Transformed copy
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Mesh {
        let mut mesh = self.clone();
        mesh.transform(matrix);
        mesh
    }

    /// Reverse the winding of every triangle
    pub fn flip_orientation(&mut self) {
        for triangle in &mut self.triangles {
            *triangle = triangle.flipped();
        }
    }

    /// Compute bounding box
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.vertices)
    }

    /// Signed enclosed volume (positive for outward orientation)
    pub fn volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.indices;
                let (a, b, c) = (self.vertices[a], self.vertices[b], self.vertices[c]);
                a.coords.dot(&b.coords.cross(&c.coords))
            })
            .sum::<f64>()
            / 6.0
    }

    pub fn surface_area(&self) -> f64 {
        (0..self.triangles.len())
            .map(|i| {
                let [a, b, c] = self.triangle_points(i);
                (b - a).cross(&(c - a)).norm() * 0.5
            })
            .sum()
    }

    /// Merge with another mesh (concatenation without CSG)
    pub fn merge(&mut self, other: &Mesh) {
        let offset = self.vertices.len();
        self.vertices.extend_from_slice(&other.vertices);

        for triangle in &other.triangles {
            self.triangles.push(Triangle::new([
                triangle.indices[0] + offset,
                triangle.indices[1] + offset,
                triangle.indices[2] + offset,
            ]));
        }
    }

    /// Concatenate several meshes
    pub fn concat<'a>(meshes: impl IntoIterator<Item = &'a Mesh>) -> Mesh {
        let mut result = Mesh::new();
        for mesh in meshes {
            result.merge(mesh);
        }
        result
    }

    /// Check indices and coordinates
    pub fn validate(&self) -> Result<()> {
        if let Some(v) = self.vertices.iter().position(|p| !p.coords.iter().all(|c| c.is_finite())) {
            return Err(CsgError::topology(format!("vertex {} has a non-finite coordinate", v)));
        }
        let count = self.vertices.len();
        if let Some(t) = self
            .triangles
            .iter()
            .position(|t| t.indices.iter().any(|&i| i >= count))
        {
            return Err(CsgError::topology(format!(
                "triangle {} references a vertex out of range (mesh has {} vertices)",
                t, count
            )));
        }
        Ok(())
    }

    /// Weld vertices that are within epsilon distance of each other.
    ///
    /// Uses a uniform grid so only neighbouring cells are compared.
    /// Returns the number of vertices removed.
    pub fn weld_vertices(&mut self, epsilon: f64) -> usize {
        if self.vertices.is_empty() {
            return 0;
        }
        let original_count = self.vertices.len();
        let (vertices, remap) = weld_points(&self.vertices, epsilon);

        for triangle in &mut self.triangles {
            for index in &mut triangle.indices {
                *index = remap[*index];
            }
        }
        self.vertices = vertices;
        original_count - self.vertices.len()
    }

    /// Remove triangles with repeated indices or exact duplicates.
    /// Returns the number of triangles removed
    pub fn remove_degenerate_triangles(&mut self) -> usize {
        let original_count = self.triangles.len();
        let mut seen = ahash::AHashSet::with_capacity(original_count);
        self.triangles.retain(|t| {
            if t.is_degenerate() {
                return false;
            }
            // Rotation-invariant key, winding preserved
            let [a, b, c] = t.indices;
            let key = if a < b && a < c {
                [a, b, c]
            } else if b < c {
                [b, c, a]
            } else {
                [c, a, b]
            };
            seen.insert(key)
        });
        original_count - self.triangles.len()
    }

    /// Remove vertices not referenced by any triangle
    pub fn remove_orphaned_vertices(&mut self) -> usize {
        let original_count = self.vertices.len();
        let mut remap = vec![usize::MAX; original_count];
        let mut vertices = Vec::with_capacity(original_count);

        for triangle in &mut self.triangles {
            for index in &mut triangle.indices {
                if remap[*index] == usize::MAX {
                    remap[*index] = vertices.len();
                    vertices.push(self.vertices[*index]);
                }
                *index = remap[*index];
            }
        }
        self.vertices = vertices;
        original_count - self.vertices.len()
    }
}

/// Deduplicate points within `epsilon`, returning the unique points and an
/// index remap. The first point of each cluster is kept.
pub fn weld_points(points: &[Point3<f64>], epsilon: f64) -> (Vec<Point3<f64>>, Vec<usize>) {
    let cell = (epsilon * 2.0).max(f64::MIN_POSITIVE);
    let key = |p: &Point3<f64>| {
        (
            (p.x / cell).floor() as i64,
            (p.y / cell).floor() as i64,
            (p.z / cell).floor() as i64,
        )
    };

    let mut grid: AHashMap<(i64, i64, i64), Vec<usize>> = AHashMap::new();
    let mut unique: Vec<Point3<f64>> = Vec::new();
    let mut remap = Vec::with_capacity(points.len());

    for point in points {
        let (kx, ky, kz) = key(point);
        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if let Some(bucket) = grid.get(&(kx + dx, ky + dy, kz + dz)) {
                        if let Some(&j) = bucket
                            .iter()
                            .find(|&&j| (unique[j] - point).norm() <= epsilon)
                        {
                            found = Some(j);
                            break 'search;
                        }
                    }
                }
            }
        }

        let index = match found {
            Some(j) => j,
            None => {
                let j = unique.len();
                unique.push(*point);
                grid.entry((kx, ky, kz)).or_default().push(j);
                j
            }
        };
        remap.push(index);
    }

    (unique, remap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use approx::assert_relative_eq;

    fn unit_cube() -> Mesh {
        Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false)
            .to_mesh()
            .unwrap()
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = unit_cube();
        let b = unit_cube();
        a.merge(&b);
        assert_eq!(a.vertex_count(), 16);
        assert_eq!(a.triangle_count(), 24);
        assert!(a.triangles[12..].iter().all(|t| t.indices.iter().all(|&i| i >= 8)));
    }

    #[test]
    fn test_volume_and_area() {
        let mesh = unit_cube();
        assert_relative_eq!(mesh.volume(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(mesh.surface_area(), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mirror_flips_winding() {
        let mesh = unit_cube();
        let mirrored = mesh.transformed(&Matrix4::new_nonuniform_scaling(&Vector3::new(-1.0, 1.0, 1.0)));
        assert_relative_eq!(mirrored.volume(), 1.0, epsilon = 1e-12);
        assert_eq!(mirrored.triangles[0], mesh.triangles[0].flipped());
    }

    #[test]
    fn test_weld_vertices() {
        let mut mesh = unit_cube();
        let copy = unit_cube();
        mesh.merge(&copy);
        let removed = mesh.weld_vertices(1e-9);
        assert_eq!(removed, 8);
        assert_eq!(mesh.remove_degenerate_triangles(), 12);
        assert_eq!(mesh.triangle_count(), 12);
    }

    #[test]
    fn test_validate_rejects_bad_index() {
        let mut mesh = unit_cube();
        mesh.add_triangle(Triangle::new([0, 1, 99]));
        assert!(matches!(mesh.validate(), Err(CsgError::MeshTopology { .. })));
    }

    #[test]
    fn test_remove_orphaned_vertices() {
        let mut mesh = unit_cube();
        mesh.add_vertex(Point3::new(5.0, 5.0, 5.0));
        assert_eq!(mesh.remove_orphaned_vertices(), 1);
        assert_relative_eq!(mesh.volume(), 1.0, epsilon = 1e-12);
    }
}
