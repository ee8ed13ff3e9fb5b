// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric primitives generator.
//!
//! Tessellation depends only on the primitive's own parameters, so equal
//! parameters always produce identical meshes.

use super::mesh_reconstruction::{triangulate_indexed, IndexedPolygon};
use super::mesh_utils::is_closed;
use super::{Mesh, Triangle};
use crate::error::{CsgError, Result};
use crate::utils::math::newell_normal;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Circle subdivision settings (`$fn`, `$fa`, `$fs`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Fixed fragment count, 0 to derive it from `fa`/`fs`
    pub fn_: u32,
    /// Minimum angle per fragment in degrees
    pub fa: f64,
    /// Minimum fragment length
    pub fs: f64,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            fn_: 0,
            fa: 12.0,
            fs: 2.0,
        }
    }
}

impl Resolution {
    pub fn with_fragments(fn_: u32) -> Self {
        Self {
            fn_,
            ..Self::default()
        }
    }

    /// Number of segments used for a circle of radius `r`
    pub fn fragments(&self, r: f64) -> usize {
        if r < 1e-8 {
            return 3;
        }
        if self.fn_ > 0 {
            return self.fn_.max(3) as usize;
        }
        let fa = if self.fa > 0.0 { self.fa } else { 12.0 };
        let fs = if self.fs > 0.0 { self.fs } else { 2.0 };
        (360.0 / fa).min(r * 2.0 * PI / fs).max(5.0).ceil() as usize
    }
}

/// Geometric primitives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Sphere {
        radius: f64,
        resolution: Resolution,
    },
    Cube {
        size: Vector3<f64>,
        center: bool,
    },
    /// Frustum from radius1 at the bottom to radius2 at the top
    Cylinder {
        height: f64,
        radius1: f64,
        radius2: f64,
        center: bool,
        resolution: Resolution,
    },
    /// Faces are polygons of point indices
    Polyhedron {
        points: Vec<Point3<f64>>,
        faces: Vec<Vec<usize>>,
    },
}

impl Primitive {
    pub fn cube(size: Vector3<f64>, center: bool) -> Self {
        Self::Cube { size, center }
    }

    pub fn sphere(radius: f64) -> Self {
        Self::Sphere {
            radius,
            resolution: Resolution::default(),
        }
    }

    pub fn cylinder(height: f64, radius1: f64, radius2: f64, center: bool) -> Self {
        Self::Cylinder {
            height,
            radius1,
            radius2,
            center,
            resolution: Resolution::default(),
        }
    }

    pub fn polyhedron(points: Vec<Point3<f64>>, faces: Vec<Vec<usize>>) -> Self {
        Self::Polyhedron { points, faces }
    }

    /// Replace the circle resolution of round primitives
    pub fn with_resolution(mut self, new: Resolution) -> Self {
        match &mut self {
            Self::Sphere { resolution, .. } | Self::Cylinder { resolution, .. } => *resolution = new,
            Self::Cube { .. } | Self::Polyhedron { .. } => {}
        }
        self
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sphere { .. } => "sphere",
            Self::Cube { .. } => "cube",
            Self::Cylinder { .. } => "cylinder",
            Self::Polyhedron { .. } => "polyhedron",
        }
    }

    pub fn to_mesh(&self) -> Result<Mesh> {
        match self {
            Self::Sphere { radius, resolution } => generate_sphere_mesh(*radius, resolution),
            Self::Cube { size, center } => generate_cube_mesh(*size, *center),
            Self::Cylinder {
                height,
                radius1,
                radius2,
                center,
                resolution,
            } => generate_cylinder_mesh(*height, *radius1, *radius2, *center, resolution),
            Self::Polyhedron { points, faces } => generate_polyhedron_mesh(points, faces),
        }
    }
}

fn check_positive(primitive: &str, what: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CsgError::geometry(
            primitive,
            format!("{} must be positive, got {}", what, value),
        ));
    }
    Ok(())
}

fn generate_cube_mesh(size: Vector3<f64>, center: bool) -> Result<Mesh> {
    for (axis, value) in ["x", "y", "z"].iter().zip(size.iter()) {
        check_positive("cube", &format!("size.{}", axis), *value)?;
    }

    let (min, max) = if center {
        (-size / 2.0, size / 2.0)
    } else {
        (Vector3::zeros(), size)
    };

    let positions = vec![
        Point3::new(min.x, min.y, min.z),
        Point3::new(max.x, min.y, min.z),
        Point3::new(max.x, max.y, min.z),
        Point3::new(min.x, max.y, min.z),
        Point3::new(min.x, min.y, max.z),
        Point3::new(max.x, min.y, max.z),
        Point3::new(max.x, max.y, max.z),
        Point3::new(min.x, max.y, max.z),
    ];

    // Two triangles per face, outward winding
    let faces = [
        [4, 5, 6],
        [4, 6, 7],
        [1, 0, 3],
        [1, 3, 2],
        [5, 1, 2],
        [5, 2, 6],
        [0, 4, 7],
        [0, 7, 3],
        [7, 6, 2],
        [7, 2, 3],
        [0, 1, 5],
        [0, 5, 4],
    ];

    Ok(Mesh::from_parts(
        positions,
        faces.iter().map(|f| Triangle::new(*f)).collect(),
    ))
}

fn ring(radius: f64, z: f64, fragments: usize) -> impl Iterator<Item = Point3<f64>> {
    (0..fragments).map(move |j| {
        let theta = 2.0 * PI * j as f64 / fragments as f64;
        Point3::new(radius * theta.cos(), radius * theta.sin(), z)
    })
}

fn generate_sphere_mesh(radius: f64, resolution: &Resolution) -> Result<Mesh> {
    check_positive("sphere", "radius", radius)?;

    let fragments = resolution.fragments(radius);
    let rings = (fragments + 1) / 2;
    let mut mesh = Mesh::with_capacity(rings * fragments, 2 * rings * fragments);

    for i in 0..rings {
        let phi = PI * (i as f64 + 0.5) / rings as f64;
        mesh.vertices
            .extend(ring(radius * phi.sin(), radius * phi.cos(), fragments));
    }

    let at = |i: usize, j: usize| i * fragments + j % fragments;

    // Top cap faces +z, bottom cap faces -z
    for j in 1..fragments - 1 {
        mesh.add_triangle(Triangle::new([at(0, 0), at(0, j), at(0, j + 1)]));
    }
    for i in 0..rings - 1 {
        for j in 0..fragments {
            mesh.add_triangle(Triangle::new([at(i, j), at(i + 1, j), at(i + 1, j + 1)]));
            mesh.add_triangle(Triangle::new([at(i, j), at(i + 1, j + 1), at(i, j + 1)]));
        }
    }
    let last = rings - 1;
    for j in 1..fragments - 1 {
        mesh.add_triangle(Triangle::new([at(last, 0), at(last, j + 1), at(last, j)]));
    }

    Ok(mesh)
}

fn generate_cylinder_mesh(
    height: f64,
    radius1: f64,
    radius2: f64,
    center: bool,
    resolution: &Resolution,
) -> Result<Mesh> {
    check_positive("cylinder", "height", height)?;
    for (what, r) in [("r1", radius1), ("r2", radius2)] {
        if !r.is_finite() || r < 0.0 {
            return Err(CsgError::geometry(
                "cylinder",
                format!("{} must not be negative, got {}", what, r),
            ));
        }
    }
    if radius1 <= 0.0 && radius2 <= 0.0 {
        return Err(CsgError::geometry("cylinder", "both radii are zero"));
    }

    let fragments = resolution.fragments(radius1.max(radius2));
    let (z0, z1) = if center {
        (-height / 2.0, height / 2.0)
    } else {
        (0.0, height)
    };

    let mut mesh = Mesh::new();
    let bottom: Vec<usize> = if radius1 > 0.0 {
        ring(radius1, z0, fragments).map(|p| mesh.add_vertex(p)).collect()
    } else {
        vec![mesh.add_vertex(Point3::new(0.0, 0.0, z0))]
    };
    let top: Vec<usize> = if radius2 > 0.0 {
        ring(radius2, z1, fragments).map(|p| mesh.add_vertex(p)).collect()
    } else {
        vec![mesh.add_vertex(Point3::new(0.0, 0.0, z1))]
    };

    let b = |j: usize| bottom[j % bottom.len()];
    let t = |j: usize| top[j % top.len()];

    if bottom.len() > 1 {
        for j in 1..fragments - 1 {
            mesh.add_triangle(Triangle::new([b(0), b(j + 1), b(j)]));
        }
    }
    for j in 0..fragments {
        match (bottom.len() > 1, top.len() > 1) {
            (true, true) => {
                mesh.add_triangle(Triangle::new([b(j), b(j + 1), t(j + 1)]));
                mesh.add_triangle(Triangle::new([b(j), t(j + 1), t(j)]));
            }
            (true, false) => mesh.add_triangle(Triangle::new([b(j), b(j + 1), t(0)])),
            (false, true) => mesh.add_triangle(Triangle::new([b(0), t(j + 1), t(j)])),
            (false, false) => unreachable!("rejected above"),
        }
    }
    if top.len() > 1 {
        for j in 1..fragments - 1 {
            mesh.add_triangle(Triangle::new([t(0), t(j), t(j + 1)]));
        }
    }

    Ok(mesh)
}

fn generate_polyhedron_mesh(points: &[Point3<f64>], faces: &[Vec<usize>]) -> Result<Mesh> {
    if points.len() < 4 {
        return Err(CsgError::geometry(
            "polyhedron",
            format!("needs at least 4 points, got {}", points.len()),
        ));
    }
    if let Some(p) = points.iter().position(|p| !p.coords.iter().all(|c| c.is_finite())) {
        return Err(CsgError::geometry(
            "polyhedron",
            format!("point {} is not finite", p),
        ));
    }

    let mut triangles = Vec::new();
    for (f, face) in faces.iter().enumerate() {
        if let Some(&bad) = face.iter().find(|&&i| i >= points.len()) {
            return Err(CsgError::geometry(
                "polyhedron",
                format!("face {} references point {} (only {} points)", f, bad, points.len()),
            ));
        }
        let mut indices: Vec<usize> = Vec::with_capacity(face.len());
        for &i in face {
            if indices.last() != Some(&i) {
                indices.push(i);
            }
        }
        while indices.len() > 1 && indices.first() == indices.last() {
            indices.pop();
        }
        if indices.len() < 3 {
            return Err(CsgError::geometry(
                "polyhedron",
                format!("face {} has fewer than 3 distinct points", f),
            ));
        }

        let normal = newell_normal(indices.iter().map(|&i| &points[i]));
        if normal.norm() <= f64::MIN_POSITIVE {
            continue;
        }
        let polygon = IndexedPolygon { indices, normal };
        triangulate_indexed(points, &polygon, false, 0.0, &mut triangles);
    }

    let mut mesh = Mesh::from_parts(points.to_vec(), triangles);
    mesh.remove_orphaned_vertices();
    if !is_closed(&mesh) {
        return Err(CsgError::geometry("polyhedron", "faces do not form a closed surface"));
    }
    // Accept either face orientation convention
    if mesh.volume() < 0.0 {
        mesh.flip_orientation();
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::mesh_utils::{is_closed, is_manifold};
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_primitive() {
        let mesh = Primitive::cube(Vector3::new(10.0, 10.0, 10.0), false)
            .to_mesh()
            .unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        assert!(is_manifold(&mesh));
        assert_relative_eq!(mesh.volume(), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_centered_cube() {
        let mesh = Primitive::cube(Vector3::new(2.0, 4.0, 6.0), true)
            .to_mesh()
            .unwrap();
        let bbox = mesh.bounding_box();
        assert_eq!(bbox.min, Point3::new(-1.0, -2.0, -3.0));
        assert_eq!(bbox.max, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_sphere_primitive() {
        let mesh = Primitive::sphere(10.0).to_mesh().unwrap();
        // r=10 with default $fa/$fs gives 30 fragments and 15 rings
        assert_eq!(mesh.vertex_count(), 30 * 15);
        assert!(is_manifold(&mesh));
        assert!(mesh.volume() > 0.9 * 4.0 / 3.0 * PI * 1000.0);
        assert!(mesh.volume() < 4.0 / 3.0 * PI * 1000.0);
    }

    #[test]
    fn test_sphere_is_deterministic() {
        let a = Primitive::sphere(7.5).to_mesh().unwrap();
        let b = Primitive::sphere(7.5).to_mesh().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cylinder_primitive() {
        let mesh = Primitive::cylinder(10.0, 5.0, 5.0, false)
            .with_resolution(Resolution::with_fragments(32))
            .to_mesh()
            .unwrap();
        assert!(is_manifold(&mesh));
        assert_eq!(mesh.triangle_count(), 2 * 30 + 2 * 32);
        let expected = 32.0 / 2.0 * 25.0 * (2.0 * PI / 32.0).sin() * 10.0;
        assert_relative_eq!(mesh.volume(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_cone_primitive() {
        let mesh = Primitive::cylinder(10.0, 5.0, 0.0, true)
            .to_mesh()
            .unwrap();
        assert!(is_manifold(&mesh));
        assert!(mesh.volume() > 0.0);
        let inverted = Primitive::cylinder(10.0, 0.0, 5.0, true).to_mesh().unwrap();
        assert!(is_manifold(&inverted));
        assert_relative_eq!(inverted.volume(), mesh.volume(), epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            Primitive::sphere(-1.0).to_mesh(),
            Err(CsgError::Geometry { .. })
        ));
        assert!(Primitive::cylinder(10.0, 0.0, 0.0, false).to_mesh().is_err());
        assert!(Primitive::cylinder(10.0, -1.0, 2.0, false).to_mesh().is_err());
        assert!(Primitive::cylinder(0.0, 1.0, 1.0, false).to_mesh().is_err());
        assert!(Primitive::cube(Vector3::new(1.0, 0.0, 1.0), false).to_mesh().is_err());
    }

    #[test]
    fn test_polyhedron_either_orientation() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        // Clockwise seen from outside
        let faces = vec![vec![0, 1, 2], vec![0, 3, 1], vec![0, 2, 3], vec![1, 3, 2]];
        let mesh = Primitive::polyhedron(points.clone(), faces.clone()).to_mesh().unwrap();
        assert_relative_eq!(mesh.volume(), 1.0 / 6.0, epsilon = 1e-12);

        let reversed: Vec<Vec<usize>> = faces.iter().map(|f| f.iter().rev().copied().collect()).collect();
        let mesh = Primitive::polyhedron(points, reversed).to_mesh().unwrap();
        assert!(is_closed(&mesh));
        assert_relative_eq!(mesh.volume(), 1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_polyhedron_rejects_open_surface() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let open = vec![vec![0, 1, 2], vec![0, 3, 1]];
        assert!(Primitive::polyhedron(points.clone(), open).to_mesh().is_err());
        let bad_index = vec![vec![0, 1, 9]];
        assert!(Primitive::polyhedron(points, bad_index).to_mesh().is_err());
    }
}
