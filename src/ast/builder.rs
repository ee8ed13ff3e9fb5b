// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Programmatic scene construction and evaluation

use super::{Evaluator, Node, TransformOp, Vec3};
use crate::config::BuilderConfig;
use crate::error::Result;
use crate::geometry::{BooleanEngine, BooleanOp, Mesh, Primitive};
use crate::io::{ImportCache, ImportParams, NativeConverter};
use nalgebra::{Matrix4, Point3};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Scene builder bound to one engine configuration and import cache
pub struct CsgBuilder {
    config: BuilderConfig,
    verbose: bool,
    fine_verbose: bool,
    cache: Arc<ImportCache>,
}

impl Default for CsgBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsgBuilder {
    pub fn new() -> Self {
        Self::with_config(BuilderConfig::default())
    }

    pub fn with_config(config: BuilderConfig) -> Self {
        let cache = ImportCache::new(Box::new(NativeConverter::new()));
        Self {
            config,
            verbose: false,
            fine_verbose: false,
            cache: Arc::new(cache),
        }
    }

    /// Share an existing import cache
    pub fn with_import_cache(mut self, cache: Arc<ImportCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut BuilderConfig {
        &mut self.config
    }

    pub fn import_cache(&self) -> &Arc<ImportCache> {
        &self.cache
    }

    pub fn set_simplify_coplanar_facets(&mut self, enabled: bool, angle_tolerance: f64) {
        self.config.simplify_coplanar_facets = enabled;
        self.config.coplanar_angle_tolerance = angle_tolerance;
    }

    pub fn set_delaunay(&mut self, enabled: bool) {
        self.config.delaunay = enabled;
    }

    pub fn set_detect_intersecting_neighbors(&mut self, enabled: bool) {
        self.config.detect_intersecting_neighbors = enabled;
    }

    pub fn set_fast_union(&mut self, enabled: bool) {
        self.config.fast_union = enabled;
    }

    pub fn set_noop(&mut self, enabled: bool) {
        self.config.noop = enabled;
    }

    pub fn set_verbose(&mut self, enabled: bool) {
        self.verbose = enabled;
    }

    pub fn set_fine_verbose(&mut self, enabled: bool) {
        self.fine_verbose = enabled;
    }

    pub fn sphere(&self, radius: f64) -> Node {
        Node::primitive(Primitive::sphere(radius))
    }

    /// Cube centered on the origin
    pub fn cube(&self, size: Vec3) -> Node {
        self.cube_with(size, true)
    }

    pub fn cube_with(&self, size: Vec3, center: bool) -> Node {
        Node::primitive(Primitive::cube(size, center))
    }

    /// Cylinder centered on the origin
    pub fn cylinder(&self, height: f64, radius1: f64, radius2: f64) -> Node {
        self.cylinder_with(height, radius1, radius2, true)
    }

    pub fn cylinder_with(&self, height: f64, radius1: f64, radius2: f64, center: bool) -> Node {
        Node::primitive(Primitive::cylinder(height, radius1, radius2, center))
    }

    pub fn polyhedron(&self, points: Vec<Point3<f64>>, faces: Vec<Vec<usize>>) -> Node {
        Node::primitive(Primitive::polyhedron(points, faces))
    }

    pub fn multmatrix(&self, matrix: Matrix4<f64>, children: Vec<Node>) -> Node {
        let child = match <[Node; 1]>::try_from(children) {
            Ok([only]) => only,
            Err(children) => Node::group(children),
        };
        Node::transform(matrix, child)
    }

    pub fn translate(&self, offset: Vec3, children: Vec<Node>) -> Node {
        self.multmatrix(TransformOp::Translate(offset).to_matrix(), children)
    }

    /// Euler angles in degrees
    pub fn rotate(&self, angles: Vec3, children: Vec<Node>) -> Node {
        self.multmatrix(TransformOp::Rotate(angles).to_matrix(), children)
    }

    pub fn scale(&self, factors: Vec3, children: Vec<Node>) -> Node {
        self.multmatrix(TransformOp::Scale(factors).to_matrix(), children)
    }

    pub fn mirror(&self, normal: Vec3, children: Vec<Node>) -> Node {
        self.multmatrix(TransformOp::Mirror(normal).to_matrix(), children)
    }

    pub fn union(&self, children: Vec<Node>) -> Node {
        Node::boolean(BooleanOp::Union, children)
    }

    pub fn difference(&self, children: Vec<Node>) -> Node {
        Node::boolean(BooleanOp::Difference, children)
    }

    pub fn intersection(&self, children: Vec<Node>) -> Node {
        Node::boolean(BooleanOp::Intersection, children)
    }

    pub fn group(&self, children: Vec<Node>) -> Node {
        Node::group(children)
    }

    pub fn import(&self, path: impl Into<PathBuf>) -> Node {
        Node::import(path, ImportParams::default())
    }

    /// Evaluate a scene tree into a single mesh
    pub fn evaluate(&self, node: &Node) -> Result<Mesh> {
        let start = Instant::now();
        let engine = BooleanEngine::new(self.config.clone()).with_verbosity(self.verbose, self.fine_verbose);
        let mesh = Evaluator::new(engine, &self.cache)
            .with_fine_verbose(self.fine_verbose)
            .evaluate(node)?;

        if self.verbose {
            info!(
                "Evaluated {} nodes into {} vertices, {} triangles in {:?}",
                node.node_count(),
                mesh.vertex_count(),
                mesh.triangle_count(),
                start.elapsed()
            );
        }
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;
    use crate::geometry::mesh_utils::is_closed;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_is_centered() {
        let builder = CsgBuilder::new();
        let mesh = builder.evaluate(&builder.cube(Vec3::new(2.0, 4.0, 6.0))).unwrap();
        let bbox = mesh.bounding_box();
        assert_relative_eq!(bbox.min.x, -1.0);
        assert_relative_eq!(bbox.max.z, 3.0);
    }

    #[test]
    fn test_transform_wraps_several_children() {
        let builder = CsgBuilder::new();
        let node = builder.translate(
            Vec3::new(1.0, 0.0, 0.0),
            vec![builder.sphere(1.0), builder.cube(Vec3::repeat(1.0))],
        );
        match &node.kind {
            NodeKind::Transform { child, .. } => assert!(matches!(child.kind, NodeKind::Group(_))),
            other => panic!("unexpected node {:?}", other),
        }

        let single = builder.scale(Vec3::repeat(2.0), vec![builder.sphere(1.0)]);
        match &single.kind {
            NodeKind::Transform { child, .. } => assert!(matches!(child.kind, NodeKind::Primitive(_))),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_difference_of_centered_cubes() {
        let builder = CsgBuilder::new();
        let tree = builder.difference(vec![
            builder.cube(Vec3::repeat(4.0)),
            builder.cube(Vec3::new(2.0, 2.0, 8.0)),
        ]);
        let mesh = builder.evaluate(&tree).unwrap();
        assert!(is_closed(&mesh));
        assert_relative_eq!(mesh.volume(), 64.0 - 16.0, epsilon = 1e-6);
    }

    #[test]
    fn test_setters_update_config() {
        let mut builder = CsgBuilder::new();
        builder.set_fast_union(true);
        builder.set_noop(true);
        builder.set_simplify_coplanar_facets(false, 0.5);
        assert!(builder.config().fast_union);
        assert!(builder.config().noop);
        assert!(!builder.config().simplify_coplanar_facets);
        assert_eq!(builder.config().coplanar_angle_tolerance, 0.5);
    }

    #[test]
    fn test_noop_concatenates() {
        let mut builder = CsgBuilder::new();
        builder.set_noop(true);
        let a = builder.cube(Vec3::repeat(2.0));
        let b = builder.translate(Vec3::new(1.0, 0.0, 0.0), vec![builder.cube(Vec3::repeat(2.0))]);
        let mesh = builder.evaluate(&builder.union(vec![a, b])).unwrap();
        assert_eq!(mesh.triangle_count(), 24);
    }
}
