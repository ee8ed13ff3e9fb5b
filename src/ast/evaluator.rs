// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scene tree evaluator - converts nodes to geometry.
//!
//! Transforms are multiplied on the way down and applied once to each leaf
//! mesh. Sibling subtrees may be evaluated on the rayon pool; results are
//! always combined in listed order.

use super::{Node, NodeKind};
use crate::error::{CsgError, Result};
use crate::geometry::{BooleanEngine, BooleanOp, Mesh};
use crate::io::ImportCache;
use nalgebra::Matrix4;
use rayon::prelude::*;
use tracing::debug;

/// Post-order evaluator bound to one engine and one import cache
pub struct Evaluator<'a> {
    engine: BooleanEngine,
    cache: &'a ImportCache,
    parallel: bool,
    fine_verbose: bool,
}

impl<'a> Evaluator<'a> {
    pub fn new(engine: BooleanEngine, cache: &'a ImportCache) -> Self {
        let parallel = engine.config().parallel;
        Self {
            engine,
            cache,
            parallel,
            fine_verbose: false,
        }
    }

    pub fn with_fine_verbose(mut self, enabled: bool) -> Self {
        self.fine_verbose = enabled;
        self
    }

    /// Evaluate a node and return its mesh
    pub fn evaluate(&self, node: &Node) -> Result<Mesh> {
        self.evaluate_node(node, &Matrix4::identity())
    }

    fn evaluate_node(&self, node: &Node, transform: &Matrix4<f64>) -> Result<Mesh> {
        match &node.kind {
            NodeKind::Primitive(primitive) => {
                let mesh = primitive.to_mesh().map_err(|e| e.at(node.position))?;
                Ok(apply(mesh, transform))
            }

            NodeKind::Transform { matrix, child } => {
                self.evaluate_node(child, &(transform * matrix))
            }

            NodeKind::Boolean { op, children } => self.evaluate_boolean(node, *op, children, transform),

            NodeKind::Group(children) => self.evaluate_boolean(node, BooleanOp::Union, children, transform),

            NodeKind::Import { path, params } => {
                let mesh = self
                    .cache
                    .resolve_import_with(path, params, self.engine.config())
                    .map_err(|e| e.at(node.position))?;
                Ok(apply(mesh, transform))
            }
        }
    }

    fn evaluate_boolean(
        &self,
        node: &Node,
        op: BooleanOp,
        children: &[Node],
        transform: &Matrix4<f64>,
    ) -> Result<Mesh> {
        if children.is_empty() {
            return Err(CsgError::geometry(node.kind_name(), "needs at least one child").at(node.position));
        }

        let meshes: Vec<Mesh> = if self.parallel && children.len() > 1 {
            children
                .par_iter()
                .map(|child| self.evaluate_node(child, transform))
                .collect::<Result<Vec<_>>>()?
        } else {
            children
                .iter()
                .map(|child| self.evaluate_node(child, transform))
                .collect::<Result<Vec<_>>>()?
        };

        if self.fine_verbose {
            debug!(
                "{} at {}: {} children, {} triangles",
                node.kind_name(),
                node.position.map_or_else(|| "-".to_string(), |p| p.to_string()),
                meshes.len(),
                meshes.iter().map(Mesh::triangle_count).sum::<usize>()
            );
        }

        self.engine.combine(op, meshes).map_err(|e| e.at(node.position))
    }
}

fn apply(mut mesh: Mesh, transform: &Matrix4<f64>) -> Mesh {
    if *transform != Matrix4::identity() {
        mesh.transform(transform);
    }
    mesh
}
