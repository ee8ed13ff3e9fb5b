// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh validation and connectivity utilities

use super::{Mesh, Triangle};
use ahash::AHashMap;

/// Undirected edge for connectivity checking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub v0: usize,
    pub v1: usize,
}

impl Edge {
    pub fn new(v0: usize, v1: usize) -> Self {
        // Always store edges with smaller index first for consistent hashing
        if v0 < v1 {
            Self { v0, v1 }
        } else {
            Self { v0: v1, v1: v0 }
        }
    }
}

/// Signed use count per undirected edge: +1 for each traversal from the lower
/// to the higher index, -1 for the opposite direction
fn directed_balance(mesh: &Mesh) -> AHashMap<Edge, (i64, u32)> {
    let mut balance: AHashMap<Edge, (i64, u32)> = AHashMap::new();
    for triangle in &mesh.triangles {
        for (a, b) in triangle.edges() {
            let entry = balance.entry(Edge::new(a, b)).or_insert((0, 0));
            entry.0 += if a < b { 1 } else { -1 };
            entry.1 += 1;
        }
    }
    balance
}

/// Check if mesh is manifold (each edge shared by exactly 2 triangles with opposite directions)
pub fn is_manifold(mesh: &Mesh) -> bool {
    directed_balance(mesh)
        .values()
        .all(|&(balance, count)| count == 2 && balance == 0)
}

/// Check if mesh is closed: every directed edge is matched by a reversed one.
///
/// Edges touching more than two facets are accepted as long as they balance.
pub fn is_closed(mesh: &Mesh) -> bool {
    directed_balance(mesh).values().all(|&(balance, _)| balance == 0)
}

/// Find all unbalanced edges, in index order
pub fn find_boundary_edges(mesh: &Mesh) -> Vec<Edge> {
    let mut edges: Vec<Edge> = directed_balance(mesh)
        .into_iter()
        .filter(|(_, (balance, _))| *balance != 0)
        .map(|(edge, _)| edge)
        .collect();
    edges.sort();
    edges
}

/// Group triangles sharing vertices. Components are ordered by their first triangle.
pub fn connected_components(mesh: &Mesh) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..mesh.vertices.len()).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for triangle in &mesh.triangles {
        let [a, b, c] = triangle.indices;
        for other in [b, c] {
            let (ra, ro) = (find(&mut parent, a), find(&mut parent, other));
            if ra != ro {
                parent[ra.max(ro)] = ra.min(ro);
            }
        }
    }

    let mut slot: AHashMap<usize, usize> = AHashMap::new();
    let mut components: Vec<Vec<usize>> = Vec::new();
    for (t, triangle) in mesh.triangles.iter().enumerate() {
        let root = find(&mut parent, triangle.indices[0]);
        let index = *slot.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[index].push(t);
    }
    components
}

/// Split a mesh into one mesh per connected component
pub fn split_components(mesh: &Mesh) -> Vec<Mesh> {
    connected_components(mesh)
        .into_iter()
        .map(|triangles| {
            let mut part = Mesh::from_parts(
                mesh.vertices.clone(),
                triangles.iter().map(|&t| mesh.triangles[t]).collect::<Vec<Triangle>>(),
            );
            part.remove_orphaned_vertices();
            part
        })
        .collect()
}
