// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boolean mesh engine.
//!
//! Split-and-classify: facets of each operand are cut into convex fragments
//! along the other operand's surface, every fragment is classified against
//! the other solid, and the kept fragments are welded back into a closed
//! mesh.

use super::bvh::BVH;
use super::classification::{Classification, SolidClassifier};
use super::mesh_reconstruction::{
    reconstruct, repair_t_junctions, triangulate_indexed, IndexedPolygon, ReconstructionOptions,
    ReconstructionStats,
};
use super::mesh_utils::{find_boundary_edges, split_components};
use super::polygon::Polygon;
use super::robust_predicates::Plane;
use super::triangle_intersection::{facet_contact, Contact};
use super::{BoundingBox, Mesh};
use crate::config::BuilderConfig;
use crate::error::{CsgError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanOp {
    Union,
    Difference,
    Intersection,
}

impl BooleanOp {
    pub fn name(&self) -> &'static str {
        match self {
            BooleanOp::Union => "union",
            BooleanOp::Difference => "difference",
            BooleanOp::Intersection => "intersection",
        }
    }

    /// Whether a fragment of the first (`from_a`) or second operand survives
    fn keeps(&self, from_a: bool, class: Classification) -> bool {
        use Classification::*;
        match (self, from_a) {
            (BooleanOp::Union, true) => matches!(class, Outside | SameBoundary),
            (BooleanOp::Union, false) => class == Outside,
            (BooleanOp::Intersection, true) => matches!(class, Inside | SameBoundary),
            (BooleanOp::Intersection, false) => class == Inside,
            (BooleanOp::Difference, true) => matches!(class, Outside | OppositeBoundary),
            (BooleanOp::Difference, false) => class == Inside,
        }
    }
}

impl fmt::Display for BooleanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Counters of one pairwise operation
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanStats {
    pub candidate_pairs: usize,
    pub fragments_a: usize,
    pub fragments_b: usize,
    pub kept: usize,
    /// Components passed through untouched by fast union
    pub bypassed_components: usize,
    pub reconstruction: ReconstructionStats,
}

/// Contacting facets of the other operand, per facet
type Candidates = Vec<Vec<(usize, Contact)>>;

/// Distances used by one operation, relative to the size of its operands
#[derive(Debug, Clone, Copy)]
struct Tolerance {
    plane: f64,
    weld: f64,
}

impl Tolerance {
    fn for_boxes(bbox: &BoundingBox) -> Self {
        let diagonal = bbox.diagonal();
        let scale = if diagonal.is_finite() && diagonal > 0.0 {
            diagonal
        } else {
            1.0
        };
        Self {
            plane: 1e-9 * scale,
            weld: 1e-8 * scale,
        }
    }
}

/// Reentrant boolean engine. Holds only an immutable copy of its options.
#[derive(Debug, Clone, Default)]
pub struct BooleanEngine {
    config: BuilderConfig,
    verbose: bool,
    fine_verbose: bool,
}

impl BooleanEngine {
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            verbose: false,
            fine_verbose: false,
        }
    }

    pub fn with_verbosity(mut self, verbose: bool, fine_verbose: bool) -> Self {
        self.verbose = verbose;
        self.fine_verbose = fine_verbose;
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Combine an ordered list of meshes.
    ///
    /// Difference subtracts every later operand from the first one in order;
    /// union and intersection fold left to right.
    pub fn combine(&self, op: BooleanOp, meshes: Vec<Mesh>) -> Result<Mesh> {
        let mut operands = meshes.into_iter();
        let Some(first) = operands.next() else {
            return Ok(Mesh::empty());
        };
        let rest: Vec<Mesh> = operands.collect();
        if rest.is_empty() {
            return Ok(first);
        }

        if self.config.noop {
            let mut result = first;
            for mesh in &rest {
                result.merge(mesh);
            }
            return Ok(result);
        }

        let start = Instant::now();
        let count = rest.len() + 1;
        let mut result = first;
        for operand in &rest {
            result = self.binary(op, &result, operand)?;
        }
        if self.verbose {
            info!(
                "{} of {} operands: {} triangles in {:.2?}",
                op,
                count,
                result.triangle_count(),
                start.elapsed()
            );
        }
        Ok(result)
    }

    /// Combine two meshes
    pub fn binary(&self, op: BooleanOp, a: &Mesh, b: &Mesh) -> Result<Mesh> {
        self.binary_with_stats(op, a, b).map(|(mesh, _)| mesh)
    }

    pub fn binary_with_stats(&self, op: BooleanOp, a: &Mesh, b: &Mesh) -> Result<(Mesh, BooleanStats)> {
        let mut stats = BooleanStats::default();
        if self.config.noop {
            return Ok((Mesh::concat([a, b]), stats));
        }

        if a.is_empty() || b.is_empty() {
            let result = match op {
                BooleanOp::Union if a.is_empty() => b.clone(),
                BooleanOp::Union | BooleanOp::Difference => a.clone(),
                BooleanOp::Intersection => Mesh::empty(),
            };
            return Ok((result, stats));
        }

        let tolerance = Tolerance::for_boxes(&a.bounding_box().union(&b.bounding_box()));
        let prepared_a = prepare_operand(a, "first", tolerance.weld)?;
        let prepared_b = prepare_operand(b, "second", tolerance.weld)?;

        let overlap = prepared_a
            .bounding_box()
            .expanded(tolerance.plane)
            .intersects(&prepared_b.bounding_box());
        if !overlap {
            if self.fine_verbose {
                debug!("{}: operand bounding boxes are disjoint", op);
            }
            let result = match op {
                BooleanOp::Union => Mesh::concat([a, b]),
                BooleanOp::Intersection => Mesh::empty(),
                BooleanOp::Difference => a.clone(),
            };
            return Ok((result, stats));
        }
        let (a, b) = (&prepared_a, &prepared_b);

        let result = if op == BooleanOp::Union && self.config.fast_union {
            self.fast_union(a, b, tolerance, &mut stats)?
        } else {
            self.split_and_classify(op, a, b, tolerance, &mut stats)?
        };

        let open = find_boundary_edges(&result);
        if !open.is_empty() {
            return Err(CsgError::topology(format!(
                "{} produced an open surface with {} boundary edges",
                op,
                open.len()
            )));
        }

        if self.fine_verbose {
            debug!(
                "{}: {} candidate pairs, {}+{} fragments, {} kept, {} t-junctions, {} merges, {} triangles",
                op,
                stats.candidate_pairs,
                stats.fragments_a,
                stats.fragments_b,
                stats.kept,
                stats.reconstruction.t_junctions,
                stats.reconstruction.merged,
                result.triangle_count()
            );
        }
        Ok((result, stats))
    }

    /// Union that passes through components not touching the other operand
    fn fast_union(
        &self,
        a: &Mesh,
        b: &Mesh,
        tolerance: Tolerance,
        stats: &mut BooleanStats,
    ) -> Result<Mesh> {
        let (touching_a, free_a) = self.partition_components(a, b, tolerance);
        let (touching_b, free_b) = self.partition_components(b, a, tolerance);
        stats.bypassed_components = free_a.len() + free_b.len();
        if self.fine_verbose {
            debug!(
                "fast union: {} components bypass classification",
                stats.bypassed_components
            );
        }

        let core = if touching_a.is_empty() || touching_b.is_empty() {
            Mesh::concat(touching_a.iter().chain(&touching_b))
        } else {
            let a = Mesh::concat(&touching_a);
            let b = Mesh::concat(&touching_b);
            self.split_and_classify(BooleanOp::Union, &a, &b, tolerance, stats)?
        };

        let mut result = Mesh::concat(free_a.iter().chain(&free_b));
        result.merge(&core);
        Ok(result)
    }

    /// Split `mesh` into components that touch `other` and components that do not
    fn partition_components(
        &self,
        mesh: &Mesh,
        other: &Mesh,
        tolerance: Tolerance,
    ) -> (Vec<Mesh>, Vec<Mesh>) {
        let other_box = other.bounding_box();
        let bvh = BVH::from_mesh(other, tolerance.plane);
        split_components(mesh).into_iter().partition(|component| {
            component
                .bounding_box()
                .expanded(tolerance.plane)
                .intersects(&other_box)
                && (0..component.triangle_count()).any(|t| {
                    let points = component.triangle_points(t);
                    bvh.query(&BoundingBox::from_points(&points))
                        .into_iter()
                        .any(|j| {
                            facet_contact(&points, &other.triangle_points(j), tolerance.plane)
                                != Contact::None
                        })
                })
        })
    }

    fn split_and_classify(
        &self,
        op: BooleanOp,
        a: &Mesh,
        b: &Mesh,
        tolerance: Tolerance,
        stats: &mut BooleanStats,
    ) -> Result<Mesh> {
        let eps = tolerance.plane;
        let (candidates_a, candidates_b) = self.find_candidates(a, b, eps);
        stats.candidate_pairs = candidates_a.iter().map(Vec::len).sum();

        let planes_a = facet_planes(a);
        let planes_b = facet_planes(b);
        let fragments_a = self.split_mesh(a, &candidates_a, b, &planes_b, eps);
        let fragments_b = self.split_mesh(b, &candidates_b, a, &planes_a, eps);
        stats.fragments_a = fragments_a.len();
        stats.fragments_b = fragments_b.len();

        let classes_a = self.classify(&fragments_a, b, eps);
        let classes_b = self.classify(&fragments_b, a, eps);

        let mut kept = Vec::with_capacity(fragments_a.len() + fragments_b.len());
        for (fragment, class) in fragments_a.into_iter().zip(classes_a) {
            if op.keeps(true, class) {
                kept.push(fragment);
            }
        }
        for (mut fragment, class) in fragments_b.into_iter().zip(classes_b) {
            if op.keeps(false, class) {
                if op == BooleanOp::Difference {
                    fragment.flip();
                }
                kept.push(fragment);
            }
        }
        stats.kept = kept.len();

        let options = ReconstructionOptions {
            weld_epsilon: tolerance.weld,
            simplify_coplanar_facets: self.config.simplify_coplanar_facets,
            coplanar_angle_tolerance: self.config.coplanar_angle_tolerance,
            delaunay: self.config.delaunay,
        };
        let (mesh, reconstruction) = reconstruct(&kept, &options);
        stats.reconstruction = reconstruction;
        Ok(mesh)
    }

    /// Contacting facet pairs, listed per facet of `a` and per facet of `b`
    fn find_candidates(&self, a: &Mesh, b: &Mesh, eps: f64) -> (Candidates, Candidates) {
        let bvh = self
            .config
            .detect_intersecting_neighbors
            .then(|| BVH::from_mesh(b, eps));

        let contacts_of = |i: usize| -> Vec<(usize, Contact)> {
            let points = a.triangle_points(i);
            let neighbors: Vec<usize> = match &bvh {
                Some(bvh) => bvh.query(&BoundingBox::from_points(&points)),
                None => (0..b.triangle_count()).collect(),
            };
            neighbors
                .into_iter()
                .filter_map(|j| match facet_contact(&points, &b.triangle_points(j), eps) {
                    Contact::None => None,
                    contact => Some((j, contact)),
                })
                .collect()
        };
        let candidates_a: Candidates = self.map_indices(a.triangle_count(), contacts_of);

        let mut candidates_b = vec![Vec::new(); b.triangle_count()];
        for (i, contacts) in candidates_a.iter().enumerate() {
            for &(j, contact) in contacts {
                candidates_b[j].push((i, contact));
            }
        }
        (candidates_a, candidates_b)
    }

    /// Cut every facet of `mesh` against its contacting facets of `other`
    fn split_mesh(
        &self,
        mesh: &Mesh,
        candidates: &[Vec<(usize, Contact)>],
        other: &Mesh,
        other_planes: &[Option<Plane>],
        eps: f64,
    ) -> Vec<Polygon> {
        let pieces = self.map_indices(mesh.triangle_count(), |t| {
            let Some(facet) = Polygon::from_triangle(mesh.triangle_points(t)) else {
                return Vec::new();
            };
            let mut pieces = vec![facet];
            for &(j, contact) in &candidates[t] {
                let Some(plane) = other_planes[j] else {
                    continue;
                };
                let points = other.triangle_points(j);
                let reach = BoundingBox::from_points(&points).expanded(eps);
                let cuts: Vec<Plane> = match contact {
                    Contact::None => Vec::new(),
                    Contact::Crossing => vec![plane],
                    Contact::Coplanar => (0..3)
                        .filter_map(|k| plane.edge_plane(points[k], points[(k + 1) % 3]))
                        .collect(),
                };
                for cut in &cuts {
                    pieces = pieces
                        .into_iter()
                        .flat_map(|piece| {
                            if !piece.bounding_box().intersects(&reach) {
                                return vec![piece];
                            }
                            let (front, back) = piece.split(cut, eps);
                            front.into_iter().chain(back).collect()
                        })
                        .collect();
                }
            }
            pieces
        });
        pieces.into_iter().flatten().collect()
    }

    fn classify(&self, fragments: &[Polygon], other: &Mesh, eps: f64) -> Vec<Classification> {
        let classifier = SolidClassifier::new(other, eps);
        self.map_indices(fragments.len(), |f| {
            let fragment = &fragments[f];
            classifier.classify(&fragment.centroid(), &fragment.plane.normal)
        })
    }

    /// Map over `0..n`, on the rayon pool when parallel evaluation is enabled.
    /// Output order is the index order either way.
    fn map_indices<T, F>(&self, n: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        if self.config.parallel {
            (0..n).into_par_iter().map(f).collect()
        } else {
            (0..n).map(f).collect()
        }
    }
}

fn facet_planes(mesh: &Mesh) -> Vec<Option<Plane>> {
    (0..mesh.triangle_count())
        .map(|t| {
            let [a, b, c] = mesh.triangle_points(t);
            Plane::from_points(a, b, c)
        })
        .collect()
}

/// Weld, drop degenerate facets, repair T-junctions and require a closed surface
fn prepare_operand(mesh: &Mesh, role: &str, weld_epsilon: f64) -> Result<Mesh> {
    mesh.validate()
        .map_err(|e| CsgError::topology(format!("{} operand: {}", role, e)))?;

    let mut prepared = mesh.clone();
    prepared.weld_vertices(weld_epsilon);
    prepared.remove_degenerate_triangles();

    let mut polygons: Vec<IndexedPolygon> = Vec::with_capacity(prepared.triangle_count());
    for t in 0..prepared.triangle_count() {
        let [p0, p1, p2] = prepared.triangle_points(t);
        if let Some(plane) = Plane::from_points(p0, p1, p2) {
            polygons.push(IndexedPolygon {
                indices: prepared.triangles[t].indices.to_vec(),
                normal: plane.normal,
            });
        }
    }
    let dropped = prepared.triangle_count() - polygons.len();
    let repaired = repair_t_junctions(&prepared.vertices, &mut polygons, weld_epsilon);
    if dropped > 0 || repaired > 0 {
        let mut triangles = Vec::with_capacity(polygons.len() + repaired);
        for polygon in &polygons {
            triangulate_indexed(&prepared.vertices, polygon, false, weld_epsilon, &mut triangles);
        }
        prepared.triangles = triangles;
        prepared.remove_degenerate_triangles();
    }
    prepared.remove_orphaned_vertices();

    let open = find_boundary_edges(&prepared);
    if !open.is_empty() {
        return Err(CsgError::topology(format!(
            "{} operand is not closed: {} boundary edges",
            role,
            open.len()
        )));
    }
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::mesh_utils::is_closed;
    use crate::geometry::Primitive;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Vector3};

    fn cube_at(size: f64, offset: [f64; 3]) -> Mesh {
        Primitive::cube(Vector3::new(size, size, size), false)
            .to_mesh()
            .unwrap()
            .transformed(&Matrix4::new_translation(&Vector3::new(offset[0], offset[1], offset[2])))
    }

    fn engine() -> BooleanEngine {
        BooleanEngine::new(BuilderConfig::default())
    }

    #[test]
    fn test_overlapping_cubes() {
        let a = cube_at(2.0, [0.0, 0.0, 0.0]);
        let b = cube_at(2.0, [1.0, 1.0, 1.0]);
        let engine = engine();

        let union = engine.binary(BooleanOp::Union, &a, &b).unwrap();
        assert!(is_closed(&union));
        assert_relative_eq!(union.volume(), 15.0, epsilon = 1e-9);

        let intersection = engine.binary(BooleanOp::Intersection, &a, &b).unwrap();
        assert!(is_closed(&intersection));
        assert_relative_eq!(intersection.volume(), 1.0, epsilon = 1e-9);

        let difference = engine.binary(BooleanOp::Difference, &a, &b).unwrap();
        assert!(is_closed(&difference));
        assert_relative_eq!(difference.volume(), 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_face_sharing_cubes() {
        let a = cube_at(1.0, [0.0, 0.0, 0.0]);
        let b = cube_at(1.0, [1.0, 0.0, 0.0]);
        let union = engine().binary(BooleanOp::Union, &a, &b).unwrap();
        assert!(is_closed(&union));
        assert_relative_eq!(union.volume(), 2.0, epsilon = 1e-9);
        // The shared wall is gone and the outer faces merge into rectangles
        assert_relative_eq!(union.surface_area(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_difference_through_hole() {
        let a = cube_at(3.0, [0.0, 0.0, 0.0]);
        let bar = Primitive::cube(Vector3::new(1.0, 1.0, 5.0), false)
            .to_mesh()
            .unwrap()
            .transformed(&Matrix4::new_translation(&Vector3::new(1.0, 1.0, -1.0)));
        let result = engine().binary(BooleanOp::Difference, &a, &bar).unwrap();
        assert!(is_closed(&result));
        assert_relative_eq!(result.volume(), 27.0 - 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_disjoint_shortcuts() {
        let a = cube_at(1.0, [0.0, 0.0, 0.0]);
        let b = cube_at(1.0, [5.0, 0.0, 0.0]);
        let engine = engine();
        let union = engine.binary(BooleanOp::Union, &a, &b).unwrap();
        assert_eq!(union.triangle_count(), 24);
        assert!(engine.binary(BooleanOp::Intersection, &a, &b).unwrap().is_empty());
        assert_eq!(engine.binary(BooleanOp::Difference, &a, &b).unwrap(), a);
    }

    #[test]
    fn test_empty_operands() {
        let a = cube_at(1.0, [0.0, 0.0, 0.0]);
        let empty = Mesh::empty();
        let engine = engine();
        assert_eq!(engine.binary(BooleanOp::Union, &empty, &a).unwrap(), a);
        assert_eq!(engine.binary(BooleanOp::Difference, &a, &empty).unwrap(), a);
        assert!(engine.binary(BooleanOp::Difference, &empty, &a).unwrap().is_empty());
        assert!(engine.binary(BooleanOp::Intersection, &a, &empty).unwrap().is_empty());
        assert!(engine.combine(BooleanOp::Union, Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_open_operand_is_rejected() {
        let a = cube_at(2.0, [0.0, 0.0, 0.0]);
        let mut open = cube_at(2.0, [1.0, 1.0, 1.0]);
        open.triangles.pop();
        let err = engine().binary(BooleanOp::Union, &a, &open).unwrap_err();
        assert!(matches!(err, CsgError::MeshTopology { .. }));
    }

    #[test]
    fn test_noop_concatenates() {
        let a = cube_at(2.0, [0.0, 0.0, 0.0]);
        let b = cube_at(2.0, [1.0, 1.0, 1.0]);
        let engine = BooleanEngine::new(BuilderConfig::default().with_noop(true));
        let result = engine.combine(BooleanOp::Intersection, vec![a, b]).unwrap();
        assert_eq!(result.triangle_count(), 24);
    }

    #[test]
    fn test_neighbor_detection_does_not_change_result() {
        let a = cube_at(2.0, [0.0, 0.0, 0.0]);
        let b = Primitive::sphere(1.5).to_mesh().unwrap();
        let with = engine().binary(BooleanOp::Difference, &a, &b).unwrap();
        let without = BooleanEngine::new(
            BuilderConfig::default().with_detect_intersecting_neighbors(false),
        )
        .binary(BooleanOp::Difference, &a, &b)
        .unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let a = Primitive::sphere(2.0).to_mesh().unwrap();
        let b = cube_at(2.0, [0.0, 0.0, 0.0]);
        let parallel = engine().binary(BooleanOp::Intersection, &a, &b).unwrap();
        let sequential = BooleanEngine::new(BuilderConfig::default().with_parallel(false))
            .binary(BooleanOp::Intersection, &a, &b)
            .unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_fast_union_bypasses_far_components() {
        let mut a = cube_at(2.0, [0.0, 0.0, 0.0]);
        a.merge(&cube_at(1.0, [10.0, 0.0, 0.0]));
        let b = cube_at(2.0, [1.0, 1.0, 1.0]);

        let fast_engine = BooleanEngine::new(BuilderConfig::default().with_fast_union(true));
        let (fast, stats) = fast_engine.binary_with_stats(BooleanOp::Union, &a, &b).unwrap();
        assert_eq!(stats.bypassed_components, 1);
        assert!(is_closed(&fast));

        let full = engine().binary(BooleanOp::Union, &a, &b).unwrap();
        assert_relative_eq!(fast.volume(), full.volume(), epsilon = 1e-9);
        assert_relative_eq!(fast.volume(), 16.0, epsilon = 1e-9);
    }
}
