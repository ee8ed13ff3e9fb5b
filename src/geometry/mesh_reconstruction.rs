// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh reconstruction from boolean fragments.
//! Welds fragment vertices, repairs T-junctions, merges coplanar polygons
//! and retriangulates.

use super::mesh::weld_points;
use super::polygon::Polygon;
use super::triangulation::triangulate_polygon;
use super::{Mesh, Triangle};
use crate::utils::math::project_to_2d;
use ahash::{AHashMap, AHashSet};
use nalgebra::{Point3, Vector3};

/// Settings for [`reconstruct`]
#[derive(Debug, Clone, Copy)]
pub struct ReconstructionOptions {
    /// Distance under which vertices are merged
    pub weld_epsilon: f64,
    pub simplify_coplanar_facets: bool,
    /// Degrees
    pub coplanar_angle_tolerance: f64,
    pub delaunay: bool,
}

/// Polygon over shared vertex indices, with the normal of its source facet
#[derive(Debug, Clone)]
pub struct IndexedPolygon {
    pub indices: Vec<usize>,
    pub normal: Vector3<f64>,
}

/// Counters reported by the boolean engine in fine-verbose mode
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconstructionStats {
    pub polygons: usize,
    pub t_junctions: usize,
    pub merged: usize,
    pub triangles: usize,
}

/// Build a triangle mesh from oriented convex fragments
pub fn reconstruct(polygons: &[Polygon], options: &ReconstructionOptions) -> (Mesh, ReconstructionStats) {
    let mut stats = ReconstructionStats::default();

    let points: Vec<Point3<f64>> = polygons.iter().flat_map(|p| p.points.iter().copied()).collect();
    let (vertices, remap) = weld_points(&points, options.weld_epsilon);

    let mut indexed = Vec::with_capacity(polygons.len());
    let mut offset = 0;
    for polygon in polygons {
        let mut indices: Vec<usize> = Vec::with_capacity(polygon.points.len());
        for k in 0..polygon.points.len() {
            let index = remap[offset + k];
            if indices.last() != Some(&index) {
                indices.push(index);
            }
        }
        offset += polygon.points.len();
        while indices.len() > 1 && indices.first() == indices.last() {
            indices.pop();
        }
        if indices.len() >= 3 {
            indexed.push(IndexedPolygon {
                indices,
                normal: polygon.plane.normal,
            });
        }
    }
    stats.polygons = indexed.len();

    stats.t_junctions = repair_t_junctions(&vertices, &mut indexed, options.weld_epsilon);

    if options.simplify_coplanar_facets {
        stats.merged = merge_coplanar_polygons(
            &vertices,
            &mut indexed,
            options.coplanar_angle_tolerance,
            options.weld_epsilon,
        );
    }

    let mut triangles = Vec::new();
    for polygon in &indexed {
        triangulate_indexed(
            &vertices,
            polygon,
            options.delaunay,
            options.weld_epsilon,
            &mut triangles,
        );
    }

    let mut mesh = Mesh::from_parts(vertices, triangles);
    mesh.remove_degenerate_triangles();
    mesh.remove_orphaned_vertices();
    stats.triangles = mesh.triangle_count();
    (mesh, stats)
}

/// Triangulate one polygon, appending mesh triangles. Corners within
/// `flat_tolerance` of a straight line are not clipped as ears.
pub fn triangulate_indexed(
    vertices: &[Point3<f64>],
    polygon: &IndexedPolygon,
    delaunay: bool,
    flat_tolerance: f64,
    out: &mut Vec<Triangle>,
) {
    let projected: Vec<[f64; 2]> = polygon
        .indices
        .iter()
        .map(|&i| project_to_2d(&vertices[i], &polygon.normal))
        .collect();
    for [a, b, c] in triangulate_polygon(&projected, delaunay, flat_tolerance) {
        out.push(Triangle::new([
            polygon.indices[a],
            polygon.indices[b],
            polygon.indices[c],
        ]));
    }
}

/// Insert vertices that lie on unmatched polygon edges into those edges.
/// Edges whose reverse is present, and a polygon's own vertices, are left
/// alone. Returns the number of insertions.
pub fn repair_t_junctions(vertices: &[Point3<f64>], polygons: &mut [IndexedPolygon], eps: f64) -> usize {
    let mut used = vec![false; vertices.len()];
    for polygon in polygons.iter() {
        for &i in &polygon.indices {
            used[i] = true;
        }
    }
    let mut order: Vec<usize> = (0..vertices.len()).filter(|&i| used[i]).collect();
    order.sort_by(|&a, &b| vertices[a].x.total_cmp(&vertices[b].x));
    let xs: Vec<f64> = order.iter().map(|&i| vertices[i].x).collect();
    let edges: AHashSet<(usize, usize)> = polygons
        .iter()
        .flat_map(|polygon| polygon_edges(&polygon.indices))
        .collect();

    let mut inserted = 0;
    for polygon in polygons.iter_mut() {
        let n = polygon.indices.len();
        let mut repaired = Vec::with_capacity(n);
        for k in 0..n {
            let u = polygon.indices[k];
            let v = polygon.indices[(k + 1) % n];
            repaired.push(u);
            if edges.contains(&(v, u)) {
                continue;
            }

            let (pu, pv) = (vertices[u], vertices[v]);
            let edge = pv - pu;
            let length_sq = edge.norm_squared();
            if length_sq <= eps * eps {
                continue;
            }
            let lo = pu.x.min(pv.x) - eps;
            let hi = pu.x.max(pv.x) + eps;
            let start = xs.partition_point(|&x| x < lo);

            let mut on_edge: Vec<(f64, usize)> = Vec::new();
            for (&x, &w) in xs[start..].iter().zip(&order[start..]) {
                if x > hi {
                    break;
                }
                if polygon.indices.contains(&w) {
                    continue;
                }
                let pw = vertices[w];
                let t = (pw - pu).dot(&edge) / length_sq;
                if t <= 0.0 || t >= 1.0 {
                    continue;
                }
                if (pu + edge * t - pw).norm() <= eps {
                    on_edge.push((t, w));
                }
            }

            on_edge.sort_by(|a, b| a.0.total_cmp(&b.0));
            inserted += on_edge.len();
            repaired.extend(on_edge.into_iter().map(|(_, w)| w));
        }
        polygon.indices = repaired;
    }
    inserted
}

/// Greedily merge edge-adjacent polygons lying in the same plane while the
/// result stays convex. Returns the number of merges.
pub fn merge_coplanar_polygons(
    vertices: &[Point3<f64>],
    polygons: &mut Vec<IndexedPolygon>,
    angle_tolerance: f64,
    eps: f64,
) -> usize {
    let mut edge_counts: AHashMap<(usize, usize), usize> = AHashMap::new();
    let mut owner: AHashMap<(usize, usize), usize> = AHashMap::new();
    for (p, polygon) in polygons.iter().enumerate() {
        for edge in polygon_edges(&polygon.indices) {
            *edge_counts.entry(edge).or_insert(0) += 1;
            owner.insert(edge, p);
        }
    }

    let cos_tolerance = angle_tolerance.max(0.0).to_radians().cos();
    let mut alive = vec![true; polygons.len()];
    let mut merges = 0;

    for p in 0..polygons.len() {
        if !alive[p] {
            continue;
        }
        'grow: loop {
            let edges = polygon_edges(&polygons[p].indices);
            for (u, v) in edges {
                if edge_counts.get(&(u, v)) != Some(&1) || edge_counts.get(&(v, u)) != Some(&1) {
                    continue;
                }
                let Some(&q) = owner.get(&(v, u)) else {
                    continue;
                };
                if q == p || !alive[q] {
                    continue;
                }
                if !are_coplanar(vertices, &polygons[p], &polygons[q], cos_tolerance, eps) {
                    continue;
                }
                let Some(merged) = splice(&polygons[p].indices, &polygons[q].indices, u, v) else {
                    continue;
                };
                if !is_convex(vertices, &merged, &polygons[p].normal, eps) {
                    continue;
                }

                for edge in [(u, v), (v, u)] {
                    edge_counts.remove(&edge);
                    owner.remove(&edge);
                }
                for edge in polygon_edges(&merged) {
                    owner.insert(edge, p);
                }
                polygons[p].indices = merged;
                alive[q] = false;
                merges += 1;
                continue 'grow;
            }
            break;
        }
    }

    let mut k = 0;
    polygons.retain(|_| {
        k += 1;
        alive[k - 1]
    });
    merges
}

fn polygon_edges(indices: &[usize]) -> Vec<(usize, usize)> {
    let n = indices.len();
    (0..n).map(|k| (indices[k], indices[(k + 1) % n])).collect()
}

fn are_coplanar(
    vertices: &[Point3<f64>],
    p: &IndexedPolygon,
    q: &IndexedPolygon,
    cos_tolerance: f64,
    eps: f64,
) -> bool {
    let dot = p.normal.dot(&q.normal);
    if dot <= 0.0 {
        return false;
    }
    if dot >= cos_tolerance && cos_tolerance < 1.0 {
        return true;
    }
    let origin = vertices[p.indices[0]];
    q.indices
        .iter()
        .all(|&i| p.normal.dot(&(vertices[i] - origin)).abs() <= eps)
}

/// Join `p` (containing edge u -> v) and `q` (containing v -> u) along that edge
fn splice(p: &[usize], q: &[usize], u: usize, v: usize) -> Option<Vec<usize>> {
    let np = p.len();
    let nq = q.len();
    let kp = (0..np).find(|&k| p[k] == u && p[(k + 1) % np] == v)?;
    let kq = (0..nq).find(|&k| q[k] == v && q[(k + 1) % nq] == u)?;

    let mut merged = Vec::with_capacity(np + nq - 2);
    for k in 0..np {
        merged.push(p[(kp + 1 + k) % np]);
    }
    for k in 0..nq - 2 {
        merged.push(q[(kq + 2 + k) % nq]);
    }

    let mut seen = AHashSet::with_capacity(merged.len());
    merged.iter().all(|i| seen.insert(*i)).then_some(merged)
}

/// Convex up to `eps`: no vertex bends inward by more than `eps`
fn is_convex(vertices: &[Point3<f64>], indices: &[usize], normal: &Vector3<f64>, eps: f64) -> bool {
    let n = indices.len();
    (0..n).all(|k| {
        let a = vertices[indices[(k + n - 1) % n]];
        let b = vertices[indices[k]];
        let c = vertices[indices[(k + 1) % n]];
        let chord = c - a;
        let length = chord.norm();
        if length <= f64::MIN_POSITIVE {
            return false;
        }
        // Signed distance of b from chord a-c, positive when b bulges outward
        let outward = chord.cross(normal) / length;
        outward.dot(&(b - a)) >= -eps
    })
}
