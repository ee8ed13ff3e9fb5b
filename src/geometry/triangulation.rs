// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polygon triangulation: ear clipping followed by optional Lawson flips.
//!
//! Works on 2D projections and returns triangles as local vertex indices in
//! the winding order of the input polygon. Polygon edges are never flipped,
//! so the flipped result is a constrained Delaunay triangulation.

use super::robust_predicates::{in_circle, orient_2d};
use ahash::AHashMap;

/// Triangulate a simple polygon given by its projected vertices.
///
/// Corners within `flat_tolerance` of the chord joining their neighbors are
/// treated as collinear and are only clipped when nothing else is left.
pub fn triangulate_polygon(
    points: &[[f64; 2]],
    delaunay: bool,
    flat_tolerance: f64,
) -> Vec<[usize; 3]> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }
    if n == 3 {
        if orient_2d(points[0], points[1], points[2]) == 0.0 {
            return Vec::new();
        }
        return vec![[0, 1, 2]];
    }

    let sign = polygon_area_sign(points);
    if sign == 0.0 {
        return Vec::new();
    }

    let mut triangles = ear_clip(points, sign, flat_tolerance.max(0.0));
    if delaunay && triangles.len() > 1 {
        lawson_flip(points, &mut triangles, sign);
    }
    triangles
}

fn polygon_area_sign(points: &[[f64; 2]]) -> f64 {
    let n = points.len();
    let mut area = 0.0;
    for i in 0..n {
        let [x0, y0] = points[i];
        let [x1, y1] = points[(i + 1) % n];
        area += x0 * y1 - x1 * y0;
    }
    if area > 0.0 {
        1.0
    } else if area < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn ear_clip(points: &[[f64; 2]], sign: f64, tolerance: f64) -> Vec<[usize; 3]> {
    let mut remaining: Vec<usize> = (0..points.len()).collect();
    let mut triangles = Vec::with_capacity(points.len() - 2);

    while remaining.len() > 3 {
        let m = remaining.len();
        let mut ear = None;
        let mut fallback: Option<(usize, f64)> = None;
        let mut last_resort: Option<(usize, f64)> = None;

        for i in 0..m {
            let [prev, cur, next] = corner(&remaining, i);
            let turn = orient_2d(points[prev], points[cur], points[next]) * sign;
            if turn <= 0.0 || is_flat(points[prev], points[cur], points[next], tolerance) {
                continue;
            }
            if last_resort.map_or(true, |(_, best)| turn > best) {
                last_resort = Some((i, turn));
            }
            // Clipping here would strand the other vertices on one line
            if leaves_collinear(points, &remaining, i, tolerance) {
                continue;
            }
            if fallback.map_or(true, |(_, best)| turn > best) {
                fallback = Some((i, turn));
            }
            let blocked = remaining.iter().any(|&q| {
                q != prev
                    && q != cur
                    && q != next
                    && in_closed_triangle(points, [prev, cur, next], q, sign)
            });
            if !blocked {
                ear = Some(i);
                break;
            }
        }

        // No clean ear left: clip the most convex corner
        let Some(i) = ear
            .or(fallback.map(|(i, _)| i))
            .or(last_resort.map(|(i, _)| i))
        else {
            break;
        };
        triangles.push(corner(&remaining, i));
        remaining.remove(i);
    }

    let closing = remaining.len() == 3
        && !is_flat(points[remaining[0]], points[remaining[1]], points[remaining[2]], tolerance);
    if closing {
        triangles.push([remaining[0], remaining[1], remaining[2]]);
    } else if remaining.len() >= 3 {
        absorb_collinear(points, &mut triangles, &remaining, tolerance);
    }
    triangles
}

/// Previous, current and next vertex around position `i`
fn corner(remaining: &[usize], i: usize) -> [usize; 3] {
    let m = remaining.len();
    [remaining[(i + m - 1) % m], remaining[i], remaining[(i + 1) % m]]
}

fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (b[0] - a[0]).hypot(b[1] - a[1])
}

/// Smallest height of the triangle is within `tolerance`
fn is_flat(a: [f64; 2], b: [f64; 2], c: [f64; 2], tolerance: f64) -> bool {
    let doubled_area = orient_2d(a, b, c);
    if doubled_area == 0.0 {
        return true;
    }
    let longest = distance(a, b).max(distance(b, c)).max(distance(c, a));
    doubled_area.abs() / longest <= tolerance
}

/// Whether all vertices but the one at position `i` lie within `tolerance`
/// of a single line
fn leaves_collinear(points: &[[f64; 2]], remaining: &[usize], i: usize, tolerance: f64) -> bool {
    let rest: Vec<[f64; 2]> = remaining
        .iter()
        .enumerate()
        .filter(|&(k, _)| k != i)
        .map(|(_, &q)| points[q])
        .collect();
    let a = rest[0];
    let far = rest
        .iter()
        .copied()
        .max_by(|p, q| distance(a, *p).total_cmp(&distance(a, *q)))
        .unwrap_or(a);
    let length = distance(a, far);
    if length == 0.0 {
        return true;
    }
    rest.iter()
        .all(|&p| orient_2d(a, far, p).abs() / length <= tolerance)
}

/// `p` lies within `tolerance` of the open segment a-b
fn strictly_between(a: [f64; 2], b: [f64; 2], p: [f64; 2], tolerance: f64) -> bool {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 || orient_2d(a, b, p).abs() / length_sq.sqrt() > tolerance {
        return false;
    }
    let along = (p[0] - a[0]) * dx + (p[1] - a[1]) * dy;
    along > 0.0 && along < length_sq
}

/// Split the triangles whose edges run through vertices of a flat remainder,
/// so that every vertex of the chain ends up in the fan
fn absorb_collinear(
    points: &[[f64; 2]],
    triangles: &mut Vec<[usize; 3]>,
    chain: &[usize],
    tolerance: f64,
) {
    for &w in chain {
        let hit = triangles.iter().enumerate().find_map(|(t, tri)| {
            if tri.contains(&w) {
                return None;
            }
            (0..3).find_map(|k| {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                strictly_between(points[a], points[b], points[w], tolerance).then_some((t, k))
            })
        });
        let Some((t, k)) = hit else {
            continue;
        };
        let tri = triangles[t];
        let (a, b, c) = (tri[k], tri[(k + 1) % 3], tri[(k + 2) % 3]);
        triangles[t] = [a, w, c];
        triangles.push([w, b, c]);
    }
}

fn in_closed_triangle(points: &[[f64; 2]], [a, b, c]: [usize; 3], q: usize, sign: f64) -> bool {
    let p = points[q];
    orient_2d(points[a], points[b], p) * sign >= 0.0
        && orient_2d(points[b], points[c], p) * sign >= 0.0
        && orient_2d(points[c], points[a], p) * sign >= 0.0
}

fn lawson_flip(points: &[[f64; 2]], triangles: &mut [[usize; 3]], sign: f64) {
    let n = points.len();
    let is_boundary = |a: usize, b: usize| (a + 1) % n == b || (b + 1) % n == a;
    let max_flips = 4 * n * n;
    let mut flips = 0;

    loop {
        // Directed edge -> (triangle, opposite vertex)
        let mut edges: AHashMap<(usize, usize), (usize, usize)> = AHashMap::new();
        for (t, tri) in triangles.iter().enumerate() {
            for k in 0..3 {
                edges.insert((tri[k], tri[(k + 1) % 3]), (t, tri[(k + 2) % 3]));
            }
        }

        let mut flipped = false;
        for t in 0..triangles.len() {
            for k in 0..3 {
                let tri = triangles[t];
                let (a, b, c) = (tri[k], tri[(k + 1) % 3], tri[(k + 2) % 3]);
                if is_boundary(a, b) {
                    continue;
                }
                let Some(&(u, d)) = edges.get(&(b, a)) else {
                    continue;
                };
                if u == t {
                    continue;
                }
                if in_circle(points[a], points[b], points[c], points[d]) * sign <= 0.0 {
                    continue;
                }
                // Quad a, d, b, c must be strictly convex
                if orient_2d(points[a], points[d], points[c]) * sign <= 0.0
                    || orient_2d(points[d], points[b], points[c]) * sign <= 0.0
                {
                    continue;
                }
                triangles[t] = [a, d, c];
                triangles[u] = [d, b, c];
                flipped = true;
                flips += 1;
                break;
            }
            if flipped {
                break;
            }
        }

        if !flipped || flips >= max_flips {
            break;
        }
    }
}
