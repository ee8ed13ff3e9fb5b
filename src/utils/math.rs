// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Math utilities

use nalgebra::{Point3, Vector3};

/// Unnormalized polygon normal by Newell's method (length = 2 * area)
pub fn newell_normal<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Vector3<f64> {
    let points: Vec<&Point3<f64>> = points.into_iter().collect();
    let mut normal = Vector3::zeros();
    for (i, current) in points.iter().enumerate() {
        let next = points[(i + 1) % points.len()];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal
}

/// Calculate the unit normal of a triangle, or zero if it is degenerate
pub fn triangle_normal(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Vector3<f64> {
    (p1 - p0)
        .cross(&(p2 - p0))
        .try_normalize(f64::MIN_POSITIVE)
        .unwrap_or_else(Vector3::zeros)
}

/// Index of the dominant axis of a vector
pub fn dominant_axis(v: &Vector3<f64>) -> usize {
    let abs = v.abs();
    if abs.x >= abs.y && abs.x >= abs.z {
        0
    } else if abs.y >= abs.z {
        1
    } else {
        2
    }
}

/// Drop the dominant axis of `normal`, keeping counter-clockwise orientation
pub fn project_to_2d(point: &Point3<f64>, normal: &Vector3<f64>) -> [f64; 2] {
    match dominant_axis(normal) {
        0 if normal.x >= 0.0 => [point.y, point.z],
        0 => [point.z, point.y],
        1 if normal.y >= 0.0 => [point.z, point.x],
        1 => [point.x, point.z],
        _ if normal.z >= 0.0 => [point.x, point.y],
        _ => [point.y, point.x],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_newell_matches_area() {
        let square = [
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(2.0, 0.0, 1.0),
            Point3::new(2.0, 2.0, 1.0),
            Point3::new(0.0, 2.0, 1.0),
        ];
        let n = newell_normal(square.iter());
        assert_relative_eq!(n.z, 8.0, epsilon = 1e-12);
        assert_relative_eq!(n.x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_projection_keeps_orientation() {
        let normal = Vector3::new(-1.0, 0.0, 0.0);
        let tri = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        // Counter-clockwise around -x
        assert!(newell_normal(tri.iter()).x < 0.0);
        let p: Vec<[f64; 2]> = tri.iter().map(|p| project_to_2d(p, &normal)).collect();
        let area = (p[1][0] - p[0][0]) * (p[2][1] - p[0][1]) - (p[2][0] - p[0][0]) * (p[1][1] - p[0][1]);
        assert!(area > 0.0);
    }
}
