// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh exporter

use crate::error::{CsgError, Result};
use crate::geometry::Mesh;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use stl_io::{Normal, Triangle as StlTriangle, Vertex as StlVertex};

/// Export mesh to a binary STL file
pub fn export_stl(mesh: &Mesh, path: &Path) -> Result<()> {
    let triangles: Vec<StlTriangle> = (0..mesh.triangle_count())
        .map(|t| {
            let [v0, v1, v2] = mesh.triangle_points(t);
            let normal = mesh.triangle_normal(t);

            StlTriangle {
                normal: Normal::new([normal.x as f32, normal.y as f32, normal.z as f32]),
                vertices: [
                    StlVertex::new([v0.x as f32, v0.y as f32, v0.z as f32]),
                    StlVertex::new([v1.x as f32, v1.y as f32, v1.z as f32]),
                    StlVertex::new([v2.x as f32, v2.y as f32, v2.z as f32]),
                ],
            }
        })
        .collect();

    let io_error = |source| CsgError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    stl_io::write_stl(&mut writer, triangles.iter()).map_err(io_error)?;
    Ok(())
}
