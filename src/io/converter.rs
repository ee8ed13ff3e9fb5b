// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Conversion of imported files into meshes

use super::import_cache::{ImportCache, ImportParams};
use super::parser::ScriptParser;
use crate::ast::Evaluator;
use crate::config::BuilderConfig;
use crate::error::{CsgError, Result};
use crate::geometry::{BooleanEngine, Mesh, Triangle};
use nalgebra::{Matrix4, Point3};
use std::fs::File;
use std::path::Path;
use stl_io::read_stl;

/// Turns an external file into a mesh.
///
/// Scripts are evaluated with `config`, the options of the importing
/// builder. `cache` is the cache performing the import; converters that
/// evaluate scripts route nested imports through it.
pub trait MeshConverter {
    fn convert(
        &self,
        path: &Path,
        params: &ImportParams,
        config: &BuilderConfig,
        cache: &ImportCache,
    ) -> Result<Mesh>;

    /// Whether converting `path` may import other files
    fn is_composite(&self, _path: &Path) -> bool {
        true
    }
}

/// Built-in converter for `.stl`, `.scad` and `.csg` files
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeConverter;

impl NativeConverter {
    pub fn new() -> Self {
        Self
    }

    /// Nested scripts are always evaluated on the calling thread
    fn load_script(&self, path: &Path, config: &BuilderConfig, cache: &ImportCache) -> Result<Mesh> {
        let source = std::fs::read_to_string(path).map_err(|e| CsgError::import(path, e.to_string()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let node = ScriptParser::new(base_dir).with_file(path).parse(&source)?;

        let engine = BooleanEngine::new(config.clone().with_parallel(false));
        Evaluator::new(engine, cache).evaluate(&node)
    }
}

impl MeshConverter for NativeConverter {
    fn convert(
        &self,
        path: &Path,
        params: &ImportParams,
        config: &BuilderConfig,
        cache: &ImportCache,
    ) -> Result<Mesh> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let mut mesh = match extension.as_str() {
            "stl" => load_stl(path)?,
            "scad" | "csg" => self.load_script(path, config, cache)?,
            other => {
                return Err(CsgError::import(
                    path,
                    format!("unsupported file type `{}`", other),
                ))
            }
        };

        if params.scale != 1.0 {
            if !(params.scale.is_finite() && params.scale > 0.0) {
                return Err(CsgError::import(
                    path,
                    format!("scale must be positive, got {}", params.scale),
                ));
            }
            mesh.transform(&Matrix4::new_scaling(params.scale));
        }
        Ok(mesh)
    }

    fn is_composite(&self, path: &Path) -> bool {
        !path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("stl"))
    }
}

/// Load an STL file (ASCII or binary) into an indexed mesh
pub fn load_stl(path: &Path) -> Result<Mesh> {
    let mut file = File::open(path).map_err(|e| CsgError::import(path, e.to_string()))?;
    let stl = read_stl(&mut file).map_err(|e| CsgError::import(path, format!("invalid STL: {}", e)))?;

    let vertices = stl
        .vertices
        .iter()
        .map(|v| Point3::new(v[0] as f64, v[1] as f64, v[2] as f64))
        .collect();
    let triangles = stl
        .faces
        .iter()
        .map(|face| Triangle::new(face.vertices))
        .collect();

    let mut mesh = Mesh::from_parts(vertices, triangles);
    mesh.remove_degenerate_triangles();
    mesh.validate()
        .map_err(|e| CsgError::import(path, e.to_string()))?;
    Ok(mesh)
}
