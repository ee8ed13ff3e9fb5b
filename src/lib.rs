// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe CSG
//!
//! Constructive solid geometry on closed triangle meshes: primitive
//! tessellation, robust mesh booleans, a scene builder and a compiler for
//! OpenSCAD-style `.scad`/`.csg` scripts with cached imports.

pub mod ast;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod scenes;
pub mod utils;

pub use ast::{CsgBuilder, Node, NodeKind, TransformOp};
pub use compiler::CsgCompiler;
pub use config::{BuilderConfig, CompilerConfig};
pub use error::{CsgError, Result, SourcePos};
pub use geometry::{analyze, BooleanEngine, BooleanOp, GeometryStats, Mesh, Primitive};
pub use io::{export_stl, import_scad_file, parse_scad, ImportCache, ImportParams};

use std::path::Path;

/// Compile script text with default settings
pub fn render(source: &str) -> Result<Mesh> {
    CsgCompiler::new().compile_source(source, Path::new("."))
}

/// Compile a script file with default settings
pub fn render_file(path: &Path) -> Result<Mesh> {
    CsgCompiler::new().compile_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cube() {
        let mesh = render("cube([10, 10, 10]);").unwrap();
        assert_eq!(mesh.triangle_count(), 12);
    }
}
