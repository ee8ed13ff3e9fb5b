// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Compiler driver - script file to mesh.
//!
//! Reads a script, parses it into a scene tree and evaluates the tree with
//! the configured builder. Every failure is logged through `tracing` and
//! returned; no partial mesh is ever produced.

use crate::ast::{CsgBuilder, Node};
use crate::config::CompilerConfig;
use crate::error::Result;
use crate::geometry::Mesh;
use crate::io::{import_scad_file, ImportCache, NativeConverter, ScriptParser};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Compiles script files into meshes
pub struct CsgCompiler {
    builder: CsgBuilder,
    verbose: bool,
    fine_verbose: bool,
}

impl Default for CsgCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl CsgCompiler {
    pub fn new() -> Self {
        Self::with_config(CompilerConfig::default())
    }

    /// Build a compiler and apply the one-shot cache controls
    pub fn with_config(config: CompilerConfig) -> Self {
        let mut cache = ImportCache::new(Box::new(NativeConverter::new()));
        if let Some(dir) = &config.cache_dir {
            cache = cache.with_persistence(dir);
        }
        if config.clear_cache {
            cache.invalidate_all();
        }
        if config.ignore_cache_time {
            cache.ignore_modification_time();
        }

        let mut builder = CsgBuilder::with_config(config.builder).with_import_cache(Arc::new(cache));
        builder.set_verbose(config.verbose);
        builder.set_fine_verbose(config.fine_verbose);

        Self {
            builder,
            verbose: config.verbose,
            fine_verbose: config.fine_verbose,
        }
    }

    pub fn builder(&self) -> &CsgBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut CsgBuilder {
        &mut self.builder
    }

    pub fn set_verbose(&mut self, enabled: bool) {
        self.verbose = enabled;
        self.builder.set_verbose(enabled);
    }

    pub fn set_fine_verbose(&mut self, enabled: bool) {
        self.fine_verbose = enabled;
        self.builder.set_fine_verbose(enabled);
    }

    /// Parse a script file without evaluating it
    pub fn parse_file(&self, path: &Path) -> Result<Node> {
        let start = Instant::now();
        let node = import_scad_file(path, self.fine_verbose).inspect_err(|e| error!("{}", e))?;

        if self.verbose {
            info!(
                "Parsed {} ({} nodes) in {:?}",
                path.display(),
                node.node_count(),
                start.elapsed()
            );
        }
        Ok(node)
    }

    /// Parse and evaluate a script file
    pub fn compile_file(&self, path: &Path) -> Result<Mesh> {
        let node = self.parse_file(path)?;
        self.evaluate(&node)
    }

    /// Parse and evaluate in-memory script text; imports resolve against `base_dir`
    pub fn compile_source(&self, source: &str, base_dir: &Path) -> Result<Mesh> {
        let node = ScriptParser::new(base_dir)
            .with_fine_verbose(self.fine_verbose)
            .parse(source)
            .inspect_err(|e| error!("{}", e))?;
        self.evaluate(&node)
    }

    pub fn evaluate(&self, node: &Node) -> Result<Mesh> {
        self.builder.evaluate(node).inspect_err(|e| error!("{}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CsgError;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    #[test]
    fn test_compile_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.scad");
        std::fs::write(&path, "difference() { cube(10); translate([5, 5, 5]) cube(10); }").unwrap();

        let mesh = CsgCompiler::new().compile_file(&path).unwrap();
        assert_relative_eq!(mesh.volume(), 1000.0 - 125.0, epsilon = 1e-6);
    }

    #[test]
    fn test_parse_failure_is_returned() {
        let compiler = CsgCompiler::new();
        let err = compiler.compile_source("cube(10", Path::new(".")).unwrap_err();
        assert!(matches!(err, CsgError::ScriptSyntax { .. }));
    }

    #[test]
    fn test_geometry_failure_is_returned() {
        let compiler = CsgCompiler::new();
        let err = compiler.compile_source("sphere(-1);", Path::new(".")).unwrap_err();
        assert!(matches!(err, CsgError::Geometry { .. }));
    }

    #[test]
    fn test_imports_share_the_compiler_cache() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("part.scad"), "cube(2);").unwrap();
        let source = "union() { import(\"part.scad\"); translate([5, 0, 0]) import(\"part.scad\"); }";

        let compiler = CsgCompiler::new();
        let mesh = compiler.compile_source(source, dir.path()).unwrap();
        assert_relative_eq!(mesh.volume(), 16.0, epsilon = 1e-9);

        let stats = compiler.builder().import_cache().stats();
        assert_eq!(stats.conversions, 1);
        assert_eq!(stats.hits, 1);
    }
}
