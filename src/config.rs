// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Builder and compiler configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file looked up by [`CompilerConfig::load`]
pub const CONFIG_FILE_NAME: &str = "polyframe-csg.toml";

/// Options that affect how boolean and primitive nodes are evaluated.
///
/// One builder carries one configuration; it is not varied per node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Merge adjacent coplanar facets of boolean results
    pub simplify_coplanar_facets: bool,
    /// Maximum angle in degrees between facets still treated as coplanar
    pub coplanar_angle_tolerance: f64,
    /// Delaunay-flip retriangulated polygons
    pub delaunay: bool,
    /// Only test facet pairs found through the bounding volume hierarchy
    pub detect_intersecting_neighbors: bool,
    /// Skip classification for components that do not touch the other operand
    pub fast_union: bool,
    /// Replace boolean operations with plain concatenation
    pub noop: bool,
    /// Evaluate sibling subtrees on the rayon pool
    pub parallel: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            simplify_coplanar_facets: true,
            coplanar_angle_tolerance: 0.0,
            delaunay: true,
            detect_intersecting_neighbors: true,
            fast_union: false,
            noop: false,
            parallel: true,
        }
    }
}

impl BuilderConfig {
    pub fn with_simplify_coplanar_facets(mut self, enabled: bool, angle_tolerance: f64) -> Self {
        self.simplify_coplanar_facets = enabled;
        self.coplanar_angle_tolerance = angle_tolerance;
        self
    }

    pub fn with_delaunay(mut self, enabled: bool) -> Self {
        self.delaunay = enabled;
        self
    }

    pub fn with_detect_intersecting_neighbors(mut self, enabled: bool) -> Self {
        self.detect_intersecting_neighbors = enabled;
        self
    }

    pub fn with_fast_union(mut self, enabled: bool) -> Self {
        self.fast_union = enabled;
        self
    }

    pub fn with_noop(mut self, enabled: bool) -> Self {
        self.noop = enabled;
        self
    }

    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }
}

/// Session-wide settings of a [`crate::CsgCompiler`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub builder: BuilderConfig,
    /// Summaries of each compilation stage
    pub verbose: bool,
    /// Per-stage detail from the parser and the boolean engine
    pub fine_verbose: bool,
    /// Drop every cached import once at startup
    pub clear_cache: bool,
    /// Treat cached imports as valid regardless of file timestamps
    pub ignore_cache_time: bool,
    /// Persist converted imports in this directory
    pub cache_dir: Option<PathBuf>,
}

impl CompilerConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: CompilerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from(CONFIG_FILE_NAME).exists() {
            Self::from_file(CONFIG_FILE_NAME)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(verbose) = std::env::var("POLYFRAME_CSG_VERBOSE") {
            self.verbose = verbose.parse().unwrap_or(false);
        }

        if let Ok(noop) = std::env::var("POLYFRAME_CSG_NOOP") {
            self.builder.noop = noop.parse().unwrap_or(false);
        }

        if let Ok(dir) = std::env::var("POLYFRAME_CSG_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(dir));
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_builder() {
        let config = BuilderConfig::default();
        assert!(config.simplify_coplanar_facets);
        assert!(config.delaunay);
        assert!(config.detect_intersecting_neighbors);
        assert!(!config.fast_union);
        assert!(!config.noop);
        assert_eq!(config.coplanar_angle_tolerance, 0.0);
    }

    #[test]
    fn test_partial_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "verbose = true").unwrap();
        writeln!(file, "[builder]").unwrap();
        writeln!(file, "fast_union = true").unwrap();
        writeln!(file, "coplanar_angle_tolerance = 0.5").unwrap();

        let config = CompilerConfig::from_file(file.path()).unwrap();
        assert!(config.verbose);
        assert!(config.builder.fast_union);
        assert!(config.builder.delaunay);
        assert_eq!(config.builder.coplanar_angle_tolerance, 0.5);
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let file = NamedTempFile::new().unwrap();
        let config = CompilerConfig {
            clear_cache: true,
            builder: BuilderConfig::default().with_noop(true),
            ..Default::default()
        };
        config.save(file.path()).unwrap();
        assert_eq!(CompilerConfig::from_file(file.path()).unwrap(), config);
    }
}
