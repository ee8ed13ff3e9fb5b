// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - script parsing, imports and mesh export

mod converter;
mod exporter;
mod import_cache;
mod importer;
mod parser;

pub use converter::{load_stl, MeshConverter, NativeConverter};
pub use exporter::export_stl;
pub use import_cache::{CacheStats, ImportCache, ImportParams};
pub use importer::import_scad_file;
pub use parser::{parse_scad, script_dir, ScriptParser};
