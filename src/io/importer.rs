// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script file importer

use super::parser::{script_dir, ScriptParser};
use crate::ast::Node;
use crate::error::{CsgError, Result};
use std::fs;
use std::path::Path;

/// Read a script file and parse it into a scene tree.
///
/// Relative imports inside the script resolve against its directory.
pub fn import_scad_file(path: &Path, fine_verbose: bool) -> Result<Node> {
    let source = fs::read_to_string(path).map_err(|source| CsgError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    ScriptParser::new(script_dir(path))
        .with_file(path)
        .with_fine_verbose(fine_verbose)
        .parse(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_import_scad_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cube([10, 10, 10]);").unwrap();

        let node = import_scad_file(file.path(), false).unwrap();
        assert!(matches!(node.kind, NodeKind::Primitive(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = import_scad_file(Path::new("/no/such/model.scad"), false).unwrap_err();
        assert!(matches!(err, CsgError::Io { .. }));
    }

    #[test]
    fn test_errors_name_the_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cube(1);\nfoo();").unwrap();

        match import_scad_file(file.path(), false).unwrap_err() {
            CsgError::UnknownConstruct { file: Some(name), line, .. } => {
                assert_eq!(name, file.path());
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
