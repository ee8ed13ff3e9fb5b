// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error taxonomy shared by the kernel, the boolean engine, the parser and the compiler

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Line/column location inside a script (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePos {
    pub line: usize,
    pub column: usize,
}

impl SourcePos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors raised while building, parsing or evaluating a CSG scene.
///
/// Every variant aborts the enclosing `evaluate`/`compile_file` call.
#[derive(Debug, Error)]
pub enum CsgError {
    /// Bad primitive parameters
    #[error("invalid {primitive}{}: {message}", at_suffix(.position))]
    Geometry {
        primitive: String,
        message: String,
        position: Option<SourcePos>,
    },

    /// Operand the boolean engine cannot safely process
    #[error("mesh topology error: {message}")]
    MeshTopology { message: String },

    /// Malformed script
    #[error("{}{line}:{column}: syntax error: {message}", file_prefix(.file))]
    ScriptSyntax {
        file: Option<PathBuf>,
        line: usize,
        column: usize,
        message: String,
    },

    /// Statement name the parser does not know
    #[error("{}{line}:{column}: unknown construct `{name}`", file_prefix(.file))]
    UnknownConstruct {
        name: String,
        file: Option<PathBuf>,
        line: usize,
        column: usize,
    },

    /// Missing or unreadable external file
    #[error("cannot import {}{}: {reason}", .path.display(), at_suffix(.position))]
    ImportResolution {
        path: PathBuf,
        reason: String,
        position: Option<SourcePos>,
    },

    /// Top-level script could not be read
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn at_suffix(position: &Option<SourcePos>) -> String {
    position.map(|p| format!(" at {}", p)).unwrap_or_default()
}

fn file_prefix(file: &Option<PathBuf>) -> String {
    file.as_ref()
        .map(|f| format!("{}:", f.display()))
        .unwrap_or_default()
}

impl CsgError {
    pub fn geometry(primitive: impl Into<String>, message: impl Into<String>) -> Self {
        CsgError::Geometry {
            primitive: primitive.into(),
            message: message.into(),
            position: None,
        }
    }

    pub fn topology(message: impl Into<String>) -> Self {
        CsgError::MeshTopology {
            message: message.into(),
        }
    }

    pub fn syntax(pos: SourcePos, message: impl Into<String>) -> Self {
        CsgError::ScriptSyntax {
            file: None,
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    pub fn import(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CsgError::ImportResolution {
            path: path.into(),
            reason: reason.into(),
            position: None,
        }
    }

    /// Attach a source position to errors that do not carry one yet
    pub fn at(mut self, pos: Option<SourcePos>) -> Self {
        match &mut self {
            CsgError::Geometry { position, .. } | CsgError::ImportResolution { position, .. } => {
                if position.is_none() {
                    *position = pos;
                }
            }
            _ => {}
        }
        self
    }

    /// Attach the script path to parser errors
    pub fn in_file(mut self, path: impl Into<PathBuf>) -> Self {
        match &mut self {
            CsgError::ScriptSyntax { file, .. } | CsgError::UnknownConstruct { file, .. } => {
                if file.is_none() {
                    *file = Some(path.into());
                }
            }
            _ => {}
        }
        self
    }
}

pub type Result<T> = std::result::Result<T, CsgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = CsgError::syntax(SourcePos::new(3, 7), "unexpected `}`").in_file("model.csg");
        assert_eq!(err.to_string(), "model.csg:3:7: syntax error: unexpected `}`");
    }

    #[test]
    fn test_position_attached_once() {
        let err = CsgError::geometry("sphere", "negative radius")
            .at(Some(SourcePos::new(2, 1)))
            .at(Some(SourcePos::new(9, 9)));
        match err {
            CsgError::Geometry { position, .. } => assert_eq!(position, Some(SourcePos::new(2, 1))),
            other => panic!("unexpected error: {other}"),
        }
    }
}
