// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scene tree module
//!
//! Defines the node tree for OpenSCAD-compatible operations, the builder
//! used to assemble it from code and the evaluator that turns it into a mesh

mod builder;
mod evaluator;
mod node;

pub use builder::CsgBuilder;
pub use evaluator::Evaluator;
pub use node::{Node, NodeKind, TransformOp, Vec3};
