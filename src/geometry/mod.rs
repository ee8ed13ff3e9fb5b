// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - mesh representation, primitives and the boolean engine

pub mod analytics;
mod bbox;
pub mod boolean;
pub mod bvh;
pub mod classification;
mod mesh;
pub mod mesh_reconstruction;
pub mod mesh_utils;
pub mod polygon;
mod primitives;
pub mod robust_predicates;
pub mod triangle_intersection;
pub mod triangulation;

pub use analytics::{analyze, GeometryStats};
pub use bbox::BoundingBox;
pub use boolean::{BooleanEngine, BooleanOp, BooleanStats};
pub use mesh::{weld_points, Mesh, Triangle};
pub use primitives::{Primitive, Resolution};
