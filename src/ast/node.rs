// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scene tree node definitions

use crate::error::SourcePos;
use crate::geometry::{BooleanOp, Primitive, Resolution};
use crate::io::ImportParams;
use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 3D Vector type alias
pub type Vec3 = Vector3<f64>;

/// Scene tree node.
///
/// Nodes own their children; reusing a subtree means cloning it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    /// Script position of the statement that produced this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SourcePos>,
}

/// Types of scene nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Primitive(Primitive),
    Transform {
        matrix: Matrix4<f64>,
        child: Box<Node>,
    },
    Boolean {
        op: BooleanOp,
        children: Vec<Node>,
    },
    /// Evaluated as a union
    Group(Vec<Node>),
    Import {
        path: PathBuf,
        params: ImportParams,
    },
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            position: None,
        }
    }

    pub fn primitive(primitive: Primitive) -> Self {
        Self::new(NodeKind::Primitive(primitive))
    }

    pub fn transform(matrix: Matrix4<f64>, child: Node) -> Self {
        Self::new(NodeKind::Transform {
            matrix,
            child: Box::new(child),
        })
    }

    pub fn boolean(op: BooleanOp, children: Vec<Node>) -> Self {
        Self::new(NodeKind::Boolean { op, children })
    }

    pub fn group(children: Vec<Node>) -> Self {
        Self::new(NodeKind::Group(children))
    }

    pub fn import(path: impl Into<PathBuf>, params: ImportParams) -> Self {
        Self::new(NodeKind::Import {
            path: path.into(),
            params,
        })
    }

    /// Attach a script position
    pub fn at(mut self, position: Option<SourcePos>) -> Self {
        self.position = position;
        self
    }

    /// Set `$fn/$fa/$fs` on a primitive node; other nodes are returned unchanged
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.kind = match self.kind {
            NodeKind::Primitive(primitive) => NodeKind::Primitive(primitive.with_resolution(resolution)),
            other => other,
        };
        self
    }

    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::Transform { child, .. } => vec![child.as_ref()],
            NodeKind::Boolean { children, .. } | NodeKind::Group(children) => children.iter().collect(),
            NodeKind::Primitive(_) | NodeKind::Import { .. } => Vec::new(),
        }
    }

    /// Short name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Primitive(primitive) => primitive.name(),
            NodeKind::Transform { .. } => "multmatrix",
            NodeKind::Boolean { op, .. } => op.name(),
            NodeKind::Group(_) => "group",
            NodeKind::Import { .. } => "import",
        }
    }

    /// Number of nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }
}

/// Transformation operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformOp {
    Translate(Vec3),
    /// Euler angles in degrees, applied x then y then z
    Rotate(Vec3),
    /// Angle in degrees around an axis
    RotateAxis { angle: f64, axis: Vec3 },
    Scale(Vec3),
    /// Reflection across the plane through the origin with this normal
    Mirror(Vec3),
    Multmatrix(Matrix4<f64>),
}

impl TransformOp {
    /// Convert transformation to a 4x4 matrix
    pub fn to_matrix(&self) -> Matrix4<f64> {
        match self {
            TransformOp::Translate(v) => Matrix4::new_translation(v),
            TransformOp::Rotate(angles) => {
                let rx = axis_rotation(&Vec3::x(), angles.x);
                let ry = axis_rotation(&Vec3::y(), angles.y);
                let rz = axis_rotation(&Vec3::z(), angles.z);
                rz * ry * rx
            }
            TransformOp::RotateAxis { angle, axis } => axis_rotation(axis, *angle),
            TransformOp::Scale(s) => Matrix4::new_nonuniform_scaling(s),
            TransformOp::Mirror(normal) => {
                let length_sq = normal.norm_squared();
                let mut m = Matrix4::identity();
                if length_sq > 0.0 {
                    let reflection = nalgebra::Matrix3::identity() - normal * normal.transpose() * (2.0 / length_sq);
                    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&reflection);
                }
                m
            }
            TransformOp::Multmatrix(m) => *m,
        }
    }
}

/// Sine and cosine of an angle in degrees, exact at multiples of 90
fn sin_cos_degrees(degrees: f64) -> (f64, f64) {
    let turns = degrees / 90.0;
    if turns.fract() == 0.0 && turns.is_finite() {
        return match (turns as i64).rem_euclid(4) {
            0 => (0.0, 1.0),
            1 => (1.0, 0.0),
            2 => (0.0, -1.0),
            _ => (-1.0, 0.0),
        };
    }
    degrees.to_radians().sin_cos()
}

/// Rotation by `degrees` around `axis` (Rodrigues); a zero axis means z
fn axis_rotation(axis: &Vec3, degrees: f64) -> Matrix4<f64> {
    let axis = axis.try_normalize(0.0).unwrap_or_else(Vec3::z);
    let (s, c) = sin_cos_degrees(degrees);
    let t = 1.0 - c;
    let (x, y, z) = (axis.x, axis.y, axis.z);
    Matrix4::new(
        t * x * x + c,
        t * x * y - s * z,
        t * x * z + s * y,
        0.0,
        t * x * y + s * z,
        t * y * y + c,
        t * y * z - s * x,
        0.0,
        t * x * z - s * y,
        t * y * z + s * x,
        t * z * z + c,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
    )
}
