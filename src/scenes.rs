// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Built-in demonstration scenes, assembled with [`CsgBuilder`]

use crate::ast::{CsgBuilder, Node, Vec3};

/// Names accepted by [`example`]
pub const EXAMPLES: &[&str] = &["example001", "example002", "example003", "example004"];

/// Build a named scene, or `None` for an unknown name
pub fn example(name: &str, builder: &CsgBuilder) -> Option<Node> {
    let node = match name {
        "example001" => example001(builder),
        "example002" => example002(builder),
        "example003" => example003(builder),
        "example004" => example004(builder),
        _ => return None,
    };
    Some(node)
}

/// Sphere drilled along all three axes
fn example001(b: &CsgBuilder) -> Node {
    let size = 50.0;
    let hole = 25.0;
    let radius = hole / 2.0;
    let height = size * 2.5 / 2.0;

    b.difference(vec![
        b.sphere(size / 2.0),
        b.cylinder(height, radius, radius),
        b.rotate(Vec3::new(90.0, 0.0, 0.0), vec![b.cylinder(height, radius, radius)]),
        b.rotate(Vec3::new(0.0, 90.0, 0.0), vec![b.cylinder(height, radius, radius)]),
    ])
}

fn example002(b: &CsgBuilder) -> Node {
    b.intersection(vec![
        b.difference(vec![
            b.union(vec![
                b.cube(Vec3::new(30.0, 30.0, 30.0)),
                b.translate(Vec3::new(0.0, 0.0, -25.0), vec![b.cube(Vec3::new(15.0, 15.0, 50.0))]),
            ]),
            b.union(vec![
                b.cube(Vec3::new(50.0, 10.0, 10.0)),
                b.cube(Vec3::new(10.0, 50.0, 10.0)),
                b.cube(Vec3::new(10.0, 10.0, 50.0)),
            ]),
        ]),
        b.translate(Vec3::new(0.0, 0.0, 5.0), vec![b.cylinder(50.0, 20.0, 5.0)]),
    ])
}

fn example003(b: &CsgBuilder) -> Node {
    b.difference(vec![
        b.union(vec![
            b.cube(Vec3::new(30.0, 30.0, 30.0)),
            b.cube(Vec3::new(40.0, 15.0, 15.0)),
            b.cube(Vec3::new(15.0, 40.0, 15.0)),
            b.cube(Vec3::new(15.0, 15.0, 40.0)),
        ]),
        b.union(vec![
            b.cube(Vec3::new(50.0, 10.0, 10.0)),
            b.cube(Vec3::new(10.0, 50.0, 10.0)),
            b.cube(Vec3::new(10.0, 10.0, 50.0)),
        ]),
    ])
}

/// Cube with a spherical cavity breaking through every face
fn example004(b: &CsgBuilder) -> Node {
    b.difference(vec![b.cube(Vec3::new(30.0, 30.0, 30.0)), b.sphere(20.0)])
}
