// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Algebraic properties of primitives, transforms and booleans

use approx::assert_relative_eq;
use nalgebra::{Matrix4, Vector3};
use polyframe_csg::geometry::mesh_utils::is_closed;
use polyframe_csg::geometry::{BooleanEngine, BooleanOp, Mesh, Primitive, Resolution};
use polyframe_csg::{BuilderConfig, TransformOp};

fn cube_at(size: f64, offset: Vector3<f64>) -> Mesh {
    Primitive::cube(Vector3::repeat(size), false)
        .to_mesh()
        .unwrap()
        .transformed(&Matrix4::new_translation(&offset))
}

#[test]
fn test_primitives_are_deterministic() {
    let primitives = [
        Primitive::sphere(3.5),
        Primitive::cube(Vector3::new(1.0, 2.0, 3.0), true),
        Primitive::cylinder(4.0, 2.0, 0.5, false),
        Primitive::cylinder(4.0, 0.0, 2.0, true),
    ];
    for primitive in &primitives {
        let first = primitive.to_mesh().unwrap();
        let second = primitive.clone().to_mesh().unwrap();
        assert_eq!(first, second, "{} is not deterministic", primitive.name());
    }
}

#[test]
fn test_transform_composition() {
    let mesh = Primitive::sphere(2.0).to_mesh().unwrap();
    let m1 = TransformOp::Rotate(Vector3::new(10.0, 20.0, 30.0)).to_matrix();
    let m2 = TransformOp::Translate(Vector3::new(1.0, -2.0, 3.0)).to_matrix()
        * TransformOp::Scale(Vector3::new(2.0, 1.0, 0.5)).to_matrix();

    let stepwise = mesh.transformed(&m1).transformed(&m2);
    let combined = mesh.transformed(&(m2 * m1));

    assert_eq!(stepwise.triangles, combined.triangles);
    for (a, b) in stepwise.vertices.iter().zip(&combined.vertices) {
        assert_relative_eq!(a, b, epsilon = 1e-9);
    }
}

#[test]
fn test_mirror_preserves_outward_orientation() {
    let mesh = Primitive::cylinder(3.0, 1.0, 2.0, false).to_mesh().unwrap();
    let mirrored = mesh.transformed(&TransformOp::Mirror(Vector3::new(1.0, 0.0, 0.0)).to_matrix());

    assert!(mirrored.volume() > 0.0);
    assert_relative_eq!(mirrored.volume(), mesh.volume(), epsilon = 1e-9);
    assert!(is_closed(&mirrored));
}

#[test]
fn test_single_operand_difference_is_identity() {
    let a = Primitive::sphere(1.5).to_mesh().unwrap();
    let engine = BooleanEngine::default();
    let result = engine.combine(BooleanOp::Difference, vec![a.clone()]).unwrap();
    assert_eq!(result, a);
}

#[test]
fn test_union_with_itself() {
    let a = cube_at(2.0, Vector3::new(0.5, 0.5, 0.5));
    let engine = BooleanEngine::default();
    let result = engine.binary(BooleanOp::Union, &a, &a).unwrap();

    assert!(is_closed(&result));
    assert_relative_eq!(result.volume(), a.volume(), epsilon = 1e-9);
    assert_eq!(result.bounding_box(), a.bounding_box());
}

#[test]
fn test_boolean_algebra_reconstructs_union() {
    let a = cube_at(2.0, Vector3::zeros());
    let b = cube_at(2.0, Vector3::new(1.0, 0.5, 0.25));
    let engine = BooleanEngine::default();

    let union = engine.binary(BooleanOp::Union, &a, &b).unwrap();
    let intersection = engine.binary(BooleanOp::Intersection, &a, &b).unwrap();
    let a_minus_b = engine.binary(BooleanOp::Difference, &a, &b).unwrap();
    let b_minus_a = engine.binary(BooleanOp::Difference, &b, &a).unwrap();

    assert_relative_eq!(intersection.volume(), 1.0 * 1.5 * 1.75, epsilon = 1e-9);
    assert_relative_eq!(union.volume(), 16.0 - 2.625, epsilon = 1e-9);

    let rebuilt = engine
        .combine(BooleanOp::Union, vec![intersection, a_minus_b, b_minus_a])
        .unwrap();
    assert!(is_closed(&rebuilt));
    assert_relative_eq!(rebuilt.volume(), union.volume(), epsilon = 1e-9);
    assert_eq!(rebuilt.bounding_box(), union.bounding_box());
}

#[test]
fn test_noop_keeps_every_facet() {
    let a = Primitive::sphere(1.0).to_mesh().unwrap();
    let b = cube_at(1.0, Vector3::zeros());
    let engine = BooleanEngine::new(BuilderConfig::default().with_noop(true));

    for op in [BooleanOp::Union, BooleanOp::Difference, BooleanOp::Intersection] {
        let result = engine.combine(op, vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(result.triangle_count(), a.triangle_count() + b.triangle_count());
    }
}

#[test]
fn test_sphere_minus_cube_stays_closed() {
    let sphere = Primitive::sphere(2.0)
        .with_resolution(Resolution::with_fragments(32))
        .to_mesh()
        .unwrap();
    let cube = cube_at(2.0, Vector3::new(0.1, 0.2, 0.3));
    let engine = BooleanEngine::default();

    let result = engine.binary(BooleanOp::Difference, &sphere, &cube).unwrap();
    assert!(is_closed(&result));

    // The cube lies in the positive octant, so at most an eighth is removed
    let removed = sphere.volume() - result.volume();
    assert!(removed > 0.0);
    assert!(removed < sphere.volume() / 8.0);
}
