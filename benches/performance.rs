// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{Matrix4, Vector3};
use polyframe_csg::geometry::{BooleanEngine, BooleanOp, Primitive, Resolution};
use polyframe_csg::{parse_scad, scenes, BuilderConfig, CsgBuilder};

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    let simple = "cube([10, 10, 10]);";
    group.bench_with_input(BenchmarkId::new("simple_cube", ""), &simple, |b, source| {
        b.iter(|| parse_scad(black_box(source)).unwrap());
    });

    let exported = r#"
        group() {
            difference() {
                cube(size = [20, 20, 20], center = false);
                multmatrix([[1, 0, 0, 10], [0, 1, 0, 10], [0, 0, 1, 10], [0, 0, 0, 1]]) {
                    sphere($fn = 0, $fa = 12, $fs = 2, r = 15);
                }
            }
        }
    "#;
    group.bench_with_input(BenchmarkId::new("exported_csg", ""), &exported, |b, source| {
        b.iter(|| parse_scad(black_box(source)).unwrap());
    });

    group.finish();
}

fn bench_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");

    group.bench_function("cube", |b| {
        b.iter(|| Primitive::cube(black_box(Vector3::new(10.0, 10.0, 10.0)), false).to_mesh());
    });

    for fragments in [32, 64] {
        let sphere = Primitive::sphere(10.0).with_resolution(Resolution::with_fragments(fragments));
        group.bench_with_input(BenchmarkId::new("sphere", fragments), &sphere, |b, sphere| {
            b.iter(|| black_box(sphere).to_mesh());
        });
    }

    group.bench_function("cylinder", |b| {
        b.iter(|| Primitive::cylinder(black_box(20.0), 5.0, 2.0, false).to_mesh());
    });

    group.finish();
}

fn bench_booleans(c: &mut Criterion) {
    let mut group = c.benchmark_group("boolean");
    group.sample_size(20);

    let a = Primitive::cube(Vector3::repeat(2.0), false).to_mesh().unwrap();
    let b = a.transformed(&Matrix4::new_translation(&Vector3::new(1.0, 0.5, 0.25)));
    let sphere = Primitive::sphere(1.2)
        .with_resolution(Resolution::with_fragments(32))
        .to_mesh()
        .unwrap()
        .transformed(&Matrix4::new_translation(&Vector3::repeat(1.0)));

    for parallel in [false, true] {
        let engine = BooleanEngine::new(BuilderConfig::default().with_parallel(parallel));
        let label = if parallel { "parallel" } else { "sequential" };

        for op in [BooleanOp::Union, BooleanOp::Difference, BooleanOp::Intersection] {
            group.bench_function(format!("cubes_{}_{}", op, label), |bench| {
                bench.iter(|| engine.binary(op, black_box(&a), black_box(&b)).unwrap());
            });
        }
        group.bench_function(format!("cube_minus_sphere_{}", label), |bench| {
            bench.iter(|| {
                engine
                    .binary(BooleanOp::Difference, black_box(&a), black_box(&sphere))
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_example004(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end");
    group.sample_size(10);

    let builder = CsgBuilder::new();
    let scene = scenes::example("example004", &builder).unwrap();
    group.bench_function("example004", |b| {
        b.iter(|| builder.evaluate(black_box(&scene)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_primitives, bench_booleans, bench_example004);
criterion_main!(benches);
