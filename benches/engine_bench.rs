//! Benchmarks for pivot2d
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::DVec2;

use pivot2d::{decompose, factory, Body, BodyConfig, Engine};

fn floor() -> Body {
    factory::rectangle(
        400.0,
        600.0,
        800.0,
        40.0,
        BodyConfig {
            is_static: true,
            ..Default::default()
        },
    )
}

// ============================================================================
// Engine step benchmarks
// ============================================================================

fn bench_engine_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_step");

    group.bench_function("single_box_60_steps", |b| {
        b.iter(|| {
            let mut engine = Engine::default();
            let root = engine.world.root();
            engine.world.add_body(root, floor());
            let id = engine.world.add_body(
                root,
                factory::rectangle(400.0, 100.0, 20.0, 20.0, BodyConfig::default()),
            );
            for _ in 0..60 {
                engine.step(black_box(1000.0 / 60.0), 1.0);
            }
            engine.world.body(id).unwrap().position
        });
    });

    group.bench_function("grid_of_boxes_60_steps", |b| {
        b.iter(|| {
            let mut engine = Engine::default();
            let root = engine.world.root();
            engine.world.add_body(root, floor());
            for row in 0..5 {
                for col in 0..8 {
                    engine.world.add_body(
                        root,
                        factory::rectangle(
                            200.0 + 22.0 * col as f64,
                            100.0 + 22.0 * row as f64,
                            20.0,
                            20.0,
                            BodyConfig::default(),
                        ),
                    );
                }
            }
            for _ in 0..60 {
                engine.step(black_box(1000.0 / 60.0), 1.0);
            }
            engine.timing.timestamp
        });
    });

    group.finish();
}

// ============================================================================
// Decomposition benchmarks
// ============================================================================

fn bench_decompose(c: &mut Criterion) {
    // a 16-point star: 8 reflex vertices
    let mut star = Vec::new();
    for i in 0..16 {
        let angle = std::f64::consts::TAU * i as f64 / 16.0;
        let r = if i % 2 == 0 { 100.0 } else { 40.0 };
        star.push(DVec2::new(r * angle.cos(), r * angle.sin()));
    }
    decompose::make_ccw(&mut star);

    c.bench_function("quick_decomp_star", |b| {
        b.iter(|| decompose::quick_decomp(black_box(&star)));
    });
}

criterion_group!(benches, bench_engine_step, bench_decompose);
criterion_main!(benches);
