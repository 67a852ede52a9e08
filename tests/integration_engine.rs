//! Integration tests for pivot2d
//!
//! End-to-end scenarios exercised through the public API only: free fall,
//! resting contact, stacking, constraints, sleeping and decomposition, plus
//! the cross-cutting invariants that must hold for every body and pair at
//! the end of any step.

use std::cell::RefCell;
use std::rc::Rc;

use glam::DVec2;
use pivot2d::{factory, vertices, Body, BodyConfig, ConstraintConfig, Engine, EngineConfig};

const DELTA: f64 = 1000.0 / 60.0;

// ============================================================================
// Helpers
// ============================================================================

fn run(engine: &mut Engine, steps: usize) {
    for _ in 0..steps {
        engine.step(DELTA, 1.0);
    }
}

fn static_floor() -> Body {
    factory::rectangle(
        200.0,
        235.0,
        400.0,
        30.0,
        BodyConfig {
            is_static: true,
            ..Default::default()
        },
    )
}

fn small_box(x: f64, y: f64) -> Body {
    factory::rectangle(x, y, 20.0, 20.0, BodyConfig::default())
}

/// Invariants that must hold for every body after any step.
fn assert_body_invariants(engine: &Engine) {
    for body in engine.world.bodies() {
        if !body.is_static {
            assert!(
                (body.inverse_mass - 1.0 / body.mass).abs() < 1e-9,
                "inverse mass consistent for body {}",
                body.id
            );
            assert!(
                (body.inverse_inertia - 1.0 / body.inertia).abs() < 1e-9,
                "inverse inertia consistent for body {}",
                body.id
            );
        }
        for vertex in body.vertices() {
            assert!(
                vertex.point.x >= body.bounds().min.x - 1e-9
                    && vertex.point.x <= body.bounds().max.x + 1e-9
                    && vertex.point.y >= body.bounds().min.y - 1e-9
                    && vertex.point.y <= body.bounds().max.y + 1e-9,
                "bounds contain all vertices of body {}",
                body.id
            );
        }
        if body.parts.len() > 1 {
            let parts_area: f64 = body.parts[1..].iter().map(|p| p.area).sum();
            assert!(
                (parts_area - body.area).abs() < 1e-6,
                "compound area equals the sum of its parts"
            );
        }
    }
    for pair in &engine.pairs.list {
        if pair.is_active {
            assert!(
                (pair.collision.normal.length() - 1.0).abs() < 1e-9,
                "active pair normals stay unit length"
            );
        }
    }
}

// ============================================================================
// S1 — Free fall under gravity
// ============================================================================

#[test]
fn test_s1_box_falls_under_gravity() {
    let mut engine = Engine::default();
    let root = engine.world.root();
    let id = engine.world.add_body(root, small_box(100.0, 50.0));

    run(&mut engine, 30);

    let body = engine.world.body(id).unwrap();
    assert!(body.position.y > 100.0, "fell well below the start");
    // v_n = 0.99 v_{n-1} + g * scale * dt^2; 30 steps land near 7.2
    assert!(
        body.velocity.y > 6.0 && body.velocity.y < 9.0,
        "terminal approach velocity, got {}",
        body.velocity.y
    );
    assert!((body.position.x - 100.0).abs() < 1e-9, "no lateral drift");
    assert_body_invariants(&engine);
}

// ============================================================================
// S2 — Resting contact on a static floor
// ============================================================================

#[test]
fn test_s2_box_rests_on_floor() {
    let mut engine = Engine::default();
    let root = engine.world.root();
    engine.world.add_body(root, static_floor());
    let id = engine.world.add_body(root, small_box(200.0, 50.0));

    run(&mut engine, 300);

    let body = engine.world.body(id).unwrap();
    assert!(
        body.velocity.y.abs() < 0.05,
        "settled, vy = {}",
        body.velocity.y
    );
    // floor top is 220, so the box centre rests at 210 plus at most the slop
    assert!(
        (body.position.y - 210.0).abs() < 0.5,
        "resting height, y = {}",
        body.position.y
    );
    let active = engine.pairs.list.iter().filter(|p| p.is_active).count();
    assert_eq!(active, 1, "the resting pair stays active");
    assert_body_invariants(&engine);
}

// ============================================================================
// S3 — A stack of boxes settles
// ============================================================================

#[test]
fn test_s3_stacked_boxes_settle() {
    let mut engine = Engine::default();
    let root = engine.world.root();
    engine.world.add_body(root, static_floor());
    let bottom = engine.world.add_body(root, small_box(200.0, 200.0));
    let middle = engine.world.add_body(root, small_box(200.0, 180.0));
    let top = engine.world.add_body(root, small_box(200.0, 160.0));

    run(&mut engine, 600);

    for &id in &[bottom, middle, top] {
        let body = engine.world.body(id).unwrap();
        assert!(
            body.velocity.length() < 0.05,
            "box {} settled, |v| = {}",
            id,
            body.velocity.length()
        );
    }
    let y_bottom = engine.world.body(bottom).unwrap().position.y;
    let y_middle = engine.world.body(middle).unwrap().position.y;
    let y_top = engine.world.body(top).unwrap().position.y;
    assert!(
        (y_bottom - y_middle - 20.0).abs() < 1.0,
        "stack spacing, {y_bottom} vs {y_middle}"
    );
    assert!(
        (y_middle - y_top - 20.0).abs() < 1.0,
        "stack spacing, {y_middle} vs {y_top}"
    );

    let active = engine.pairs.list.iter().filter(|p| p.is_active).count();
    assert_eq!(active, 3, "floor-bottom, bottom-middle, middle-top");
    assert_body_invariants(&engine);
}

// ============================================================================
// S4 — A distance constraint holds its length
// ============================================================================

#[test]
fn test_s4_distance_constraint_swings() {
    let mut engine = Engine::default();
    let root = engine.world.root();
    let anchor = engine.world.add_body(
        root,
        factory::rectangle(
            200.0,
            50.0,
            20.0,
            20.0,
            BodyConfig {
                is_static: true,
                ..Default::default()
            },
        ),
    );
    let bob = engine
        .world
        .add_body(root, factory::circle(200.0, 150.0, 10.0, BodyConfig::default(), 25));
    engine.world.add_constraint(
        root,
        ConstraintConfig {
            body_a: Some(anchor),
            body_b: Some(bob),
            length: Some(100.0),
            stiffness: 1.0,
            ..Default::default()
        },
    );

    {
        let body = engine.world.body_mut(bob).unwrap();
        let position = body.position;
        body.apply_force(position, DVec2::new(5.0, 0.0));
    }

    for _ in 0..120 {
        engine.step(DELTA, 1.0);
        let anchor_pos = engine.world.body(anchor).unwrap().position;
        let bob_pos = engine.world.body(bob).unwrap().position;
        let distance = (bob_pos - anchor_pos).length();
        assert!(
            (99.0..=101.0).contains(&distance),
            "constraint holds its length, got {distance}"
        );
    }
    assert_body_invariants(&engine);
}

// ============================================================================
// S5 — Sleep and wake
// ============================================================================

#[test]
fn test_s5_sleep_then_wake_on_impact() {
    let mut engine = Engine::new(EngineConfig {
        enable_sleeping: true,
        ..Default::default()
    });
    let root = engine.world.root();
    engine.world.add_body(root, static_floor());
    let sleeper = engine.world.add_body(root, small_box(200.0, 50.0));

    let sleep_starts = Rc::new(RefCell::new(Vec::new()));
    let sleep_ends = Rc::new(RefCell::new(Vec::new()));
    let starts = Rc::clone(&sleep_starts);
    engine
        .events
        .sleep_start
        .on(move |e| starts.borrow_mut().push(e.body));
    let ends = Rc::clone(&sleep_ends);
    engine
        .events
        .sleep_end
        .on(move |e| ends.borrow_mut().push(e.body));

    // fall, rest, then sit still long enough to sleep
    run(&mut engine, 400);
    assert!(
        engine.world.body(sleeper).unwrap().is_sleeping,
        "the resting box fell asleep"
    );
    let start_count = sleep_starts
        .borrow()
        .iter()
        .filter(|&&b| b == sleeper)
        .count();
    assert_eq!(start_count, 1, "exactly one sleep_start for the box");

    // drop another box onto the sleeper
    engine.world.add_body(root, small_box(200.0, 150.0));
    run(&mut engine, 90);

    let end_count = sleep_ends
        .borrow()
        .iter()
        .filter(|&&b| b == sleeper)
        .count();
    assert_eq!(end_count, 1, "the impact woke the box exactly once");
    assert!(!engine.world.body(sleeper).unwrap().is_sleeping);
}

#[test]
fn test_sleeping_body_is_motionless() {
    let mut engine = Engine::new(EngineConfig {
        enable_sleeping: true,
        ..Default::default()
    });
    let root = engine.world.root();
    engine.world.add_body(root, static_floor());
    let id = engine.world.add_body(root, small_box(200.0, 50.0));

    run(&mut engine, 400);
    assert!(engine.world.body(id).unwrap().is_sleeping);

    let before = engine.world.body(id).unwrap().position;
    run(&mut engine, 30);
    let after = engine.world.body(id).unwrap().position;
    assert_eq!(before, after, "sleeping bodies do not drift");
}

// ============================================================================
// S6 — Concave decomposition through the factory
// ============================================================================

#[test]
fn test_s6_concave_decomposition() {
    let points = vec![
        DVec2::new(-1.0, 1.0),
        DVec2::new(-1.0, 0.0),
        DVec2::new(1.0, 0.0),
        DVec2::new(1.0, 1.0),
        DVec2::new(0.5, 0.5),
    ];
    let ring = vertices::create(&points);
    let input_area = vertices::area(&ring, false);

    let body = factory::from_vertices(
        0.0,
        0.0,
        vec![points],
        BodyConfig::default(),
        false,
        0.0,
        0.0,
    )
    .unwrap();

    assert_eq!(body.parts.len(), 3, "two convex pieces plus the hull ring");
    let pieces_area: f64 = body.parts[1..].iter().map(|p| p.area).sum();
    assert!(
        (pieces_area - input_area).abs() < 1e-9,
        "decomposition conserves area: {pieces_area} vs {input_area}"
    );
    assert_eq!(body.area, pieces_area);
}

// ============================================================================
// Cross-cutting invariants
// ============================================================================

#[test]
fn test_static_bodies_never_move() {
    let mut engine = Engine::default();
    let root = engine.world.root();
    let floor = engine.world.add_body(root, static_floor());
    engine.world.add_body(root, small_box(200.0, 50.0));

    run(&mut engine, 300);

    let body = engine.world.body(floor).unwrap();
    assert_eq!(body.position, DVec2::new(200.0, 235.0));
    assert_eq!(body.angle, 0.0);
    assert_eq!(body.velocity, DVec2::ZERO);
    assert_eq!(body.angular_velocity, 0.0);
}

#[test]
fn test_collision_starts_balance_ends() {
    let mut engine = Engine::default();
    let root = engine.world.root();
    engine.world.add_body(root, static_floor());
    // a box thrown upward: touches the floor, leaves, falls back
    engine.world.add_body(
        root,
        factory::rectangle(
            200.0,
            215.0,
            20.0,
            20.0,
            BodyConfig {
                velocity: DVec2::new(0.0, -8.0),
                ..Default::default()
            },
        ),
    );

    let starts = Rc::new(RefCell::new(Vec::new()));
    let ends = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&starts);
    engine
        .events
        .collision_start
        .on(move |e| s.borrow_mut().extend(e.pairs.iter().copied()));
    let e = Rc::clone(&ends);
    engine
        .events
        .collision_end
        .on(move |ev| e.borrow_mut().extend(ev.pairs.iter().copied()));

    run(&mut engine, 240);

    let starts = starts.borrow();
    let ends = ends.borrow();
    for pair in starts.iter() {
        let start_count = starts.iter().filter(|&p| p == pair).count();
        let end_count = ends.iter().filter(|&p| p == pair).count();
        assert!(
            start_count == end_count || start_count == end_count + 1,
            "every start is closed by exactly one end (or is still open)"
        );
    }
}

#[test]
fn test_determinism_across_runs() {
    fn checksum() -> Vec<u64> {
        let mut engine = Engine::default();
        let root = engine.world.root();
        engine.world.add_body(root, static_floor());
        for i in 0..5 {
            engine
                .world
                .add_body(root, small_box(150.0 + 25.0 * i as f64, 40.0 + 30.0 * i as f64));
        }
        run(&mut engine, 240);
        engine
            .world
            .bodies()
            .iter()
            .flat_map(|b| {
                [
                    b.position.x.to_bits(),
                    b.position.y.to_bits(),
                    b.angle.to_bits(),
                ]
            })
            .collect()
    }

    assert_eq!(checksum(), checksum(), "bit-identical trajectories");
}

#[test]
fn test_sensor_detects_without_response() {
    let mut engine = Engine::default();
    let root = engine.world.root();
    engine.world.add_body(
        root,
        factory::rectangle(
            200.0,
            150.0,
            200.0,
            20.0,
            BodyConfig {
                is_static: true,
                is_sensor: true,
                ..Default::default()
            },
        ),
    );
    let id = engine.world.add_body(root, small_box(200.0, 50.0));

    let started = Rc::new(RefCell::new(0));
    let s = Rc::clone(&started);
    engine
        .events
        .collision_start
        .on(move |_| *s.borrow_mut() += 1);

    run(&mut engine, 200);

    assert!(*started.borrow() >= 1, "the sensor reported the overlap");
    assert!(
        engine.world.body(id).unwrap().position.y > 170.0,
        "the box passed straight through the sensor"
    );
}

#[test]
fn test_compound_body_settles_as_one() {
    let mut engine = Engine::default();
    let root = engine.world.root();
    engine.world.add_body(root, static_floor());

    let compound = factory::from_vertices(
        200.0,
        100.0,
        vec![vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(40.0, 0.0),
            DVec2::new(40.0, 20.0),
            DVec2::new(20.0, 20.0),
            DVec2::new(20.0, 40.0),
            DVec2::new(0.0, 40.0),
        ]],
        BodyConfig::default(),
        false,
        0.01,
        10.0,
    )
    .unwrap();
    let id = engine.world.add_body(root, compound);

    run(&mut engine, 600);

    let body = engine.world.body(id).unwrap();
    assert!(
        body.velocity.length() < 0.1,
        "compound settled, |v| = {}",
        body.velocity.length()
    );
    assert!(body.position.y < 235.0, "resting on the floor, not inside it");
    assert_body_invariants(&engine);
}
