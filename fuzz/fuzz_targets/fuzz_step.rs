//! Fuzz the engine step with an arbitrary body soup.
//!
//! Whatever bodies are thrown in, stepping must not panic and every body
//! must keep finite bounds.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pivot2d::{factory, BodyConfig, Engine};

fuzz_target!(|data: Vec<(i16, i16, u8, u8)>| {
    if data.is_empty() || data.len() > 32 {
        return;
    }

    let mut engine = Engine::default();
    let root = engine.world.root();

    engine.world.add_body(
        root,
        factory::rectangle(
            0.0,
            400.0,
            2000.0,
            40.0,
            BodyConfig {
                is_static: true,
                ..Default::default()
            },
        ),
    );

    for &(x, y, w, h) in &data {
        let width = 4.0 + f64::from(w % 60);
        let height = 4.0 + f64::from(h % 60);
        engine.world.add_body(
            root,
            factory::rectangle(
                f64::from(x),
                f64::from(y),
                width,
                height,
                BodyConfig::default(),
            ),
        );
    }

    for _ in 0..30 {
        engine.step(1000.0 / 60.0, 1.0);
    }

    for body in engine.world.bodies() {
        assert!(
            body.position.is_finite(),
            "positions stay finite after stepping"
        );
    }
});
