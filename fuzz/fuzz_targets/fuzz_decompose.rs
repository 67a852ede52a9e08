//! Fuzz convex decomposition with arbitrary polygons.
//!
//! The decomposer must never panic or loop forever, whatever the input:
//! degenerate rings, duplicate points, self-intersections.

#![no_main]

use glam::DVec2;
use libfuzzer_sys::fuzz_target;
use pivot2d::decompose;

fuzz_target!(|data: Vec<(f32, f32)>| {
    if data.len() < 3 || data.len() > 64 {
        return;
    }
    let mut polygon: Vec<DVec2> = data
        .iter()
        .map(|&(x, y)| DVec2::new(f64::from(x) % 1000.0, f64::from(y) % 1000.0))
        .filter(|p| p.is_finite())
        .collect();
    if polygon.len() < 3 {
        return;
    }

    decompose::remove_duplicates(&mut polygon, 0.01);
    if polygon.len() < 3 {
        return;
    }
    decompose::make_ccw(&mut polygon);
    let _ = decompose::is_simple(&polygon);
    let result = decompose::quick_decomp(&polygon);
    for piece in &result.polygons {
        assert!(piece.len() >= 3, "every piece is a polygon");
    }
});
