//! Edge-Normal Axis Sets
//!
//! The SAT narrowphase projects onto the unit edge normals of each polygon.
//! Parallel edges produce the same projection axis, so normals are
//! deduplicated by the gradient of the normal, quantized to 3 decimal places
//! to coalesce numerically-parallel edges. A box therefore carries 2 axes,
//! not 4.

use std::collections::HashSet;

use glam::DVec2;

use crate::vertices::Vertex;

/// Quantized-gradient key used for axis deduplication.
///
/// Vertical-gradient normals (`y == 0`) map to a sentinel.
#[inline]
fn gradient_key(normal: DVec2) -> i64 {
    if normal.y == 0.0 {
        i64::MAX
    } else {
        ((normal.x / normal.y) * 1000.0).round() as i64
    }
}

/// One unit normal per unique edge direction, in edge order.
#[must_use]
pub fn from_vertices(vertices: &[Vertex]) -> Vec<DVec2> {
    let mut axes = Vec::with_capacity(vertices.len());
    let mut seen: HashSet<i64> = HashSet::with_capacity(vertices.len());

    for i in 0..vertices.len() {
        let j = (i + 1) % vertices.len();
        let normal = DVec2::new(
            vertices[j].point.y - vertices[i].point.y,
            vertices[i].point.x - vertices[j].point.x,
        )
        .normalize();

        if seen.insert(gradient_key(normal)) {
            axes.push(normal);
        }
    }
    axes
}

/// Rotate every axis by `angle` radians.
pub fn rotate(axes: &mut [DVec2], angle: f64) {
    if angle == 0.0 {
        return;
    }
    let (sin, cos) = angle.sin_cos();
    for axis in axes {
        *axis = DVec2::new(axis.x * cos - axis.y * sin, axis.x * sin + axis.y * cos);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertices;

    #[test]
    fn test_box_has_two_axes() {
        let ring = vertices::create(&[
            DVec2::new(0.0, 0.0),
            DVec2::new(40.0, 0.0),
            DVec2::new(40.0, 40.0),
            DVec2::new(0.0, 40.0),
        ]);
        let axes = from_vertices(&ring);
        assert_eq!(axes.len(), 2, "opposite box edges share an axis");
        for axis in &axes {
            assert!((axis.length() - 1.0).abs() < 1e-12, "axes are unit length");
        }
    }

    #[test]
    fn test_triangle_has_three_axes() {
        let ring = vertices::create(&[
            DVec2::new(0.0, 0.0),
            DVec2::new(40.0, 0.0),
            DVec2::new(20.0, 30.0),
        ]);
        assert_eq!(from_vertices(&ring).len(), 3);
    }

    #[test]
    fn test_near_parallel_edges_coalesce() {
        // Two long edges differing by well under the 3-decimal gradient
        // quantum collapse onto one axis.
        let ring = vertices::create(&[
            DVec2::new(0.0, 0.0),
            DVec2::new(100.0, 0.0),
            DVec2::new(100.0, 10.0),
            DVec2::new(0.0, 10.00001),
        ]);
        assert_eq!(from_vertices(&ring).len(), 3);
    }

    #[test]
    fn test_rotate_preserves_length() {
        let ring = vertices::create(&[
            DVec2::new(0.0, 0.0),
            DVec2::new(40.0, 0.0),
            DVec2::new(20.0, 30.0),
        ]);
        let mut axes = from_vertices(&ring);
        let before = axes.clone();
        rotate(&mut axes, 1.3);
        for (a, b) in axes.iter().zip(&before) {
            assert!((a.length() - 1.0).abs() < 1e-12);
            assert!((a.angle_to(*b).abs() - 1.3).abs() < 1e-9);
        }
    }
}
