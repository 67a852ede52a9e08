//! Axis-Aligned Bounding Boxes
//!
//! World-space AABBs over vertex rings. `update` can expand the box by a
//! velocity hint on the outbound side only, producing the swept bound the
//! broadphase uses to keep fast bodies inside their grid region for a step.

use glam::DVec2;

use crate::vertices::Vertex;

/// Axis-aligned bounding box with `min <= max` componentwise.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    /// Minimum corner.
    pub min: DVec2,
    /// Maximum corner.
    pub max: DVec2,
}

impl Aabb {
    /// The unbounded box; overlaps everything.
    pub const INFINITE: Self = Self {
        min: DVec2::splat(f64::NEG_INFINITY),
        max: DVec2::splat(f64::INFINITY),
    };

    /// Create from explicit corners.
    #[inline]
    #[must_use]
    pub const fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    /// Tight bound of a vertex ring.
    #[must_use]
    pub fn from_vertices(vertices: &[Vertex]) -> Self {
        let mut bounds = Self {
            min: DVec2::splat(f64::INFINITY),
            max: DVec2::splat(f64::NEG_INFINITY),
        };
        bounds.update(vertices, None);
        bounds
    }

    /// Recompute from a ring, optionally expanded by a velocity hint.
    ///
    /// The expansion is applied on the outbound side only: a body moving
    /// right grows its `max.x`, not its `min.x`.
    pub fn update(&mut self, vertices: &[Vertex], velocity: Option<DVec2>) {
        self.min = DVec2::splat(f64::INFINITY);
        self.max = DVec2::splat(f64::NEG_INFINITY);

        for vertex in vertices {
            self.min = self.min.min(vertex.point);
            self.max = self.max.max(vertex.point);
        }

        if let Some(velocity) = velocity {
            if velocity.x > 0.0 {
                self.max.x += velocity.x;
            } else {
                self.min.x += velocity.x;
            }
            if velocity.y > 0.0 {
                self.max.y += velocity.y;
            } else {
                self.min.y += velocity.y;
            }
        }
    }

    /// Whether a point lies inside (boundary inclusive).
    #[inline]
    #[must_use]
    pub fn contains_point(&self, point: DVec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Whether two boxes overlap (boundary touching counts).
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.max.y >= other.min.y
            && self.min.y <= other.max.y
    }

    /// Move the box by `delta`.
    #[inline]
    pub fn translate(&mut self, delta: DVec2) {
        self.min += delta;
        self.max += delta;
    }

    /// Move the box so its minimum corner sits at `position`.
    #[inline]
    pub fn shift(&mut self, position: DVec2) {
        let size = self.max - self.min;
        self.min = position;
        self.max = position + size;
    }
}

// ============================================================================
// Tests
// ============================================================================
