//! World Queries
//!
//! Read-only spatial lookups over a world: which bodies contain a point,
//! overlap a region, or cross a ray segment. Compound bodies are tested per
//! part, skipping the aggregate hull ring. Results follow the world's stable
//! body order.

use glam::DVec2;

use crate::body::{Body, BodyId};
use crate::bounds::Aabb;
use crate::composite::World;
use crate::decompose;
use crate::vertices;

fn part_range(body: &Body) -> std::ops::Range<usize> {
    usize::from(body.parts.len() > 1)..body.parts.len()
}

/// Bodies whose geometry contains `point`.
#[must_use]
pub fn point(world: &World, point: DVec2) -> Vec<BodyId> {
    let mut out = Vec::new();
    for body in world.bodies() {
        if !body.bounds().contains_point(point) {
            continue;
        }
        for part in &body.parts[part_range(body)] {
            if part.bounds.contains_point(point) && vertices::contains(&part.vertices, point) {
                out.push(body.id);
                break;
            }
        }
    }
    out
}

/// Bodies whose bounds overlap `bounds` (or, with `outside`, those fully
/// clear of it).
#[must_use]
pub fn region(world: &World, bounds: &Aabb, outside: bool) -> Vec<BodyId> {
    world
        .bodies()
        .iter()
        .filter(|body| body.bounds().overlaps(bounds) != outside)
        .map(|body| body.id)
        .collect()
}

/// Bodies crossed by the segment from `start` to `end`.
#[must_use]
pub fn ray(world: &World, start: DVec2, end: DVec2) -> Vec<BodyId> {
    let ray_bounds = Aabb::new(start.min(end), start.max(end));
    let mut out = Vec::new();

    for body in world.bodies() {
        if !body.bounds().overlaps(&ray_bounds) {
            continue;
        }
        'parts: for part in &body.parts[part_range(body)] {
            if !part.bounds.overlaps(&ray_bounds) {
                continue;
            }
            // a segment hits a convex ring iff it starts inside or crosses
            // an edge
            if vertices::contains(&part.vertices, start) {
                out.push(body.id);
                break 'parts;
            }
            let n = part.vertices.len();
            for i in 0..n {
                let a = part.vertices[i].point;
                let b = part.vertices[(i + 1) % n].point;
                if decompose::segments_intersect(start, end, a, b) {
                    out.push(body.id);
                    break 'parts;
                }
            }
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyConfig;
    use crate::factory;

    fn sample_world() -> (World, BodyId, BodyId) {
        let mut world = World::new();
        let root = world.root();
        let near = world.add_body(
            root,
            factory::rectangle(100.0, 100.0, 40.0, 40.0, BodyConfig::default()),
        );
        let far = world.add_body(
            root,
            factory::rectangle(400.0, 100.0, 40.0, 40.0, BodyConfig::default()),
        );
        (world, near, far)
    }

    #[test]
    fn test_point_query() {
        let (world, near, _) = sample_world();
        assert_eq!(point(&world, DVec2::new(100.0, 100.0)), vec![near]);
        assert_eq!(point(&world, DVec2::new(100.0, 119.0)), vec![near]);
        assert!(point(&world, DVec2::new(100.0, 121.0)).is_empty());
    }

    #[test]
    fn test_region_query() {
        let (world, near, far) = sample_world();
        let window = Aabb::new(DVec2::new(0.0, 0.0), DVec2::new(200.0, 200.0));
        assert_eq!(region(&world, &window, false), vec![near]);
        assert_eq!(region(&world, &window, true), vec![far]);
    }

    #[test]
    fn test_ray_query() {
        let (world, near, far) = sample_world();
        // horizontal ray through both boxes
        let hits = ray(&world, DVec2::new(0.0, 100.0), DVec2::new(500.0, 100.0));
        assert_eq!(hits, vec![near, far]);
        // short ray reaches neither
        assert!(ray(&world, DVec2::new(0.0, 100.0), DVec2::new(50.0, 100.0)).is_empty());
        // ray starting inside still hits
        let hits = ray(&world, DVec2::new(100.0, 100.0), DVec2::new(101.0, 100.0));
        assert_eq!(hits, vec![near]);
    }
}
