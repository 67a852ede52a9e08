//! SAT Narrowphase
//!
//! Exact collision testing for candidate pairs from the broadphase. Compound
//! bodies are tested per part (skipping the aggregate hull ring), each part
//! pair through the separating-axis test with support-vertex manifold
//! extraction.
//!
//! # Coherence
//!
//! When a pair collided last step and the combined motion of both parent
//! bodies is small, only the previously separating axis is re-tested. If it
//! still overlaps the cached manifold geometry is rebuilt from that single
//! axis, skipping the full axis sweep.

use glam::DVec2;

use crate::body::{Body, BodyId, CollisionFilter, Part};
use crate::composite::World;
use crate::pairs::{pair_id, Pairs};
use crate::vertices::{self, Vertex};

/// Combined parent motion below which the previous separating axis is
/// trusted.
const REUSE_MOTION_THRESHOLD: f64 = 3.0;

/// Identifies one part of one body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartHandle {
    /// Owning body.
    pub body: BodyId,
    /// Index into the body's `parts`.
    pub index: usize,
    /// The part's world-unique id.
    pub id: u32,
}

/// A contact support vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Support {
    /// World-space position.
    pub point: DVec2,
    /// Id of the part the vertex belongs to.
    pub part: u32,
    /// 1-based index within that part's ring.
    pub vertex_index: usize,
}

impl Support {
    fn from_vertex(vertex: &Vertex) -> Self {
        Self {
            point: vertex.point,
            part: vertex.part,
            vertex_index: vertex.index,
        }
    }
}

/// Result of a narrowphase test between two parts.
///
/// Parts are stored canonically: `part_a.id < part_b.id`. The normal is unit
/// length and oriented so that it is the direction `part_a` must be pushed
/// to separate the pair (the resolver's sign convention).
#[derive(Clone, Debug)]
pub struct Collision {
    /// Whether the parts intersect.
    pub collided: bool,
    /// First part (smaller id).
    pub part_a: PartHandle,
    /// Second part (larger id).
    pub part_b: PartHandle,
    /// Compound root of `part_a`.
    pub parent_a: BodyId,
    /// Compound root of `part_b`.
    pub parent_b: BodyId,
    /// Overlap along the separating axis.
    pub depth: f64,
    /// Unit collision normal, `part_a` toward `part_b`.
    pub normal: DVec2,
    /// Perpendicular of the normal.
    pub tangent: DVec2,
    /// `normal * depth`.
    pub penetration: DVec2,
    /// Whether the separating axis came from `part_a`'s axis set.
    pub axis_from_a: bool,
    /// Index of the separating axis within its owner's axis set.
    pub axis_number: usize,
    /// Up to two support vertices forming the manifold.
    pub supports: Vec<Support>,
}

struct PartContext<'a> {
    part: &'a Part,
    parent: &'a Body,
    handle: PartHandle,
}

// ============================================================================
// Detector
// ============================================================================

/// Run the narrowphase over the broadphase candidate list, returning all
/// confirmed collisions.
pub(crate) fn collisions(
    world: &World,
    broadphase_pairs: &[(BodyId, BodyId)],
    pairs: &Pairs,
) -> Vec<Collision> {
    let mut out = Vec::new();

    for &(id_a, id_b) in broadphase_pairs {
        let (Some(body_a), Some(body_b)) = (world.body(id_a), world.body(id_b)) else {
            continue;
        };

        if (body_a.is_static || body_a.is_sleeping) && (body_b.is_static || body_b.is_sleeping) {
            continue;
        }
        if !CollisionFilter::can_collide(&body_a.collision_filter, &body_b.collision_filter) {
            continue;
        }
        if !body_a.bounds().overlaps(body_b.bounds()) {
            continue;
        }

        // compounds are tested per part, skipping the aggregate hull ring
        let start_a = usize::from(body_a.parts.len() > 1);
        let start_b = usize::from(body_b.parts.len() > 1);
        for i in start_a..body_a.parts.len() {
            let part_a = &body_a.parts[i];
            for j in start_b..body_b.parts.len() {
                let part_b = &body_b.parts[j];

                let whole_bodies = i == 0 && j == 0;
                if !(whole_bodies || part_a.bounds.overlaps(&part_b.bounds)) {
                    continue;
                }

                let context_a = PartContext {
                    part: part_a,
                    parent: body_a,
                    handle: PartHandle {
                        body: id_a,
                        index: i,
                        id: part_a.id,
                    },
                };
                let context_b = PartContext {
                    part: part_b,
                    parent: body_b,
                    handle: PartHandle {
                        body: id_b,
                        index: j,
                        id: part_b.id,
                    },
                };

                let previous = pairs
                    .find(pair_id(part_a.id, part_b.id))
                    .map(|pair| &pair.collision);
                let collision = collides(context_a, context_b, previous);
                if collision.collided {
                    out.push(collision);
                }
            }
        }
    }
    out
}

// ============================================================================
// SAT
// ============================================================================

/// Separating-axis test between two convex parts.
fn collides(a: PartContext<'_>, b: PartContext<'_>, previous: Option<&Collision>) -> Collision {
    // canonical order by part id
    let (a, b) = if a.handle.id < b.handle.id { (a, b) } else { (b, a) };

    let mut collision = Collision {
        collided: false,
        part_a: a.handle,
        part_b: b.handle,
        parent_a: a.parent.id,
        parent_b: b.parent.id,
        depth: 0.0,
        normal: DVec2::ZERO,
        tangent: DVec2::ZERO,
        penetration: DVec2::ZERO,
        axis_from_a: true,
        axis_number: 0,
        supports: Vec::new(),
    };

    let can_reuse = previous.map_or(false, |prev| {
        let motion = a.parent.speed * a.parent.speed
            + a.parent.angular_speed * a.parent.angular_speed
            + b.parent.speed * b.parent.speed
            + b.parent.angular_speed * b.parent.angular_speed;
        prev.collided && motion < REUSE_MOTION_THRESHOLD
    });

    let (depth, axis_from_a, axis_number) = if can_reuse {
        // test only the previously separating axis
        let prev = previous.expect("can_reuse implies previous");
        let (axis_owner, other) = if prev.axis_from_a { (&a, &b) } else { (&b, &a) };
        let Some(&axis) = axis_owner.part.axes.get(prev.axis_number) else {
            return collision;
        };
        let (overlap, _) = overlap_axes(
            &axis_owner.part.vertices,
            &other.part.vertices,
            std::slice::from_ref(&axis),
        );
        if overlap <= 0.0 {
            return collision;
        }
        (overlap, prev.axis_from_a, prev.axis_number)
    } else {
        let (overlap_ab, number_ab) =
            overlap_axes(&a.part.vertices, &b.part.vertices, &a.part.axes);
        if overlap_ab <= 0.0 {
            return collision;
        }
        let (overlap_ba, number_ba) =
            overlap_axes(&b.part.vertices, &a.part.vertices, &b.part.axes);
        if overlap_ba <= 0.0 {
            return collision;
        }

        // equal overlaps keep A's axis
        if overlap_ab < overlap_ba {
            (overlap_ab, true, number_ab)
        } else {
            (overlap_ba, false, number_ba)
        }
    };

    collision.collided = true;
    collision.depth = depth;
    collision.axis_from_a = axis_from_a;
    collision.axis_number = axis_number;

    let axis = if axis_from_a {
        a.part.axes[axis_number]
    } else {
        b.part.axes[axis_number]
    };
    // orient the normal as the push direction of part A
    collision.normal = if axis.dot(b.part.position - a.part.position) < 0.0 {
        axis
    } else {
        -axis
    };
    collision.tangent = collision.normal.perp();
    collision.penetration = collision.normal * collision.depth;

    // support vertices of B deepest into A
    let candidates = find_supports(&b.part.vertices, a.part.position, collision.normal);
    let mut supports: Vec<Support> = Vec::with_capacity(2);
    for candidate in &candidates {
        if vertices::contains(&a.part.vertices, candidate.point) {
            supports.push(*candidate);
        }
    }
    // too few: try A's vertices against B
    if supports.len() < 2 {
        let candidates_a = find_supports(&a.part.vertices, b.part.position, -collision.normal);
        for candidate in &candidates_a {
            if supports.len() >= 2 {
                break;
            }
            if vertices::contains(&b.part.vertices, candidate.point) {
                supports.push(*candidate);
            }
        }
    }
    // none contained: fall back to the deepest candidate
    if supports.is_empty() {
        supports.push(candidates[0]);
    }
    collision.supports = supports;
    collision
}

/// Minimum overlap of two vertex sets across a set of projection axes.
///
/// Returns `(overlap, axis_number)`; a non-positive overlap means a
/// separating axis was found (early out).
fn overlap_axes(verts_a: &[Vertex], verts_b: &[Vertex], axes: &[DVec2]) -> (f64, usize) {
    let mut min_overlap = f64::MAX;
    let mut number = 0;

    for (i, &axis) in axes.iter().enumerate() {
        let (min_a, max_a) = project_to_axis(verts_a, axis);
        let (min_b, max_b) = project_to_axis(verts_b, axis);
        let overlap = (max_a - min_b).min(max_b - min_a);

        if overlap <= 0.0 {
            return (overlap, i);
        }
        if overlap < min_overlap {
            min_overlap = overlap;
            number = i;
        }
    }
    (min_overlap, number)
}

/// Project a ring onto an axis in a single scan.
fn project_to_axis(verts: &[Vertex], axis: DVec2) -> (f64, f64) {
    let mut min = verts[0].point.dot(axis);
    let mut max = min;
    for vertex in &verts[1..] {
        let dot = vertex.point.dot(axis);
        if dot > max {
            max = dot;
        } else if dot < min {
            min = dot;
        }
    }
    (min, max)
}

/// The deepest vertex of `verts` against `body_position` along `-normal`,
/// plus the deeper of its two ring neighbours.
fn find_supports(verts: &[Vertex], body_position: DVec2, normal: DVec2) -> [Support; 2] {
    let mut nearest_distance = f64::MAX;
    let mut nearest_index = 0;

    for (i, vertex) in verts.iter().enumerate() {
        let distance = -normal.dot(vertex.point - body_position);
        if distance < nearest_distance {
            nearest_distance = distance;
            nearest_index = i;
        }
    }
    let deepest = Support::from_vertex(&verts[nearest_index]);

    let prev = &verts[(nearest_index + verts.len() - 1) % verts.len()];
    let next = &verts[(nearest_index + 1) % verts.len()];
    let prev_distance = -normal.dot(prev.point - body_position);
    let next_distance = -normal.dot(next.point - body_position);
    let neighbour = if prev_distance < next_distance {
        Support::from_vertex(prev)
    } else {
        Support::from_vertex(next)
    };

    [deepest, neighbour]
}

// ============================================================================
// Tests
// ============================================================================
