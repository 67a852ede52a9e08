//! Distance Constraints
//!
//! Pin, line and spring constraints between two bodies (or a body and a
//! world point), solved by Gauss-Seidel position projection with warm
//! starting: each body accumulates a `constraint_impulse` that is re-applied
//! at the start of the next step (scaled by [`WARMING`]) and used to sync
//! compound geometry after solving.

use glam::DVec2;

use crate::body::{Body, BodyId};
use crate::composite::World;
use crate::events::SleepQueues;
use crate::math;
use crate::sleeping;
use crate::vertices;

/// Identifier of a constraint within a world.
pub type ConstraintId = u32;

/// Fraction of the accumulated impulse carried into the next step.
const WARMING: f64 = 0.4;
/// Scales the torque produced by off-centre anchors.
const TORQUE_DAMPEN: f64 = 1.0;
/// Lower clamp on the current anchor separation.
const MIN_LENGTH: f64 = 1e-6;

/// Advisory rendering hint derived from the constraint parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RenderHint {
    /// Zero-length constraint: draw as a pin.
    Pin,
    /// Soft constraint: draw as a spring.
    Spring,
    /// Stiff constraint: draw as a line.
    Line,
}

/// Construction options for a constraint. All defaults documented inline.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintConfig {
    /// Display label. Default `"Constraint"`.
    pub label: String,
    /// First endpoint body; `None` pins `point_a` in world space.
    pub body_a: Option<BodyId>,
    /// Second endpoint body; `None` pins `point_b` in world space.
    pub body_b: Option<BodyId>,
    /// Anchor relative to `body_a` (or a world point without a body).
    /// Default origin.
    pub point_a: DVec2,
    /// Anchor relative to `body_b` (or a world point without a body).
    /// Default origin.
    pub point_b: DVec2,
    /// Rest length; defaults to the anchor separation at creation.
    pub length: Option<f64>,
    /// Stiffness in `[0, 1]`; `1` is rigid. Default `0.7`.
    pub stiffness: f64,
    /// Damping along the constraint normal. Default `0`.
    pub damping: f64,
    /// How strongly anchors resist rotation, `[0, 1]`. Default `0`.
    pub angular_stiffness: f64,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            label: "Constraint".to_owned(),
            body_a: None,
            body_b: None,
            point_a: DVec2::ZERO,
            point_b: DVec2::ZERO,
            length: None,
            stiffness: 0.7,
            damping: 0.0,
            angular_stiffness: 0.0,
        }
    }
}

/// A distance/spring/pin constraint.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constraint {
    /// World-unique id.
    pub id: ConstraintId,
    /// Display label.
    pub label: String,
    /// First endpoint body.
    pub body_a: Option<BodyId>,
    /// Second endpoint body.
    pub body_b: Option<BodyId>,
    /// Anchor relative to `body_a`, or a world point.
    pub point_a: DVec2,
    /// Anchor relative to `body_b`, or a world point.
    pub point_b: DVec2,
    /// Rest length, clamped to at least [`MIN_LENGTH`] during solving.
    pub length: f64,
    /// Stiffness in `[0, 1]`.
    pub stiffness: f64,
    /// Damping along the constraint normal.
    pub damping: f64,
    /// Anchor resistance to rotation.
    pub angular_stiffness: f64,
    /// Body angle the `point_a` anchor was last rotated to.
    pub angle_a: f64,
    /// Body angle the `point_b` anchor was last rotated to.
    pub angle_b: f64,
    /// Advisory rendering hint.
    pub render: RenderHint,
}

impl Constraint {
    pub(crate) fn from_config(
        id: ConstraintId,
        config: &ConstraintConfig,
        body_a: Option<&Body>,
        body_b: Option<&Body>,
    ) -> Self {
        let world_a = body_a
            .map(|b| b.position + config.point_a)
            .unwrap_or(config.point_a);
        let world_b = body_b
            .map(|b| b.position + config.point_b)
            .unwrap_or(config.point_b);
        let length = config.length.unwrap_or_else(|| (world_a - world_b).length());

        let render = if length == 0.0 {
            RenderHint::Pin
        } else if config.stiffness < 0.9 {
            RenderHint::Spring
        } else {
            RenderHint::Line
        };

        Self {
            id,
            label: config.label.clone(),
            body_a: config.body_a,
            body_b: config.body_b,
            point_a: config.point_a,
            point_b: config.point_b,
            length,
            stiffness: config.stiffness,
            damping: config.damping,
            angular_stiffness: config.angular_stiffness,
            angle_a: body_a.map(|b| b.angle).unwrap_or(0.0),
            angle_b: body_b.map(|b| b.angle).unwrap_or(0.0),
            render,
        }
    }
}

// ============================================================================
// Solver
// ============================================================================

/// Warm start: re-apply each body's accumulated constraint impulse as a raw
/// pose offset. Static bodies are skipped.
pub(crate) fn pre_solve_all(world: &mut World, body_ids: &[BodyId]) {
    for &id in body_ids {
        let Some(body) = world.body_mut(id) else {
            continue;
        };
        if body.is_static
            || (body.constraint_impulse == DVec2::ZERO && body.constraint_impulse_angle == 0.0)
        {
            continue;
        }
        body.position += body.constraint_impulse;
        body.angle += body.constraint_impulse_angle;
    }
}

/// Solve every constraint once: constraints with at least one fixed endpoint
/// first, then free-free constraints.
pub(crate) fn solve_all(world: &mut World, constraint_ids: &[ConstraintId], time_scale: f64) {
    for &id in constraint_ids {
        if is_fixed(world, id) {
            solve_one(world, id, time_scale);
        }
    }
    for &id in constraint_ids {
        if !is_fixed(world, id) {
            solve_one(world, id, time_scale);
        }
    }
}

fn is_fixed(world: &World, id: ConstraintId) -> bool {
    let Some(constraint) = world.constraint(id) else {
        return false;
    };
    let fixed_a = match constraint.body_a {
        Some(body) => world.body(body).map(|b| b.is_static).unwrap_or(true),
        None => true,
    };
    let fixed_b = match constraint.body_b {
        Some(body) => world.body(body).map(|b| b.is_static).unwrap_or(true),
        None => true,
    };
    fixed_a || fixed_b
}

fn solve_one(world: &mut World, id: ConstraintId, time_scale: f64) {
    let Some((constraint, body_a, body_b)) = world.constraint_with_bodies_mut(id) else {
        return;
    };
    if body_a.is_none() && body_b.is_none() {
        return;
    }

    // keep local anchors current with body rotation
    if let Some(body) = body_a.as_deref() {
        if !body.is_static {
            constraint.point_a = math::rotate(constraint.point_a, body.angle - constraint.angle_a);
            constraint.angle_a = body.angle;
        }
    }
    if let Some(body) = body_b.as_deref() {
        if !body.is_static {
            constraint.point_b = math::rotate(constraint.point_b, body.angle - constraint.angle_b);
            constraint.angle_b = body.angle;
        }
    }

    let world_a = body_a
        .as_deref()
        .map(|b| b.position + constraint.point_a)
        .unwrap_or(constraint.point_a);
    let world_b = body_b
        .as_deref()
        .map(|b| b.position + constraint.point_b)
        .unwrap_or(constraint.point_b);

    let delta = world_a - world_b;
    let current_length = delta.length().max(MIN_LENGTH);
    let difference = (current_length - constraint.length) / current_length;
    let stiffness = if constraint.stiffness < 1.0 {
        constraint.stiffness * time_scale
    } else {
        constraint.stiffness
    };
    let force = delta * (difference * stiffness);

    let inv_mass_a = body_a.as_deref().map_or(0.0, |b| b.inverse_mass);
    let inv_mass_b = body_b.as_deref().map_or(0.0, |b| b.inverse_mass);
    let inv_inertia_a = body_a.as_deref().map_or(0.0, |b| b.inverse_inertia);
    let inv_inertia_b = body_b.as_deref().map_or(0.0, |b| b.inverse_inertia);
    let mass_total = inv_mass_a + inv_mass_b;
    let resistance_total = mass_total + inv_inertia_a + inv_inertia_b;

    // relative velocity along the normal, for damping
    let mut normal = DVec2::ZERO;
    let mut normal_velocity = 0.0;
    if constraint.damping > 0.0 {
        normal = delta / current_length;
        let velocity_a = body_a
            .as_deref()
            .map_or(DVec2::ZERO, |b| b.position - b.position_prev);
        let velocity_b = body_b
            .as_deref()
            .map_or(DVec2::ZERO, |b| b.position - b.position_prev);
        normal_velocity = normal.dot(velocity_b - velocity_a);
    }

    if let Some(body) = body_a {
        if !body.is_static {
            let share = body.inverse_mass / mass_total;
            body.constraint_impulse -= force * share;
            body.position -= force * share;
            if constraint.damping > 0.0 {
                body.position_prev -= normal * (constraint.damping * normal_velocity * share);
            }
            let torque = math::cross(constraint.point_a, force) / resistance_total
                * TORQUE_DAMPEN
                * body.inverse_inertia
                * (1.0 - constraint.angular_stiffness);
            body.constraint_impulse_angle -= torque;
            body.angle -= torque;
        }
    }
    if let Some(body) = body_b {
        if !body.is_static {
            let share = body.inverse_mass / mass_total;
            body.constraint_impulse += force * share;
            body.position += force * share;
            if constraint.damping > 0.0 {
                body.position_prev += normal * (constraint.damping * normal_velocity * share);
            }
            let torque = math::cross(constraint.point_b, force) / resistance_total
                * TORQUE_DAMPEN
                * body.inverse_inertia
                * (1.0 - constraint.angular_stiffness);
            body.constraint_impulse_angle += torque;
            body.angle += torque;
        }
    }
}

/// Sync geometry with the pose changes the solver made, wake moved bodies
/// and decay the warm-start impulses.
pub(crate) fn post_solve_all(world: &mut World, body_ids: &[BodyId], queues: &mut SleepQueues) {
    for &id in body_ids {
        let Some(body) = world.body_mut(id) else {
            continue;
        };
        if body.is_static
            || (body.constraint_impulse == DVec2::ZERO && body.constraint_impulse_angle == 0.0)
        {
            continue;
        }

        sleeping::set(body, false, queues);

        let impulse = body.constraint_impulse;
        let impulse_angle = body.constraint_impulse_angle;
        let position = body.position;
        let velocity = body.velocity;
        for (i, part) in body.parts.iter_mut().enumerate() {
            vertices::translate(&mut part.vertices, impulse);
            if i > 0 {
                part.position += impulse;
            }
            if impulse_angle != 0.0 {
                vertices::rotate(&mut part.vertices, impulse_angle, position);
                crate::axes::rotate(&mut part.axes, impulse_angle);
                if i > 0 {
                    part.position = math::rotate_about(part.position, impulse_angle, position);
                }
            }
            part.bounds.update(&part.vertices, Some(velocity));
        }
        body.parts[0].position = body.position;

        body.constraint_impulse *= WARMING;
        body.constraint_impulse_angle *= WARMING;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyConfig;
    use crate::factory;

    #[test]
    fn test_default_length_measured_at_creation() {
        let mut world = World::new();
        let root = world.root();
        let a = world.add_body(
            root,
            factory::rectangle(0.0, 0.0, 10.0, 10.0, BodyConfig::default()),
        );
        let b = world.add_body(
            root,
            factory::rectangle(30.0, 40.0, 10.0, 10.0, BodyConfig::default()),
        );
        let id = world.add_constraint(
            root,
            ConstraintConfig {
                body_a: Some(a),
                body_b: Some(b),
                ..Default::default()
            },
        );
        let constraint = world.constraint(id).unwrap();
        assert!((constraint.length - 50.0).abs() < 1e-9);
        assert_eq!(constraint.render, RenderHint::Spring);
    }

    #[test]
    fn test_render_hints() {
        let mut world = World::new();
        let root = world.root();
        let pin = world.add_constraint(
            root,
            ConstraintConfig {
                point_a: DVec2::new(5.0, 5.0),
                point_b: DVec2::new(5.0, 5.0),
                ..Default::default()
            },
        );
        assert_eq!(world.constraint(pin).unwrap().render, RenderHint::Pin);

        let line = world.add_constraint(
            root,
            ConstraintConfig {
                point_b: DVec2::new(10.0, 0.0),
                stiffness: 1.0,
                ..Default::default()
            },
        );
        assert_eq!(world.constraint(line).unwrap().render, RenderHint::Line);
    }

    #[test]
    fn test_solve_pulls_toward_rest_length() {
        let mut world = World::new();
        let root = world.root();
        let anchor = world.add_body(
            root,
            factory::rectangle(
                0.0,
                0.0,
                10.0,
                10.0,
                BodyConfig {
                    is_static: true,
                    ..Default::default()
                },
            ),
        );
        let bob = world.add_body(
            root,
            factory::rectangle(100.0, 0.0, 10.0, 10.0, BodyConfig::default()),
        );
        let id = world.add_constraint(
            root,
            ConstraintConfig {
                body_a: Some(anchor),
                body_b: Some(bob),
                length: Some(50.0),
                stiffness: 1.0,
                ..Default::default()
            },
        );

        let constraints = [id];
        let bodies = world.all_bodies();
        let mut queues = SleepQueues::default();
        for _ in 0..50 {
            pre_solve_all(&mut world, &bodies);
            solve_all(&mut world, &constraints, 1.0);
            post_solve_all(&mut world, &bodies, &mut queues);
        }

        let distance = world.body(bob).unwrap().position.length();
        assert!(
            (distance - 50.0).abs() < 1.0,
            "converged near rest length, got {distance}"
        );
        let anchor_body = world.body(anchor).unwrap();
        assert_eq!(anchor_body.position, DVec2::ZERO, "static end unmoved");
    }

    #[test]
    fn test_solve_without_bodies_is_noop() {
        let mut world = World::new();
        let root = world.root();
        let id = world.add_constraint(
            root,
            ConstraintConfig {
                point_a: DVec2::ZERO,
                point_b: DVec2::new(10.0, 0.0),
                ..Default::default()
            },
        );
        solve_all(&mut world, &[id], 1.0);
    }

    #[test]
    fn test_coincident_anchors_stay_finite() {
        let mut world = World::new();
        let root = world.root();
        let a = world.add_body(
            root,
            factory::rectangle(0.0, 0.0, 10.0, 10.0, BodyConfig::default()),
        );
        let b = world.add_body(
            root,
            factory::rectangle(0.0, 0.0, 10.0, 10.0, BodyConfig::default()),
        );
        let id = world.add_constraint(
            root,
            ConstraintConfig {
                body_a: Some(a),
                body_b: Some(b),
                length: Some(10.0),
                stiffness: 1.0,
                ..Default::default()
            },
        );
        solve_all(&mut world, &[id], 1.0);
        let body = world.body(a).unwrap();
        assert!(body.position.is_finite(), "zero length clamps, no NaN");
    }

    #[test]
    fn test_post_solve_decays_impulse_and_wakes() {
        let mut world = World::new();
        let root = world.root();
        let id = world.add_body(
            root,
            factory::rectangle(0.0, 0.0, 10.0, 10.0, BodyConfig::default()),
        );
        {
            let body = world.body_mut(id).unwrap();
            body.set_sleeping(true);
            body.constraint_impulse = DVec2::new(1.0, 0.0);
        }
        let mut queues = SleepQueues::default();
        post_solve_all(&mut world, &[id], &mut queues);

        let body = world.body(id).unwrap();
        assert!((body.constraint_impulse.x - WARMING).abs() < 1e-12);
        assert!(!body.is_sleeping);
        assert_eq!(queues.sleep_end, vec![id]);
    }
}
