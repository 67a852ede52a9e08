//! Contact Resolver
//!
//! Two iterated sequential-impulse solvers run per step over the active
//! pairs: a positional pass that pushes penetrating bodies apart (with slop,
//! shared between contacts, dampened and warmed across steps) and a velocity
//! pass that applies restitution and Coulomb friction impulses. Verlet
//! integration lets both passes work purely on poses: velocity impulses
//! perturb `position_prev`/`angle_prev` instead of explicit velocities.

use glam::DVec2;

use crate::body::BodyId;
use crate::composite::World;
use crate::math;
use crate::pairs::Pairs;

/// Fraction of the positional error corrected per iteration.
const POSITION_DAMPEN: f64 = 0.9;
/// Fraction of the positional impulse carried into the next step.
const POSITION_WARMING: f64 = 0.8;
/// Squared normal velocity above which a contact is treated as impacting
/// rather than resting.
const RESTING_THRESH: f64 = 4.0;
/// Squared tangent velocity above which friction memory is discarded.
const RESTING_THRESH_TANGENT: f64 = 6.0;
/// Scales separation+velocity into the normal-force estimate used by the
/// friction cap.
const FRICTION_NORMAL_MULTIPLIER: f64 = 5.0;

// ============================================================================
// Position solver
// ============================================================================

/// Count the active contacts touching each body; the positional correction
/// is shared between them.
pub(crate) fn pre_solve_position(world: &mut World, pairs: &Pairs) {
    for pair in &pairs.list {
        if !pair.is_active {
            continue;
        }
        let active_count = pair.active_contacts.len() as u32;
        if let Some(body) = world.body_mut(pair.body_a) {
            body.total_contacts += active_count;
        }
        if let Some(body) = world.body_mut(pair.body_b) {
            body.total_contacts += active_count;
        }
    }
}

/// One iteration of penetration correction: refresh separations, then
/// accumulate a shared positional impulse on each body.
pub(crate) fn solve_position(world: &mut World, pairs: &mut Pairs, time_scale: f64) {
    // update the signed separation of every active pair
    for pair in &mut pairs.list {
        if !pair.is_active || pair.is_sensor {
            continue;
        }
        let (Some(body_a), Some(body_b)) = (world.body(pair.body_a), world.body(pair.body_b))
        else {
            continue;
        };
        // separation between the colliding edges: the depth plus whatever
        // virtual movement the accumulated impulses already account for
        let body_b_to_a =
            body_b.position_impulse - body_a.position_impulse + pair.collision.penetration;
        pair.separation = pair.collision.normal.dot(body_b_to_a);
    }

    for pair in &pairs.list {
        if !pair.is_active || pair.is_sensor {
            continue;
        }
        let normal = pair.collision.normal;
        let Some((body_a, body_b)) = world.bodies_pair_mut(pair.body_a, pair.body_b) else {
            continue;
        };

        let mut position_impulse = (pair.separation - pair.slop) * time_scale;
        if body_a.is_static || body_b.is_static {
            position_impulse *= 2.0;
        }

        if !(body_a.is_static || body_a.is_sleeping) {
            let contact_share = POSITION_DAMPEN / body_a.total_contacts as f64;
            body_a.position_impulse += normal * (position_impulse * contact_share);
        }
        if !(body_b.is_static || body_b.is_sleeping) {
            let contact_share = POSITION_DAMPEN / body_b.total_contacts as f64;
            body_b.position_impulse -= normal * (position_impulse * contact_share);
        }
    }
}

/// Apply the accumulated positional impulses to the geometry without
/// changing velocities, then decay or reset them for the next step.
pub(crate) fn post_solve_position(world: &mut World, body_ids: &[BodyId]) {
    for &id in body_ids {
        let Some(body) = world.body_mut(id) else {
            continue;
        };
        body.total_contacts = 0;

        let impulse = body.position_impulse;
        if impulse == DVec2::ZERO {
            continue;
        }

        let velocity = body.velocity;
        for part in &mut body.parts {
            crate::vertices::translate(&mut part.vertices, impulse);
            part.bounds.update(&part.vertices, Some(velocity));
            part.position += impulse;
        }
        body.position += impulse;
        // move without changing velocity
        body.position_prev += impulse;

        if body.position_impulse.dot(body.velocity) < 0.0 {
            // impulse opposes motion: spent, drop it
            body.position_impulse = DVec2::ZERO;
        } else {
            body.position_impulse *= POSITION_WARMING;
        }
    }
}

// ============================================================================
// Velocity solver
// ============================================================================

/// Warm start: re-apply each contact's accumulated impulses as a
/// previous-pose perturbation.
pub(crate) fn pre_solve_velocity(world: &mut World, pairs: &Pairs) {
    for pair in &pairs.list {
        if !pair.is_active || pair.is_sensor {
            continue;
        }
        let normal = pair.collision.normal;
        let tangent = pair.collision.tangent;

        for &slot in &pair.active_contacts {
            let contact = &pair.contacts[slot];
            if contact.normal_impulse == 0.0 && contact.tangent_impulse == 0.0 {
                continue;
            }
            let impulse = normal * contact.normal_impulse + tangent * contact.tangent_impulse;
            let Some((body_a, body_b)) = world.bodies_pair_mut(pair.body_a, pair.body_b) else {
                continue;
            };

            if !(body_a.is_static || body_a.is_sleeping) {
                let offset = contact.vertex - body_a.position;
                body_a.position_prev += impulse * body_a.inverse_mass;
                body_a.angle_prev += math::cross(offset, impulse) * body_a.inverse_inertia;
            }
            if !(body_b.is_static || body_b.is_sleeping) {
                let offset = contact.vertex - body_b.position;
                body_b.position_prev -= impulse * body_b.inverse_mass;
                body_b.angle_prev -= math::cross(offset, impulse) * body_b.inverse_inertia;
            }
        }
    }
}

/// One iteration of normal and friction impulses over all active contacts.
pub(crate) fn solve_velocity(world: &mut World, pairs: &mut Pairs, time_scale: f64) {
    let time_scale_squared = time_scale * time_scale;

    for pair in &mut pairs.list {
        if !pair.is_active || pair.is_sensor || pair.active_contacts.is_empty() {
            continue;
        }
        let normal = pair.collision.normal;
        let tangent = pair.collision.tangent;
        let separation = pair.separation;
        let restitution = pair.restitution;
        let friction = pair.friction;
        let friction_static = pair.friction_static;
        let contact_share = 1.0 / pair.active_contacts.len() as f64;

        let Some((body_a, body_b)) = world.bodies_pair_mut(pair.body_a, pair.body_b) else {
            continue;
        };

        // refresh derived velocities from the Verlet state
        body_a.velocity = body_a.position - body_a.position_prev;
        body_a.angular_velocity = body_a.angle - body_a.angle_prev;
        body_b.velocity = body_b.position - body_b.position_prev;
        body_b.angular_velocity = body_b.angle - body_b.angle_prev;

        for k in 0..pair.active_contacts.len() {
            let slot = pair.active_contacts[k];
            let contact = &mut pair.contacts[slot];
            let contact_vertex = contact.vertex;

            let offset_a = contact_vertex - body_a.position;
            let offset_b = contact_vertex - body_b.position;
            let velocity_point_a = body_a.velocity + offset_a.perp() * body_a.angular_velocity;
            let velocity_point_b = body_b.velocity + offset_b.perp() * body_b.angular_velocity;
            let relative_velocity = velocity_point_a - velocity_point_b;

            let normal_velocity = normal.dot(relative_velocity);
            let tangent_velocity = tangent.dot(relative_velocity);
            let tangent_speed = tangent_velocity.abs();
            let tangent_direction = tangent_velocity.signum();

            let mut normal_impulse = (1.0 + restitution) * normal_velocity;
            let normal_force =
                (separation + normal_velocity).clamp(0.0, 1.0) * FRICTION_NORMAL_MULTIPLIER;

            // Coulomb cap on friction
            let mut tangent_impulse = tangent_velocity;
            let mut max_friction = f64::INFINITY;
            if tangent_speed
                > friction * friction_static * normal_force * time_scale_squared
            {
                max_friction = tangent_speed;
                tangent_impulse = (friction * tangent_direction * time_scale_squared)
                    .clamp(-max_friction, max_friction);
            }

            // mass normalisation including rotational terms
            let offset_a_cross_n = math::cross(offset_a, normal);
            let offset_b_cross_n = math::cross(offset_b, normal);
            let share = contact_share
                / (body_a.inverse_mass
                    + body_b.inverse_mass
                    + body_a.inverse_inertia * offset_a_cross_n * offset_a_cross_n
                    + body_b.inverse_inertia * offset_b_cross_n * offset_b_cross_n);
            normal_impulse *= share;
            tangent_impulse *= share;

            if normal_velocity < 0.0
                && normal_velocity * normal_velocity > RESTING_THRESH * time_scale_squared
            {
                // high-speed impact: no accumulation
                contact.normal_impulse = 0.0;
            } else {
                // resting: accumulate, clamped non-positive, apply the delta
                let accumulated = contact.normal_impulse;
                contact.normal_impulse = (accumulated + normal_impulse).min(0.0);
                normal_impulse = contact.normal_impulse - accumulated;
            }

            if tangent_velocity * tangent_velocity
                > RESTING_THRESH_TANGENT * time_scale_squared
            {
                contact.tangent_impulse = 0.0;
            } else {
                let accumulated = contact.tangent_impulse;
                contact.tangent_impulse =
                    (accumulated + tangent_impulse).clamp(-max_friction, max_friction);
                tangent_impulse = contact.tangent_impulse - accumulated;
            }

            let impulse = normal * normal_impulse + tangent * tangent_impulse;
            if !(body_a.is_static || body_a.is_sleeping) {
                body_a.position_prev += impulse * body_a.inverse_mass;
                body_a.angle_prev += math::cross(offset_a, impulse) * body_a.inverse_inertia;
            }
            if !(body_b.is_static || body_b.is_sleeping) {
                body_b.position_prev -= impulse * body_b.inverse_mass;
                body_b.angle_prev -= math::cross(offset_b, impulse) * body_b.inverse_inertia;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
