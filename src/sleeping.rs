//! Sleeping Controller
//!
//! Bodies whose biased motion average stays below a threshold for
//! `sleep_threshold` consecutive steps are put to sleep: their velocities
//! are zeroed, their Verlet state snapped, and the solvers skip them until
//! a force or an energetic collision wakes them.

use crate::body::{Body, BodyId};
use crate::composite::World;
use crate::events::SleepQueues;
use crate::pairs::Pairs;

/// Motion below which a body accumulates sleep, scaled by `time_scale^3`.
const MOTION_SLEEP_THRESHOLD: f64 = 0.08;
/// Motion of a collision partner above which a sleeping body wakes.
const MOTION_WAKE_THRESHOLD: f64 = 0.18;
/// Bias of the motion average toward its historical minimum.
const MIN_BIAS: f64 = 0.9;

/// Switch a body's sleep state, queueing the transition event.
pub(crate) fn set(body: &mut Body, is_sleeping: bool, queues: &mut SleepQueues) {
    let was_sleeping = body.is_sleeping;
    body.set_sleeping(is_sleeping);
    if is_sleeping && !was_sleeping {
        queues.sleep_start.push(body.id);
    } else if !is_sleeping && was_sleeping {
        queues.sleep_end.push(body.id);
    }
}

/// Per-step motion tracking: update the biased motion average of each body
/// and put persistently idle bodies to sleep. Bodies with pending force are
/// woken immediately.
pub(crate) fn update(
    world: &mut World,
    body_ids: &[BodyId],
    time_scale: f64,
    queues: &mut SleepQueues,
) {
    let time_factor = time_scale * time_scale * time_scale;

    for &id in body_ids {
        let Some(body) = world.body_mut(id) else {
            continue;
        };

        if body.force != glam::DVec2::ZERO {
            set(body, false, queues);
            continue;
        }

        let motion = body.speed * body.speed + body.angular_speed * body.angular_speed;
        let min_motion = body.motion.min(motion);
        let max_motion = body.motion.max(motion);
        body.motion = MIN_BIAS * min_motion + (1.0 - MIN_BIAS) * max_motion;

        if body.sleep_threshold > 0 && body.motion < MOTION_SLEEP_THRESHOLD * time_factor {
            body.sleep_counter += 1;
            if body.sleep_counter >= body.sleep_threshold {
                set(body, true, queues);
            }
        } else if body.sleep_counter > 0 {
            body.sleep_counter -= 1;
        }
    }
}

/// After collision detection: wake a sleeping body whose partner in an
/// active pair is moving hard enough.
pub(crate) fn after_collisions(
    world: &mut World,
    pairs: &Pairs,
    time_scale: f64,
    queues: &mut SleepQueues,
) {
    let time_factor = time_scale * time_scale * time_scale;

    for pair in &pairs.list {
        if !pair.is_active {
            continue;
        }
        let Some((body_a, body_b)) = world.bodies_pair_mut(pair.body_a, pair.body_b) else {
            continue;
        };

        if (body_a.is_sleeping && body_b.is_sleeping) || body_a.is_static || body_b.is_static {
            continue;
        }

        if body_a.is_sleeping || body_b.is_sleeping {
            let (sleeping, moving) = if body_a.is_sleeping && !body_a.is_static {
                (body_a, body_b)
            } else {
                (body_b, body_a)
            };
            if !sleeping.is_static && moving.motion > MOTION_WAKE_THRESHOLD * time_factor {
                set(sleeping, false, queues);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
