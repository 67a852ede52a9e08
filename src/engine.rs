//! Engine Step Driver
//!
//! Orchestrates one fixed timestep: sleeping, gravity, Verlet integration,
//! constraint solving, broadphase, narrowphase, pair bookkeeping, positional
//! and velocity contact resolution, event dispatch and force clearing — in a
//! normative order, so that observable behavior (events included) is stable
//! across runs.
//!
//! The engine is synchronous and single-threaded: a step runs to completion
//! on the caller's thread, and external code owns the clock.

use glam::DVec2;

use crate::broadphase::Grid;
use crate::composite::World;
use crate::constraint;
use crate::events::{CollisionEvent, EngineEvents, SleepEvent, SleepQueues, StepEvent};
use crate::narrowphase;
use crate::pairs::Pairs;
use crate::resolver;
use crate::sleeping;

/// Construction options for [`Engine::new`]. All defaults documented inline.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Iterations of the positional contact solver per step. Default `6`.
    pub position_iterations: usize,
    /// Iterations of the velocity contact solver per step. Default `4`.
    pub velocity_iterations: usize,
    /// Iterations of the constraint solver per pass. Default `2`.
    pub constraint_iterations: usize,
    /// Whether idle bodies may fall asleep. Default `false`.
    pub enable_sleeping: bool,
    /// Gravity direction. Default `(0, 1)` (downward in screen coordinates).
    pub gravity: DVec2,
    /// Gravity magnitude multiplier. Default `0.001`.
    pub gravity_scale: f64,
    /// Global time scaling. Default `1`.
    pub time_scale: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            position_iterations: 6,
            velocity_iterations: 4,
            constraint_iterations: 2,
            enable_sleeping: false,
            gravity: DVec2::new(0.0, 1.0),
            gravity_scale: 0.001,
            time_scale: 1.0,
        }
    }
}

/// Simulation clock state.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timing {
    /// Accumulated simulation time in milliseconds.
    pub timestamp: f64,
    /// Global time scaling applied to every step.
    pub time_scale: f64,
}

/// The physics engine: a world plus the solver state that drives it.
#[derive(Debug)]
pub struct Engine {
    /// The world tree of bodies, constraints and composites.
    pub world: World,
    /// Persistent pair cache.
    pub pairs: Pairs,
    /// Grid broadphase.
    pub broadphase: Grid,
    /// Simulation clock.
    pub timing: Timing,
    /// Iterations of the positional contact solver per step.
    pub position_iterations: usize,
    /// Iterations of the velocity contact solver per step.
    pub velocity_iterations: usize,
    /// Iterations of the constraint solver per pass.
    pub constraint_iterations: usize,
    /// Whether idle bodies may fall asleep.
    pub enable_sleeping: bool,
    /// Gravity direction.
    pub gravity: DVec2,
    /// Gravity magnitude multiplier.
    pub gravity_scale: f64,
    /// Engine event channels.
    pub events: EngineEvents,
    sleep_queues: SleepQueues,
}

impl Engine {
    /// Build an engine from a configuration record.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            world: World::new(),
            pairs: Pairs::new(),
            broadphase: Grid::new(),
            timing: Timing {
                timestamp: 0.0,
                time_scale: config.time_scale,
            },
            position_iterations: config.position_iterations,
            velocity_iterations: config.velocity_iterations,
            constraint_iterations: config.constraint_iterations,
            enable_sleeping: config.enable_sleeping,
            gravity: config.gravity,
            gravity_scale: config.gravity_scale,
            events: EngineEvents::default(),
            sleep_queues: SleepQueues::default(),
        }
    }

    /// Advance the simulation by `delta` milliseconds.
    ///
    /// `correction` is the ratio of this delta to the previous one; pass `1`
    /// for a fixed timestep. A typical fixed delta is `1000 / 60`.
    pub fn step(&mut self, delta: f64, correction: f64) {
        let time_scale = self.timing.time_scale;
        self.timing.timestamp += delta * time_scale;
        let timestamp = self.timing.timestamp;

        self.events.before_update.emit(&StepEvent { timestamp });

        let all_bodies = self.world.all_bodies();
        let all_constraints = self.world.all_constraints();
        self.sleep_queues.clear();

        if self.enable_sleeping {
            sleeping::update(
                &mut self.world,
                &all_bodies,
                time_scale,
                &mut self.sleep_queues,
            );
        }

        // gravity as a per-step force
        let gravity = self.gravity * self.gravity_scale;
        for &id in &all_bodies {
            let Some(body) = self.world.body_mut(id) else {
                continue;
            };
            if body.is_static || body.is_sleeping {
                continue;
            }
            body.force += gravity * body.mass;
        }

        // integration
        for &id in &all_bodies {
            let Some(body) = self.world.body_mut(id) else {
                continue;
            };
            if body.is_static || body.is_sleeping {
                continue;
            }
            body.update(delta, time_scale, correction);
        }

        // first constraint pass
        constraint::pre_solve_all(&mut self.world, &all_bodies);
        for _ in 0..self.constraint_iterations {
            constraint::solve_all(&mut self.world, &all_constraints, time_scale);
        }
        constraint::post_solve_all(&mut self.world, &all_bodies, &mut self.sleep_queues);

        // broadphase, flushing when the tree changed
        let world_modified = self.world.is_modified();
        if world_modified {
            self.broadphase.flush();
        }
        self.broadphase
            .update(&mut self.world, &all_bodies, world_modified);
        if world_modified {
            let root = self.world.root();
            self.world.set_modified(root, false, false, true);
        }

        // narrowphase over the surviving candidates
        let collisions =
            narrowphase::collisions(&self.world, &self.broadphase.pairs_list, &self.pairs);

        // pair lifecycle
        self.pairs.update(&self.world, collisions, timestamp);
        self.pairs.remove_old(&self.world, timestamp);

        if self.enable_sleeping {
            sleeping::after_collisions(
                &mut self.world,
                &self.pairs,
                time_scale,
                &mut self.sleep_queues,
            );
        }

        if !self.pairs.collision_start.is_empty() {
            self.events.collision_start.emit(&CollisionEvent {
                timestamp,
                pairs: self.pairs.collision_start.clone(),
            });
        }

        // positional contact resolution
        resolver::pre_solve_position(&mut self.world, &self.pairs);
        for _ in 0..self.position_iterations {
            resolver::solve_position(&mut self.world, &mut self.pairs, time_scale);
        }
        resolver::post_solve_position(&mut self.world, &all_bodies);

        // second constraint pass, against the corrected positions
        constraint::pre_solve_all(&mut self.world, &all_bodies);
        for _ in 0..self.constraint_iterations {
            constraint::solve_all(&mut self.world, &all_constraints, time_scale);
        }
        constraint::post_solve_all(&mut self.world, &all_bodies, &mut self.sleep_queues);

        // velocity contact resolution
        resolver::pre_solve_velocity(&mut self.world, &self.pairs);
        for _ in 0..self.velocity_iterations {
            resolver::solve_velocity(&mut self.world, &mut self.pairs, time_scale);
        }

        if !self.pairs.collision_active.is_empty() {
            self.events.collision_active.emit(&CollisionEvent {
                timestamp,
                pairs: self.pairs.collision_active.clone(),
            });
        }
        if !self.pairs.collision_end.is_empty() {
            self.events.collision_end.emit(&CollisionEvent {
                timestamp,
                pairs: self.pairs.collision_end.clone(),
            });
        }

        // sleep transitions collected during the step
        for &body in &self.sleep_queues.sleep_start {
            self.events.sleep_start.emit(&SleepEvent { body });
        }
        for &body in &self.sleep_queues.sleep_end {
            self.events.sleep_end.emit(&SleepEvent { body });
        }

        // clear force buffers
        for &id in &all_bodies {
            if let Some(body) = self.world.body_mut(id) {
                body.force = DVec2::ZERO;
                body.torque = 0.0;
            }
        }

        self.events.after_update.emit(&StepEvent { timestamp });
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

// ============================================================================
// Tests
// ============================================================================
