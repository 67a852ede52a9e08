//! Pair Cache
//!
//! Persistent records of colliding part pairs, keyed by a fingerprint of the
//! two part ids. Contacts are keyed by their support vertex so accumulated
//! solver impulses survive across steps (warm starting) and across short
//! separations. The cache drives the collision lifecycle events: a pair is
//! started, stays active, ends, and is garbage-collected after an idle
//! period unless one of its bodies is asleep.

use std::collections::HashMap;

use glam::DVec2;

use crate::body::{Body, BodyId};
use crate::composite::World;
use crate::narrowphase::Collision;

/// Idle time in milliseconds after which an inactive pair is dropped.
const PAIR_MAX_IDLE_LIFE: f64 = 1000.0;

/// Fingerprint of a part pair: smaller id in the high word.
#[inline]
#[must_use]
pub(crate) fn pair_id(a: u32, b: u32) -> u64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    ((lo as u64) << 32) | hi as u64
}

/// Identifies a contact: owning part id and 1-based vertex index.
pub type ContactId = (u32, usize);

/// One persistent contact point with its accumulated impulses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// Vertex-derived identity.
    pub id: ContactId,
    /// Current world position of the support vertex.
    pub vertex: DVec2,
    /// Accumulated normal impulse (non-positive).
    pub normal_impulse: f64,
    /// Accumulated tangent impulse.
    pub tangent_impulse: f64,
}

/// A cached pair of potentially colliding parts.
#[derive(Clone, Debug)]
pub struct Pair {
    /// Part-pair fingerprint.
    pub id: u64,
    /// Compound root of the first part.
    pub body_a: BodyId,
    /// Compound root of the second part.
    pub body_b: BodyId,
    /// Latest narrowphase result.
    pub collision: Collision,
    /// Contact memory, including contacts not active this step.
    pub contacts: Vec<Contact>,
    /// Indices into `contacts` active this step.
    pub active_contacts: Vec<usize>,
    /// Signed separation along the normal, updated by the position solver.
    pub separation: f64,
    /// Whether the pair collided this step.
    pub is_active: bool,
    /// Scratch flag used during the update sweep.
    pub confirmed_active: bool,
    /// Whether either body is a sensor (no contact response).
    pub is_sensor: bool,
    /// Timestamp of creation, milliseconds.
    pub time_created: f64,
    /// Timestamp of the last activity, milliseconds.
    pub time_updated: f64,
    /// Combined inverse mass of the parents.
    pub inverse_mass: f64,
    /// Combined friction (minimum of the parents).
    pub friction: f64,
    /// Combined static friction (maximum).
    pub friction_static: f64,
    /// Combined restitution (maximum).
    pub restitution: f64,
    /// Combined slop (maximum).
    pub slop: f64,
}

impl Pair {
    fn new(collision: Collision, parent_a: &Body, parent_b: &Body, timestamp: f64) -> Self {
        let mut pair = Self {
            id: pair_id(collision.part_a.id, collision.part_b.id),
            body_a: collision.parent_a,
            body_b: collision.parent_b,
            collision: collision.clone(),
            contacts: Vec::new(),
            active_contacts: Vec::new(),
            separation: 0.0,
            is_active: false,
            confirmed_active: false,
            is_sensor: false,
            time_created: timestamp,
            time_updated: timestamp,
            inverse_mass: 0.0,
            friction: 0.0,
            friction_static: 0.0,
            restitution: 0.0,
            slop: 0.0,
        };
        pair.update(collision, parent_a, parent_b, timestamp);
        pair
    }

    /// Refresh the pair from a new collision, reusing contact memory by
    /// vertex id so warm-start impulses persist.
    fn update(&mut self, collision: Collision, parent_a: &Body, parent_b: &Body, timestamp: f64) {
        self.is_sensor = parent_a.is_sensor || parent_b.is_sensor;
        self.inverse_mass = parent_a.inverse_mass + parent_b.inverse_mass;
        self.friction = parent_a.friction.min(parent_b.friction);
        self.friction_static = parent_a.friction_static.max(parent_b.friction_static);
        self.restitution = parent_a.restitution.max(parent_b.restitution);
        self.slop = parent_a.slop.max(parent_b.slop);

        self.active_contacts.clear();
        for support in &collision.supports {
            let contact_id: ContactId = (support.part, support.vertex_index);
            if let Some(slot) = self.contacts.iter().position(|c| c.id == contact_id) {
                self.contacts[slot].vertex = support.point;
                self.active_contacts.push(slot);
            } else {
                self.contacts.push(Contact {
                    id: contact_id,
                    vertex: support.point,
                    normal_impulse: 0.0,
                    tangent_impulse: 0.0,
                });
                self.active_contacts.push(self.contacts.len() - 1);
            }
        }

        self.collision = collision;
        self.set_active(true, timestamp);
    }

    fn set_active(&mut self, is_active: bool, timestamp: f64) {
        if is_active {
            self.is_active = true;
            self.time_updated = timestamp;
        } else {
            self.is_active = false;
            self.active_contacts.clear();
        }
    }
}

/// The pair cache: lookup table plus lifecycle queues for the step's events.
#[derive(Debug, Default)]
pub struct Pairs {
    table: HashMap<u64, usize>,
    /// All cached pairs, in creation order.
    pub list: Vec<Pair>,
    /// Pairs that started colliding in the latest update.
    pub collision_start: Vec<u64>,
    /// Pairs that continued colliding.
    pub collision_active: Vec<u64>,
    /// Pairs that stopped colliding.
    pub collision_end: Vec<u64>,
}

impl Pairs {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair by fingerprint.
    #[must_use]
    pub fn find(&self, id: u64) -> Option<&Pair> {
        self.table.get(&id).map(|&slot| &self.list[slot])
    }

    /// Ingest this step's collisions: create, reactivate or continue pairs,
    /// deactivate the rest, and fill the lifecycle queues.
    pub(crate) fn update(&mut self, world: &World, collisions: Vec<Collision>, timestamp: f64) {
        self.collision_start.clear();
        self.collision_active.clear();
        self.collision_end.clear();

        for pair in &mut self.list {
            pair.confirmed_active = false;
        }

        for collision in collisions {
            let (Some(parent_a), Some(parent_b)) = (
                world.body(collision.parent_a),
                world.body(collision.parent_b),
            ) else {
                continue;
            };

            let id = pair_id(collision.part_a.id, collision.part_b.id);
            if let Some(&slot) = self.table.get(&id) {
                let pair = &mut self.list[slot];
                if pair.is_active {
                    self.collision_active.push(id);
                } else {
                    self.collision_start.push(id);
                }
                pair.update(collision, parent_a, parent_b, timestamp);
                pair.confirmed_active = true;
            } else {
                let mut pair = Pair::new(collision, parent_a, parent_b, timestamp);
                pair.confirmed_active = true;
                self.table.insert(id, self.list.len());
                self.list.push(pair);
                self.collision_start.push(id);
            }
        }

        for pair in &mut self.list {
            if pair.is_active && !pair.confirmed_active {
                pair.set_active(false, timestamp);
                self.collision_end.push(pair.id);
            }
        }
    }

    /// Drop pairs idle for longer than the grace period. Pairs whose bodies
    /// are asleep are refreshed instead, so waking resumes them warm.
    pub(crate) fn remove_old(&mut self, world: &World, timestamp: f64) {
        let mut removed = false;
        for pair in &mut self.list {
            let sleeping = world.body(pair.body_a).is_some_and(|b| b.is_sleeping)
                || world.body(pair.body_b).is_some_and(|b| b.is_sleeping);
            if sleeping {
                pair.time_updated = timestamp;
            }
        }
        self.list.retain(|pair| {
            let keep = timestamp - pair.time_updated <= PAIR_MAX_IDLE_LIFE;
            removed |= !keep;
            keep
        });
        if removed {
            self.table.clear();
            for (slot, pair) in self.list.iter().enumerate() {
                self.table.insert(pair.id, slot);
            }
        }
    }

    /// Drop every pair.
    pub fn clear(&mut self) {
        self.table.clear();
        self.list.clear();
        self.collision_start.clear();
        self.collision_active.clear();
        self.collision_end.clear();
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
    use crate::narrowphase;

    fn colliding_world() -> (World, BodyId, BodyId) {
        let mut world = World::new();
        let root = world.root();
        let a = world.add_body(
            root,
            factory::rectangle(100.0, 100.0, 20.0, 20.0, BodyConfig::default()),
        );
        let b = world.add_body(
            root,
            factory::rectangle(110.0, 100.0, 20.0, 20.0, BodyConfig::default()),
        );
        (world, a, b)
    }

    fn detect(world: &World, a: BodyId, b: BodyId, pairs: &Pairs) -> Vec<Collision> {
        narrowphase::collisions(world, &[(a.min(b), a.max(b))], pairs)
    }

    #[test]
    fn test_lifecycle_start_active_end() {
        let (mut world, a, b) = colliding_world();
        let mut pairs = Pairs::new();

        let found = detect(&world, a, b, &pairs);
        pairs.update(&world, found, 0.0);
        assert_eq!(pairs.collision_start.len(), 1);
        assert!(pairs.collision_active.is_empty());
        let id = pairs.collision_start[0];

        let found = detect(&world, a, b, &pairs);
        pairs.update(&world, found, 16.0);
        assert!(pairs.collision_start.is_empty());
        assert_eq!(pairs.collision_active, vec![id]);

        // separate the bodies
        world
            .body_mut(b)
            .unwrap()
            .set_position(glam::DVec2::new(500.0, 100.0));
        let found = detect(&world, a, b, &pairs);
        assert!(found.is_empty());
        pairs.update(&world, found, 32.0);
        assert_eq!(pairs.collision_end, vec![id]);
        assert!(!pairs.find(id).unwrap().is_active);

        // and back again: reactivation is another start
        world
            .body_mut(b)
            .unwrap()
            .set_position(glam::DVec2::new(110.0, 100.0));
        let found = detect(&world, a, b, &pairs);
        pairs.update(&world, found, 48.0);
        assert_eq!(pairs.collision_start, vec![id]);
    }

    #[test]
    fn test_contact_impulses_persist() {
        let (world, a, b) = colliding_world();
        let mut pairs = Pairs::new();

        let found = detect(&world, a, b, &pairs);
        pairs.update(&world, found, 0.0);
        {
            let pair = &mut pairs.list[0];
            for &slot in &pair.active_contacts {
                pair.contacts[slot].normal_impulse = -2.5;
            }
        }

        let found = detect(&world, a, b, &pairs);
        pairs.update(&world, found, 16.0);
        let pair = &pairs.list[0];
        assert!(!pair.active_contacts.is_empty());
        for &slot in &pair.active_contacts {
            assert!(
                (pair.contacts[slot].normal_impulse - -2.5).abs() < 1e-12,
                "impulse memory survives the refresh"
            );
        }
    }

    #[test]
    fn test_material_combination() {
        let (mut world, a, b) = colliding_world();
        {
            let body = world.body_mut(a).unwrap();
            body.friction = 0.2;
            body.restitution = 0.8;
            body.slop = 0.01;
        }
        {
            let body = world.body_mut(b).unwrap();
            body.friction = 0.6;
            body.restitution = 0.1;
            body.slop = 0.07;
        }
        let mut pairs = Pairs::new();
        let found = detect(&world, a, b, &pairs);
        pairs.update(&world, found, 0.0);

        let pair = &pairs.list[0];
        assert!((pair.friction - 0.2).abs() < 1e-12, "min friction");
        assert!((pair.restitution - 0.8).abs() < 1e-12, "max restitution");
        assert!((pair.slop - 0.07).abs() < 1e-12, "max slop");
        assert!(pair.inverse_mass > 0.0);
    }

    #[test]
    fn test_sensor_flag() {
        let (mut world, a, b) = colliding_world();
        world.body_mut(a).unwrap().is_sensor = true;
        let mut pairs = Pairs::new();
        let found = detect(&world, a, b, &pairs);
        pairs.update(&world, found, 0.0);
        assert!(pairs.list[0].is_sensor);
    }

    #[test]
    fn test_remove_old_expires_idle_pairs() {
        let (mut world, a, b) = colliding_world();
        let mut pairs = Pairs::new();
        let found = detect(&world, a, b, &pairs);
        pairs.update(&world, found, 0.0);

        // separate, then let the idle clock run out
        world
            .body_mut(b)
            .unwrap()
            .set_position(glam::DVec2::new(500.0, 100.0));
        pairs.update(&world, Vec::new(), 10.0);
        pairs.remove_old(&world, 500.0);
        assert_eq!(pairs.list.len(), 1, "still within the grace period");

        pairs.remove_old(&world, 1500.0);
        assert!(pairs.list.is_empty());
        assert!(pairs.find(pair_id(1, 2)).is_none());
    }

    #[test]
    fn test_remove_old_refreshes_sleeping() {
        let (mut world, a, b) = colliding_world();
        let mut pairs = Pairs::new();
        let found = detect(&world, a, b, &pairs);
        pairs.update(&world, found, 0.0);

        world.body_mut(a).unwrap().set_sleeping(true);
        pairs.remove_old(&world, 5000.0);
        assert_eq!(pairs.list.len(), 1, "sleeping bodies keep their pairs");
        assert!((pairs.list[0].time_updated - 5000.0).abs() < 1e-9);
    }
}
