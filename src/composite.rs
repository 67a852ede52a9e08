//! World Composites
//!
//! A [`World`] owns every body, constraint and composite in arenas keyed by
//! world-unique ids, plus a tree of [`Composite`] nodes that group them. The
//! root composite is the world itself. Structural changes set the
//! `is_modified` flag and propagate it toward the root, where the broadphase
//! consumes it to decide whether to flush its grid.

use std::collections::HashMap;

use glam::DVec2;

use crate::body::{Body, BodyId};
use crate::bounds::Aabb;
use crate::constraint::{Constraint, ConstraintConfig, ConstraintId};
use crate::events::Channel;
use crate::math;

/// Identifier of a composite node within a world.
pub type CompositeId = u32;

/// A reference to one object in the world tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorldObject {
    /// A rigid body.
    Body(BodyId),
    /// A constraint.
    Constraint(ConstraintId),
    /// A composite node.
    Composite(CompositeId),
}

/// Payload of the structural event channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldEvent {
    /// The composite the object was added to or removed from.
    pub composite: CompositeId,
    /// The object in question.
    pub object: WorldObject,
}

/// Structural event channels of a world.
#[derive(Debug, Default)]
pub struct WorldEvents {
    /// Fires before an object joins a composite.
    pub before_add: Channel<WorldEvent>,
    /// Fires after an object joined a composite.
    pub after_add: Channel<WorldEvent>,
    /// Fires before an object leaves a composite.
    pub before_remove: Channel<WorldEvent>,
    /// Fires after an object left a composite.
    pub after_remove: Channel<WorldEvent>,
}

/// One node of the world tree.
#[derive(Clone, Debug)]
pub struct Composite {
    /// World-unique id.
    pub id: CompositeId,
    /// Display label.
    pub label: String,
    /// Parent node id; `None` for the root.
    pub parent: Option<CompositeId>,
    /// Bodies directly in this node.
    pub bodies: Vec<BodyId>,
    /// Constraints directly in this node.
    pub constraints: Vec<ConstraintId>,
    /// Child composite nodes.
    pub composites: Vec<CompositeId>,
    /// Set on structural change; consumed by the broadphase.
    pub is_modified: bool,
}

/// The world: arenas plus the composite tree.
pub struct World {
    next_id: u32,
    bodies: Vec<Body>,
    body_index: HashMap<BodyId, usize>,
    constraints: Vec<Constraint>,
    constraint_index: HashMap<ConstraintId, usize>,
    composites: Vec<Composite>,
    composite_index: HashMap<CompositeId, usize>,
    root: CompositeId,
    /// Simulation extent; bodies outside are ignored by the broadphase.
    pub bounds: Aabb,
    /// Structural event channels.
    pub events: WorldEvents,
}

impl World {
    /// Create an empty world.
    #[must_use]
    pub fn new() -> Self {
        let mut world = Self {
            next_id: 0,
            bodies: Vec::new(),
            body_index: HashMap::new(),
            constraints: Vec::new(),
            constraint_index: HashMap::new(),
            composites: Vec::new(),
            composite_index: HashMap::new(),
            root: 0,
            bounds: Aabb::INFINITE,
            events: WorldEvents::default(),
        };
        let root_id = world.mint();
        world.composites.push(Composite {
            id: root_id,
            label: "World".to_owned(),
            parent: None,
            bodies: Vec::new(),
            constraints: Vec::new(),
            composites: Vec::new(),
            is_modified: false,
        });
        world.composite_index.insert(root_id, 0);
        world.root = root_id;
        world
    }

    fn mint(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Id of the root composite.
    #[inline]
    #[must_use]
    pub fn root(&self) -> CompositeId {
        self.root
    }

    /// Whether any structural change is pending (root flag).
    #[inline]
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.composites[self.composite_index[&self.root]].is_modified
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Body by id.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.body_index.get(&id).map(|&slot| &self.bodies[slot])
    }

    /// Body by id, mutable.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.body_index
            .get(&id)
            .map(|&slot| &mut self.bodies[slot])
    }

    /// Constraint by id.
    #[must_use]
    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraint_index
            .get(&id)
            .map(|&slot| &self.constraints[slot])
    }

    /// Constraint by id, mutable.
    pub fn constraint_mut(&mut self, id: ConstraintId) -> Option<&mut Constraint> {
        self.constraint_index
            .get(&id)
            .map(|&slot| &mut self.constraints[slot])
    }

    /// Composite node by id.
    #[must_use]
    pub fn composite(&self, id: CompositeId) -> Option<&Composite> {
        self.composite_index
            .get(&id)
            .map(|&slot| &self.composites[slot])
    }

    fn composite_node_mut(&mut self, id: CompositeId) -> Option<&mut Composite> {
        self.composite_index
            .get(&id)
            .map(|&slot| &mut self.composites[slot])
    }

    /// All bodies in arena order (no tree ordering guarantee).
    #[must_use]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Two distinct bodies, mutable at once.
    pub(crate) fn bodies_pair_mut(
        &mut self,
        a: BodyId,
        b: BodyId,
    ) -> Option<(&mut Body, &mut Body)> {
        let ia = *self.body_index.get(&a)?;
        let ib = *self.body_index.get(&b)?;
        if ia == ib {
            return None;
        }
        if ia < ib {
            let (head, tail) = self.bodies.split_at_mut(ib);
            Some((&mut head[ia], &mut tail[0]))
        } else {
            let (head, tail) = self.bodies.split_at_mut(ia);
            Some((&mut tail[0], &mut head[ib]))
        }
    }

    /// A constraint together with its (distinct, present) endpoint bodies.
    pub(crate) fn constraint_with_bodies_mut(
        &mut self,
        id: ConstraintId,
    ) -> Option<(&mut Constraint, Option<&mut Body>, Option<&mut Body>)> {
        let slot = *self.constraint_index.get(&id)?;
        let World {
            constraints,
            bodies,
            body_index,
            ..
        } = self;
        let constraint = &mut constraints[slot];
        let ia = constraint.body_a.and_then(|id| body_index.get(&id).copied());
        let ib = constraint.body_b.and_then(|id| body_index.get(&id).copied());

        match (ia, ib) {
            (Some(ia), Some(ib)) if ia != ib => {
                let (lo, hi) = (ia.min(ib), ia.max(ib));
                let (head, tail) = bodies.split_at_mut(hi);
                let (first, second) = (&mut head[lo], &mut tail[0]);
                if ia < ib {
                    Some((constraint, Some(first), Some(second)))
                } else {
                    Some((constraint, Some(second), Some(first)))
                }
            }
            (Some(ia), _) => Some((constraint, Some(&mut bodies[ia]), None)),
            (None, Some(ib)) => Some((constraint, None, Some(&mut bodies[ib]))),
            (None, None) => Some((constraint, None, None)),
        }
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Create a composite node under `parent`.
    pub fn create_composite(&mut self, parent: CompositeId, label: &str) -> CompositeId {
        let id = self.mint();
        let event = WorldEvent {
            composite: parent,
            object: WorldObject::Composite(id),
        };
        self.events.before_add.emit(&event);

        self.composites.push(Composite {
            id,
            label: label.to_owned(),
            parent: Some(parent),
            bodies: Vec::new(),
            constraints: Vec::new(),
            composites: Vec::new(),
            is_modified: false,
        });
        self.composite_index.insert(id, self.composites.len() - 1);
        if let Some(node) = self.composite_node_mut(parent) {
            node.composites.push(id);
        }
        self.set_modified(parent, true, true, false);

        self.events.after_add.emit(&event);
        id
    }

    /// Register a body under a composite. Assigns world-unique ids to the
    /// body and any unregistered parts, and returns the body id.
    pub fn add_body(&mut self, composite: CompositeId, mut body: Body) -> BodyId {
        let id = self.mint();
        body.id = id;
        body.parts[0].id = id;
        for vertex in &mut body.parts[0].vertices {
            vertex.part = id;
        }
        for i in 1..body.parts.len() {
            if body.parts[i].id == 0 {
                let part_id = self.mint();
                body.parts[i].id = part_id;
                for vertex in &mut body.parts[i].vertices {
                    vertex.part = part_id;
                }
            }
        }

        let event = WorldEvent {
            composite,
            object: WorldObject::Body(id),
        };
        self.events.before_add.emit(&event);

        self.bodies.push(body);
        self.body_index.insert(id, self.bodies.len() - 1);
        if let Some(node) = self.composite_node_mut(composite) {
            node.bodies.push(id);
        }
        self.set_modified(composite, true, true, false);

        self.events.after_add.emit(&event);
        id
    }

    /// Remove a body. With `deep`, every composite is searched for the
    /// reference; otherwise only the given composite.
    pub fn remove_body(&mut self, composite: CompositeId, id: BodyId, deep: bool) -> Option<Body> {
        let holder = if deep {
            self.composites
                .iter()
                .find(|c| c.bodies.contains(&id))
                .map(|c| c.id)?
        } else {
            let node = self.composite(composite)?;
            if !node.bodies.contains(&id) {
                return None;
            }
            composite
        };

        let event = WorldEvent {
            composite: holder,
            object: WorldObject::Body(id),
        };
        self.events.before_remove.emit(&event);

        if let Some(node) = self.composite_node_mut(holder) {
            node.bodies.retain(|&b| b != id);
        }
        let body = self.detach_body(id);
        self.set_modified(holder, true, true, false);

        self.events.after_remove.emit(&event);
        body
    }

    fn detach_body(&mut self, id: BodyId) -> Option<Body> {
        let slot = self.body_index.remove(&id)?;
        let body = self.bodies.swap_remove(slot);
        if let Some(moved) = self.bodies.get(slot) {
            self.body_index.insert(moved.id, slot);
        }
        Some(body)
    }

    /// Build and register a constraint under a composite. The rest length
    /// defaults to the current anchor separation.
    pub fn add_constraint(
        &mut self,
        composite: CompositeId,
        config: ConstraintConfig,
    ) -> ConstraintId {
        let id = self.mint();
        let body_a = config.body_a.and_then(|b| self.body(b));
        let body_b = config.body_b.and_then(|b| self.body(b));
        let constraint = Constraint::from_config(id, &config, body_a, body_b);

        let event = WorldEvent {
            composite,
            object: WorldObject::Constraint(id),
        };
        self.events.before_add.emit(&event);

        self.constraints.push(constraint);
        self.constraint_index.insert(id, self.constraints.len() - 1);
        if let Some(node) = self.composite_node_mut(composite) {
            node.constraints.push(id);
        }
        self.set_modified(composite, true, true, false);

        self.events.after_add.emit(&event);
        id
    }

    /// Remove a constraint, searching every composite when `deep`.
    pub fn remove_constraint(
        &mut self,
        composite: CompositeId,
        id: ConstraintId,
        deep: bool,
    ) -> Option<Constraint> {
        let holder = if deep {
            self.composites
                .iter()
                .find(|c| c.constraints.contains(&id))
                .map(|c| c.id)?
        } else {
            let node = self.composite(composite)?;
            if !node.constraints.contains(&id) {
                return None;
            }
            composite
        };

        let event = WorldEvent {
            composite: holder,
            object: WorldObject::Constraint(id),
        };
        self.events.before_remove.emit(&event);

        if let Some(node) = self.composite_node_mut(holder) {
            node.constraints.retain(|&c| c != id);
        }
        let slot = self.constraint_index.remove(&id);
        let constraint = slot.map(|slot| {
            let constraint = self.constraints.swap_remove(slot);
            if let Some(moved) = self.constraints.get(slot) {
                self.constraint_index.insert(moved.id, slot);
            }
            constraint
        });
        self.set_modified(holder, true, true, false);

        self.events.after_remove.emit(&event);
        constraint
    }

    /// Remove a composite node and everything beneath it.
    pub fn remove_composite(&mut self, parent: CompositeId, id: CompositeId) {
        let event = WorldEvent {
            composite: parent,
            object: WorldObject::Composite(id),
        };
        self.events.before_remove.emit(&event);

        if let Some(node) = self.composite_node_mut(parent) {
            node.composites.retain(|&c| c != id);
        }
        self.delete_subtree(id);
        self.set_modified(parent, true, true, false);

        self.events.after_remove.emit(&event);
    }

    fn delete_subtree(&mut self, id: CompositeId) {
        let Some(node) = self.composite(id) else {
            return;
        };
        let bodies = node.bodies.clone();
        let constraints = node.constraints.clone();
        let children = node.composites.clone();

        for body in bodies {
            self.detach_body(body);
        }
        for constraint in constraints {
            if let Some(slot) = self.constraint_index.remove(&constraint) {
                self.constraints.swap_remove(slot);
                if let Some(moved) = self.constraints.get(slot) {
                    self.constraint_index.insert(moved.id, slot);
                }
            }
        }
        for child in children {
            self.delete_subtree(child);
        }

        if let Some(slot) = self.composite_index.remove(&id) {
            self.composites.swap_remove(slot);
            if let Some(moved) = self.composites.get(slot) {
                self.composite_index.insert(moved.id, slot);
            }
        }
    }

    /// Move an object between two composites.
    pub fn move_object(&mut self, from: CompositeId, object: WorldObject, to: CompositeId) -> bool {
        let removed = match object {
            WorldObject::Body(id) => {
                let Some(node) = self.composite_node_mut(from) else {
                    return false;
                };
                let had = node.bodies.contains(&id);
                node.bodies.retain(|&b| b != id);
                had
            }
            WorldObject::Constraint(id) => {
                let Some(node) = self.composite_node_mut(from) else {
                    return false;
                };
                let had = node.constraints.contains(&id);
                node.constraints.retain(|&c| c != id);
                had
            }
            WorldObject::Composite(id) => {
                let Some(node) = self.composite_node_mut(from) else {
                    return false;
                };
                let had = node.composites.contains(&id);
                node.composites.retain(|&c| c != id);
                if had {
                    if let Some(child) = self.composite_node_mut(id) {
                        child.parent = Some(to);
                    }
                }
                had
            }
        };
        if !removed {
            return false;
        }
        if let Some(node) = self.composite_node_mut(to) {
            match object {
                WorldObject::Body(id) => node.bodies.push(id),
                WorldObject::Constraint(id) => node.constraints.push(id),
                WorldObject::Composite(id) => node.composites.push(id),
            }
        }
        self.set_modified(from, true, true, false);
        self.set_modified(to, true, true, false);
        true
    }

    /// Set the modification flag, optionally walking up to the root and/or
    /// down through every descendant.
    pub fn set_modified(
        &mut self,
        composite: CompositeId,
        flag: bool,
        update_parents: bool,
        update_children: bool,
    ) {
        let Some(node) = self.composite_node_mut(composite) else {
            return;
        };
        node.is_modified = flag;
        let parent = node.parent;
        let children = node.composites.clone();

        if update_parents {
            let mut current = parent;
            while let Some(id) = current {
                let Some(node) = self.composite_node_mut(id) else {
                    break;
                };
                node.is_modified = flag;
                current = node.parent;
            }
        }
        if update_children {
            let mut stack = children;
            while let Some(id) = stack.pop() {
                let Some(node) = self.composite_node_mut(id) else {
                    continue;
                };
                node.is_modified = flag;
                stack.extend(node.composites.iter().copied());
            }
        }
    }

    // ------------------------------------------------------------------
    // Tree walks
    // ------------------------------------------------------------------

    /// Bodies of a composite and all its descendants, depth first.
    #[must_use]
    pub fn all_bodies_of(&self, composite: CompositeId) -> Vec<BodyId> {
        let mut out = Vec::new();
        self.walk_bodies(composite, &mut out);
        out
    }

    fn walk_bodies(&self, composite: CompositeId, out: &mut Vec<BodyId>) {
        let Some(node) = self.composite(composite) else {
            return;
        };
        out.extend(node.bodies.iter().copied());
        for &child in &node.composites {
            self.walk_bodies(child, out);
        }
    }

    /// All bodies in the world, depth first from the root.
    #[must_use]
    pub fn all_bodies(&self) -> Vec<BodyId> {
        self.all_bodies_of(self.root)
    }

    /// Constraints of a composite and its descendants, depth first.
    #[must_use]
    pub fn all_constraints_of(&self, composite: CompositeId) -> Vec<ConstraintId> {
        let mut out = Vec::new();
        self.walk_constraints(composite, &mut out);
        out
    }

    fn walk_constraints(&self, composite: CompositeId, out: &mut Vec<ConstraintId>) {
        let Some(node) = self.composite(composite) else {
            return;
        };
        out.extend(node.constraints.iter().copied());
        for &child in &node.composites {
            self.walk_constraints(child, out);
        }
    }

    /// All constraints in the world, depth first from the root.
    #[must_use]
    pub fn all_constraints(&self) -> Vec<ConstraintId> {
        self.all_constraints_of(self.root)
    }

    /// All descendant composites of a node, depth first.
    #[must_use]
    pub fn all_composites_of(&self, composite: CompositeId) -> Vec<CompositeId> {
        let mut out = Vec::new();
        let Some(node) = self.composite(composite) else {
            return out;
        };
        for &child in &node.composites {
            out.push(child);
            out.extend(self.all_composites_of(child));
        }
        out
    }

    /// Empty a composite recursively. Bodies survive only when `keep_static`
    /// and static; constraints and child composites are removed.
    pub fn clear(&mut self, composite: CompositeId, keep_static: bool) {
        let Some(node) = self.composite(composite) else {
            return;
        };
        let bodies = node.bodies.clone();
        let constraints = node.constraints.clone();
        let children = node.composites.clone();

        for id in bodies {
            let is_static = self.body(id).map(|b| b.is_static).unwrap_or(false);
            if keep_static && is_static {
                continue;
            }
            if let Some(node) = self.composite_node_mut(composite) {
                node.bodies.retain(|&b| b != id);
            }
            self.detach_body(id);
        }
        for id in constraints {
            self.remove_constraint(composite, id, false);
        }
        for child in children {
            self.remove_composite(composite, child);
        }
        self.set_modified(composite, true, true, false);
    }

    // ------------------------------------------------------------------
    // Bulk transforms
    // ------------------------------------------------------------------

    /// Translate every body under a composite.
    pub fn translate(&mut self, composite: CompositeId, delta: DVec2) {
        for id in self.all_bodies_of(composite) {
            if let Some(body) = self.body_mut(id) {
                body.translate(delta);
            }
        }
    }

    /// Rotate every body under a composite about `point`.
    pub fn rotate(&mut self, composite: CompositeId, rotation: f64, point: DVec2) {
        for id in self.all_bodies_of(composite) {
            if let Some(body) = self.body_mut(id) {
                body.set_position(math::rotate_about(body.position, rotation, point));
                body.set_angle(body.angle + rotation);
            }
        }
    }

    /// Scale every body under a composite about `point`.
    pub fn scale(&mut self, composite: CompositeId, scale_x: f64, scale_y: f64, point: DVec2) {
        for id in self.all_bodies_of(composite) {
            if let Some(body) = self.body_mut(id) {
                body.scale(scale_x, scale_y, Some(point));
            }
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("bodies", &self.bodies.len())
            .field("constraints", &self.constraints.len())
            .field("composites", &self.composites.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
