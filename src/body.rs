//! Rigid Bodies
//!
//! A [`Body`] is a convex polygon (or a compound of convex parts) with mass
//! properties, integrated with time-corrected position Verlet: velocity is
//! derived from the difference between the current and previous pose, which
//! keeps the iterative constraint and contact solvers stable.
//!
//! Compound bodies store their geometry as [`Part`]s, where `parts[0]` is the
//! body's own ring (for a compound, the convex hull of its pieces). The
//! aggregate mass, area and inertia live on the body; per-part values are
//! kept for aggregation and per-part collision.

use glam::DVec2;

use crate::axes;
use crate::bounds::Aabb;
use crate::math;
use crate::vertices::{self, Chamfer, Vertex};

/// Identifier of a body (or compound part) within a world. `0` until the
/// body is registered.
pub type BodyId = u32;

/// Scales the polygon second moment into the engine's inertia convention.
pub(crate) const INERTIA_SCALE: f64 = 4.0;

// ============================================================================
// Collision filter
// ============================================================================

/// Category/mask/group collision filter.
///
/// Two bodies collide iff their groups say so (same positive group always
/// collides, same negative group never collides) or, for distinct/zero
/// groups, each body's mask admits the other's category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollisionFilter {
    /// Category bitmask of this body (one bit set).
    pub category: u32,
    /// Categories this body may collide with.
    pub mask: u32,
    /// Collision group; non-zero groups short-circuit the category test.
    pub group: i32,
}

impl CollisionFilter {
    /// Check whether two filters allow a collision.
    #[inline]
    #[must_use]
    pub fn can_collide(a: &Self, b: &Self) -> bool {
        if a.group == b.group && a.group != 0 {
            return a.group > 0;
        }
        (a.mask & b.category) != 0 && (b.mask & a.category) != 0
    }
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            category: 1,
            mask: u32::MAX,
            group: 0,
        }
    }
}

// ============================================================================
// Parts
// ============================================================================

/// One convex piece of a body's geometry, in world space.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Part {
    /// Id of this part. The root part shares the body's id; other parts get
    /// their own ids so contacts can be keyed per part vertex.
    pub id: u32,
    /// World-space centroid of this part.
    pub position: DVec2,
    /// Clockwise vertex ring.
    pub vertices: Vec<Vertex>,
    /// Deduplicated unit edge normals.
    pub axes: Vec<DVec2>,
    /// World-space bound of the ring.
    pub bounds: Aabb,
    /// Ring area.
    pub area: f64,
    /// Part mass (aggregated into the body for compounds).
    pub mass: f64,
    /// Part moment of inertia.
    pub inertia: f64,
    /// Radius of the circle this ring approximates, when the part was built
    /// by the circle factory.
    pub circle_radius: Option<f64>,
}

/// Dynamic properties stashed while a body is static.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct DynamicProperties {
    restitution: f64,
    friction: f64,
    mass: f64,
    inertia: f64,
    density: f64,
    inverse_mass: f64,
    inverse_inertia: f64,
}

// ============================================================================
// Configuration
// ============================================================================

/// Construction options for [`Body::new`]. All defaults documented inline.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyConfig {
    /// Display label. Default `"Body"`.
    pub label: String,
    /// Initial position of the centre of mass. Default origin.
    pub position: DVec2,
    /// Initial angle in radians. Default `0`.
    pub angle: f64,
    /// Ring points; recentered on their centroid at construction. Default:
    /// a 40x40 square.
    pub vertices: Vec<DVec2>,
    /// Optional corner rounding applied to `vertices`.
    pub chamfer: Option<Chamfer>,
    /// Initial velocity. Default zero.
    pub velocity: DVec2,
    /// Initial angular velocity. Default `0`.
    pub angular_velocity: f64,
    /// Create the body static. Default `false`.
    pub is_static: bool,
    /// Sensor bodies detect collisions but receive no response. Default
    /// `false`.
    pub is_sensor: bool,
    /// Create the body asleep. Default `false`.
    pub is_sleeping: bool,
    /// Mass per unit area. Default `0.001`.
    pub density: f64,
    /// Explicit mass override; otherwise `density * area`.
    pub mass: Option<f64>,
    /// Explicit inertia override; otherwise derived from the ring.
    pub inertia: Option<f64>,
    /// Restitution coefficient. Default `0`.
    pub restitution: f64,
    /// Kinetic friction coefficient. Default `0.1`.
    pub friction: f64,
    /// Static friction multiplier. Default `0.5`.
    pub friction_static: f64,
    /// Air drag per step. Default `0.01`.
    pub friction_air: f64,
    /// Collision filter. Default: category 1, full mask, group 0.
    pub collision_filter: CollisionFilter,
    /// Allowed resting penetration. Default `0.05`.
    pub slop: f64,
    /// Per-body time scaling. Default `1`.
    pub time_scale: f64,
    /// Low-motion steps before sleeping. Default `60`.
    pub sleep_threshold: u32,
    /// Marks the ring as a circle approximation of this radius.
    pub circle_radius: Option<f64>,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            label: "Body".to_owned(),
            position: DVec2::ZERO,
            angle: 0.0,
            vertices: vec![
                DVec2::new(0.0, 0.0),
                DVec2::new(40.0, 0.0),
                DVec2::new(40.0, 40.0),
                DVec2::new(0.0, 40.0),
            ],
            chamfer: None,
            velocity: DVec2::ZERO,
            angular_velocity: 0.0,
            is_static: false,
            is_sensor: false,
            is_sleeping: false,
            density: 0.001,
            mass: None,
            inertia: None,
            restitution: 0.0,
            friction: 0.1,
            friction_static: 0.5,
            friction_air: 0.01,
            collision_filter: CollisionFilter::default(),
            slop: 0.05,
            time_scale: 1.0,
            sleep_threshold: 60,
            circle_radius: None,
        }
    }
}

// ============================================================================
// Body
// ============================================================================

/// A rigid body.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Body {
    /// World-unique id; `0` until registered.
    pub id: BodyId,
    /// Display label.
    pub label: String,
    /// Geometry parts; `parts[0]` is the body's own ring.
    pub parts: Vec<Part>,
    /// Centre of mass, world space.
    pub position: DVec2,
    /// Previous-step position (Verlet state).
    pub position_prev: DVec2,
    /// Orientation, radians.
    pub angle: f64,
    /// Previous-step angle (Verlet state).
    pub angle_prev: f64,
    /// Accumulated force, cleared at the end of each step.
    pub force: DVec2,
    /// Accumulated torque, cleared at the end of each step.
    pub torque: f64,
    /// Derived linear velocity.
    pub velocity: DVec2,
    /// Derived angular velocity.
    pub angular_velocity: f64,
    /// `|velocity|`, updated during integration.
    pub speed: f64,
    /// `|angular_velocity|`, updated during integration.
    pub angular_speed: f64,
    /// Biased motion average used by the sleep controller.
    pub motion: f64,
    /// Consecutive low-motion steps counted toward sleep.
    pub sleep_counter: u32,
    /// Low-motion steps required before sleeping.
    pub sleep_threshold: u32,
    /// Whether the body is asleep.
    pub is_sleeping: bool,
    /// Whether the body is immovable.
    pub is_static: bool,
    /// Sensor bodies generate collision events without response.
    pub is_sensor: bool,
    /// Mass per unit area.
    pub density: f64,
    /// Aggregate mass (infinite when static).
    pub mass: f64,
    /// `1 / mass` (zero when static).
    pub inverse_mass: f64,
    /// Aggregate moment of inertia (infinite when static).
    pub inertia: f64,
    /// `1 / inertia` (zero when static).
    pub inverse_inertia: f64,
    /// Aggregate ring area.
    pub area: f64,
    /// Restitution coefficient.
    pub restitution: f64,
    /// Kinetic friction coefficient.
    pub friction: f64,
    /// Static friction multiplier.
    pub friction_static: f64,
    /// Air drag per step.
    pub friction_air: f64,
    /// Allowed resting penetration.
    pub slop: f64,
    /// Per-body time scaling.
    pub time_scale: f64,
    /// Collision filter.
    pub collision_filter: CollisionFilter,
    /// Contact count accumulated by the position resolver this step.
    pub total_contacts: u32,
    /// Pending positional correction from the contact resolver.
    pub position_impulse: DVec2,
    /// Warm-start linear offset from the constraint solver.
    pub constraint_impulse: DVec2,
    /// Warm-start angular offset from the constraint solver.
    pub constraint_impulse_angle: f64,
    /// Last grid region occupied in the broadphase.
    pub region: Option<crate::broadphase::Region>,
    original: Option<DynamicProperties>,
}

impl Body {
    /// Build a body from a configuration record.
    #[must_use]
    pub fn new(config: BodyConfig) -> Self {
        let points = match &config.chamfer {
            Some(chamfer) => vertices::chamfer(&config.vertices, chamfer),
            None => config.vertices.clone(),
        };

        let mut body = Self {
            id: 0,
            label: config.label,
            parts: vec![Part {
                id: 0,
                position: config.position,
                vertices: Vec::new(),
                axes: Vec::new(),
                bounds: Aabb::new(DVec2::ZERO, DVec2::ZERO),
                area: 0.0,
                mass: 0.0,
                inertia: 0.0,
                circle_radius: config.circle_radius,
            }],
            position: config.position,
            position_prev: config.position,
            angle: config.angle,
            angle_prev: config.angle,
            force: DVec2::ZERO,
            torque: 0.0,
            velocity: DVec2::ZERO,
            angular_velocity: 0.0,
            speed: 0.0,
            angular_speed: 0.0,
            motion: 0.0,
            sleep_counter: 0,
            sleep_threshold: config.sleep_threshold,
            is_sleeping: false,
            is_static: false,
            is_sensor: config.is_sensor,
            density: config.density,
            mass: 0.0,
            inverse_mass: 0.0,
            inertia: 0.0,
            inverse_inertia: 0.0,
            area: 0.0,
            restitution: config.restitution,
            friction: config.friction,
            friction_static: config.friction_static,
            friction_air: config.friction_air,
            slop: config.slop,
            time_scale: config.time_scale,
            collision_filter: config.collision_filter,
            total_contacts: 0,
            position_impulse: DVec2::ZERO,
            constraint_impulse: DVec2::ZERO,
            constraint_impulse_angle: 0.0,
            region: None,
            original: None,
        };

        body.set_vertices(&points);
        if config.angle != 0.0 {
            vertices::rotate(&mut body.parts[0].vertices, config.angle, body.position);
            axes::rotate(&mut body.parts[0].axes, config.angle);
        }
        if let Some(mass) = config.mass {
            body.set_mass(mass);
        }
        if let Some(inertia) = config.inertia {
            body.set_inertia(inertia);
        }
        if config.is_static {
            body.set_static(true);
        }
        if config.is_sleeping {
            body.set_sleeping(true);
        }
        if config.velocity != DVec2::ZERO {
            body.set_velocity(config.velocity);
        }
        if config.angular_velocity != 0.0 {
            body.set_angular_velocity(config.angular_velocity);
        }
        let velocity = body.velocity;
        let part = &mut body.parts[0];
        part.bounds.update(&part.vertices, Some(velocity));
        body
    }

    /// The body's own vertex ring (`parts[0]`).
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.parts[0].vertices
    }

    /// The body's own axes (`parts[0]`).
    #[inline]
    #[must_use]
    pub fn axes(&self) -> &[DVec2] {
        &self.parts[0].axes
    }

    /// The body's own bound (`parts[0]`).
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> &Aabb {
        &self.parts[0].bounds
    }

    /// Radius of the approximated circle, if this body came from the circle
    /// factory.
    #[inline]
    #[must_use]
    pub fn circle_radius(&self) -> Option<f64> {
        self.parts[0].circle_radius
    }

    // ------------------------------------------------------------------
    // Property setters
    // ------------------------------------------------------------------

    /// Set the mass, preserving the inertia-to-mass ratio and keeping the
    /// inverse caches and density consistent.
    pub fn set_mass(&mut self, mass: f64) {
        if self.mass > 0.0 && self.mass.is_finite() && self.inertia.is_finite() {
            let moment = self.inertia / (self.mass / 6.0);
            self.inertia = moment * (mass / 6.0);
            self.inverse_inertia = 1.0 / self.inertia;
        }
        self.mass = mass;
        self.inverse_mass = 1.0 / self.mass;
        self.density = self.mass / self.area;
    }

    /// Set the density, recomputing mass from area.
    pub fn set_density(&mut self, density: f64) {
        self.set_mass(density * self.area);
        self.density = density;
    }

    /// Set the moment of inertia and its inverse.
    pub fn set_inertia(&mut self, inertia: f64) {
        self.inertia = inertia;
        self.inverse_inertia = 1.0 / self.inertia;
    }

    /// Replace the body's own ring.
    ///
    /// The points are recentered so their centroid sits at the body origin,
    /// mass and inertia are recomputed, and the ring is placed at the body's
    /// position.
    pub fn set_vertices(&mut self, points: &[DVec2]) {
        let part_id = self.parts[0].id;
        let mut ring = vertices::create(points);
        for vertex in &mut ring {
            vertex.part = part_id;
        }

        let ring_axes = axes::from_vertices(&ring);
        let area = vertices::area(&ring, false);
        self.area = area;
        self.parts[0].area = area;
        self.set_mass(self.density * area);

        let centre = vertices::centre(&ring);
        vertices::translate(&mut ring, -centre);
        self.set_inertia(INERTIA_SCALE * vertices::inertia(&ring, self.mass));
        self.parts[0].mass = self.mass;
        self.parts[0].inertia = self.inertia;

        vertices::translate(&mut ring, self.position);
        self.parts[0].bounds = Aabb::from_vertices(&ring);
        self.parts[0].vertices = ring;
        self.parts[0].axes = ring_axes;
        self.parts[0].position = self.position;
    }

    /// Make the body static (stashing its dynamic properties) or restore it
    /// to dynamic.
    pub fn set_static(&mut self, is_static: bool) {
        if is_static {
            if self.original.is_none() {
                self.original = Some(DynamicProperties {
                    restitution: self.restitution,
                    friction: self.friction,
                    mass: self.mass,
                    inertia: self.inertia,
                    density: self.density,
                    inverse_mass: self.inverse_mass,
                    inverse_inertia: self.inverse_inertia,
                });
            }
            self.restitution = 0.0;
            self.friction = 1.0;
            self.mass = f64::INFINITY;
            self.inertia = f64::INFINITY;
            self.density = f64::INFINITY;
            self.inverse_mass = 0.0;
            self.inverse_inertia = 0.0;
            self.position_prev = self.position;
            self.angle_prev = self.angle;
            self.velocity = DVec2::ZERO;
            self.angular_velocity = 0.0;
            self.speed = 0.0;
            self.angular_speed = 0.0;
            self.motion = 0.0;
        } else if let Some(original) = self.original.take() {
            self.restitution = original.restitution;
            self.friction = original.friction;
            self.mass = original.mass;
            self.inertia = original.inertia;
            self.density = original.density;
            self.inverse_mass = original.inverse_mass;
            self.inverse_inertia = original.inverse_inertia;
        }
        self.is_static = is_static;
    }

    /// Raw sleep-state switch. Use [`crate::sleeping`] inside the engine so
    /// the matching events fire.
    pub fn set_sleeping(&mut self, is_sleeping: bool) {
        if is_sleeping {
            self.is_sleeping = true;
            self.sleep_counter = self.sleep_threshold;
            self.position_impulse = DVec2::ZERO;
            self.position_prev = self.position;
            self.angle_prev = self.angle;
            self.speed = 0.0;
            self.angular_speed = 0.0;
            self.motion = 0.0;
        } else {
            self.is_sleeping = false;
            self.sleep_counter = 0;
        }
    }

    /// Move the body to `position` without changing its velocity.
    pub fn set_position(&mut self, position: DVec2) {
        let delta = position - self.position;
        self.position_prev += delta;
        self.position = position;
        let velocity = self.velocity;
        for part in &mut self.parts {
            part.position += delta;
            vertices::translate(&mut part.vertices, delta);
            part.bounds.update(&part.vertices, Some(velocity));
        }
    }

    /// Rotate the body to `angle` about its position without changing its
    /// angular velocity.
    pub fn set_angle(&mut self, angle: f64) {
        let delta = angle - self.angle;
        self.angle_prev += delta;
        self.angle = angle;
        let position = self.position;
        let velocity = self.velocity;
        for (i, part) in self.parts.iter_mut().enumerate() {
            vertices::rotate(&mut part.vertices, delta, position);
            axes::rotate(&mut part.axes, delta);
            if i > 0 {
                part.position = math::rotate_about(part.position, delta, position);
            }
            part.bounds.update(&part.vertices, Some(velocity));
        }
    }

    /// Set the linear velocity by adjusting the previous position.
    pub fn set_velocity(&mut self, velocity: DVec2) {
        self.position_prev = self.position - velocity;
        self.velocity = velocity;
        self.speed = velocity.length();
    }

    /// Set the angular velocity by adjusting the previous angle.
    pub fn set_angular_velocity(&mut self, angular_velocity: f64) {
        self.angle_prev = self.angle - angular_velocity;
        self.angular_velocity = angular_velocity;
        self.angular_speed = angular_velocity.abs();
    }

    /// Move the centre of mass without moving the ring. `relative` treats
    /// `centre` as an offset.
    pub fn set_centre(&mut self, centre: DVec2, relative: bool) {
        if relative {
            self.position_prev += centre;
            self.position += centre;
        } else {
            self.position_prev = centre - (self.position - self.position_prev);
            self.position = centre;
        }
    }

    /// Translate by `delta`, preserving velocity.
    #[inline]
    pub fn translate(&mut self, delta: DVec2) {
        self.set_position(self.position + delta);
    }

    /// Rotate by `rotation` radians about the body position, or about an
    /// explicit `point`.
    pub fn rotate(&mut self, rotation: f64, point: Option<DVec2>) {
        match point {
            None => self.set_angle(self.angle + rotation),
            Some(point) => {
                self.set_position(math::rotate_about(self.position, rotation, point));
                self.set_angle(self.angle + rotation);
            }
        }
    }

    /// Scale the body about `point` (default: its position), recomputing
    /// per-part areas, masses and inertias.
    pub fn scale(&mut self, scale_x: f64, scale_y: f64, point: Option<DVec2>) {
        let point = point.unwrap_or(self.position);
        let mut total_area = 0.0;
        let mut total_inertia = 0.0;
        let density = self.density;
        let velocity = self.velocity;

        for (i, part) in self.parts.iter_mut().enumerate() {
            vertices::scale(&mut part.vertices, scale_x, scale_y, point);
            part.axes = axes::from_vertices(&part.vertices);
            part.area = vertices::area(&part.vertices, false);
            part.mass = density * part.area;

            let position = part.position;
            vertices::translate(&mut part.vertices, -position);
            part.inertia = INERTIA_SCALE * vertices::inertia(&part.vertices, part.mass);
            vertices::translate(&mut part.vertices, position);

            if i > 0 {
                total_area += part.area;
                total_inertia += part.inertia;
            }

            part.position = point + (part.position - point) * DVec2::new(scale_x, scale_y);
            part.bounds.update(&part.vertices, Some(velocity));
        }
        self.position = self.parts[0].position;

        if self.parts.len() > 1 {
            self.area = total_area;
            if !self.is_static {
                self.set_mass(self.density * total_area);
                self.set_inertia(total_inertia);
            }
        } else {
            self.area = self.parts[0].area;
            if !self.is_static {
                let mass = self.parts[0].mass;
                let inertia = self.parts[0].inertia;
                self.set_mass(mass);
                self.set_inertia(inertia);
            }
        }

        if let Some(radius) = self.parts[0].circle_radius {
            if scale_x == scale_y {
                self.parts[0].circle_radius = Some(radius * scale_x);
            } else {
                // scaled anisotropically, no longer a circle
                self.parts[0].circle_radius = None;
            }
        }
    }

    /// Turn a list of bodies into the compound parts of this body.
    ///
    /// With `auto_hull`, the body's own ring becomes the convex hull of the
    /// union of the parts. Mass, area and inertia aggregate over the parts
    /// and the body position moves to the mass-weighted centroid.
    pub fn set_parts(&mut self, parts: Vec<Body>, auto_hull: bool) {
        self.parts.truncate(1);
        for body in parts {
            let Body { id, parts, .. } = body;
            let mut piece = parts.into_iter().next().expect("parts[0] always exists");
            piece.id = id;
            for vertex in &mut piece.vertices {
                vertex.part = id;
            }
            self.parts.push(piece);
        }
        if self.parts.len() == 1 {
            return;
        }

        if auto_hull {
            let mut points: Vec<DVec2> = Vec::new();
            for part in &self.parts[1..] {
                points.extend(part.vertices.iter().map(|v| v.point));
            }
            vertices::clockwise_sort(&mut points);
            let hull = vertices::hull(&points);
            let hull_ring = vertices::create(&hull);
            let hull_centre = vertices::centre(&hull_ring);

            self.set_vertices(&hull);
            vertices::translate(&mut self.parts[0].vertices, hull_centre);
        }

        let mut total_mass = 0.0;
        let mut total_area = 0.0;
        let mut total_inertia = 0.0;
        let mut centre = DVec2::ZERO;
        for part in &self.parts[1..] {
            let mass = if part.mass.is_finite() { part.mass } else { 1.0 };
            total_mass += mass;
            total_area += part.area;
            total_inertia += part.inertia;
            centre += part.position * mass;
        }
        centre /= total_mass;

        self.area = total_area;
        self.position = centre;
        self.position_prev = centre;
        self.set_mass(total_mass);
        self.set_inertia(total_inertia);
        self.parts[0].position = centre;
        self.parts[0].mass = self.mass;
        self.parts[0].area = self.area;
        self.parts[0].inertia = self.inertia;
        self.set_position(centre);
    }

    // ------------------------------------------------------------------
    // Forces and integration
    // ------------------------------------------------------------------

    /// Apply `force` at a world point, accumulating the induced torque.
    pub fn apply_force(&mut self, position: DVec2, force: DVec2) {
        self.force += force;
        self.torque += math::cross(position - self.position, force);
    }

    /// Time-corrected Verlet integration of one step.
    ///
    /// `correction` is the ratio of the current to the previous delta and
    /// compensates a variable timestep; `1` for a fixed step.
    pub fn update(&mut self, delta: f64, time_scale: f64, correction: f64) {
        let delta_time_squared = (delta * time_scale * self.time_scale).powi(2);
        let friction_air = 1.0 - self.friction_air * time_scale * self.time_scale;

        let velocity_prev = self.position - self.position_prev;
        self.velocity =
            velocity_prev * (friction_air * correction) + (self.force / self.mass) * delta_time_squared;
        self.position_prev = self.position;
        self.position += self.velocity;

        self.angular_velocity = (self.angle - self.angle_prev) * friction_air * correction
            + (self.torque / self.inertia) * delta_time_squared;
        self.angle_prev = self.angle;
        self.angle += self.angular_velocity;

        self.speed = self.velocity.length();
        self.angular_speed = self.angular_velocity.abs();

        let velocity = self.velocity;
        let angular_velocity = self.angular_velocity;
        let position = self.position;
        for (i, part) in self.parts.iter_mut().enumerate() {
            vertices::translate(&mut part.vertices, velocity);
            if i > 0 {
                part.position += velocity;
            }
            if angular_velocity != 0.0 {
                vertices::rotate(&mut part.vertices, angular_velocity, position);
                axes::rotate(&mut part.axes, angular_velocity);
                if i > 0 {
                    part.position = math::rotate_about(part.position, angular_velocity, position);
                }
            }
            part.bounds.update(&part.vertices, Some(velocity));
        }
        self.parts[0].position = self.position;
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::new(BodyConfig::default())
    }
}

// ============================================================================
// Tests
// ============================================================================
