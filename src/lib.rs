//! pivot2d: Deterministic Fixed-Timestep 2D Rigid-Body Physics
//!
//! A 2D physics engine for interactive simulation: convex-polygon and circle
//! bodies with friction, restitution, compound (multi-part) bodies,
//! distance/spring constraints, sleeping, and a uniform spatial-hash
//! broadphase. Integration is time-corrected position Verlet; contacts are
//! solved with iterated sequential impulses and warm starting, so stacks
//! settle and stay settled.
//!
//! # Features
//!
//! - **Verlet integration**: velocity derived from pose history, stable
//!   under iterative constraint projection
//! - **SAT narrowphase**: separating-axis tests with previous-axis reuse and
//!   support-vertex manifolds
//! - **Grid broadphase**: incremental uniform spatial hash with
//!   reference-counted candidate pairs
//! - **Pair cache**: vertex-keyed contacts persist impulses across steps
//! - **Compound bodies**: concave shapes via convex decomposition
//!   (Bayazit quick decomposition and an exhaustive optimal variant)
//! - **Events**: typed channels for step, collision lifecycle, sleeping and
//!   world structure changes
//!
//! # Example
//!
//! ```rust
//! use pivot2d::{factory, BodyConfig, Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! let root = engine.world.root();
//!
//! // a static floor and a falling box
//! engine.world.add_body(
//!     root,
//!     factory::rectangle(200.0, 235.0, 400.0, 30.0, BodyConfig {
//!         is_static: true,
//!         ..Default::default()
//!     }),
//! );
//! let body = engine.world.add_body(
//!     root,
//!     factory::rectangle(200.0, 50.0, 20.0, 20.0, BodyConfig::default()),
//! );
//!
//! // fixed 60 Hz timestep
//! for _ in 0..60 {
//!     engine.step(1000.0 / 60.0, 1.0);
//! }
//! assert!(engine.world.body(body).unwrap().position.y > 50.0);
//! ```
//!
//! # Modules
//!
//! - [`math`]: scalar-cross and rotation helpers over [`glam::DVec2`]
//! - [`bounds`]: axis-aligned bounding boxes with swept expansion
//! - [`vertices`]: polygon ring operations (area, centroid, inertia, hull,
//!   chamfer, path parsing)
//! - [`axes`]: deduplicated unit edge normals for the SAT
//! - [`decompose`]: convex decomposition of simple polygons
//! - [`body`]: rigid bodies, compound parts and property setters
//! - [`factory`]: shape factories, including decomposing [`factory::from_vertices`]
//! - [`composite`]: the world tree and object arenas
//! - [`constraint`]: distance/spring/pin constraints with warm starting
//! - [`broadphase`]: the uniform grid spatial hash
//! - [`narrowphase`]: SAT collision testing and manifold extraction
//! - [`pairs`]: the temporal pair cache and collision lifecycle
//! - [`resolver`]: positional and velocity contact solvers
//! - [`sleeping`]: the motion-biased sleep controller
//! - [`events`]: typed event channels
//! - [`query`]: point, region and ray lookups
//! - [`engine`]: the per-step state machine
//! - [`error`]: the unified error type
//!
//! # Determinism
//!
//! Steps are synchronous and single-threaded, iteration counts are fixed,
//! and every internally unordered collection is re-ordered before use, so a
//! scene stepped twice on the same platform produces bit-identical
//! trajectories. Cross-platform bit equality is out of scope (`f64`
//! semantics may differ between targets).

#![warn(missing_docs)]

pub mod axes;
pub mod body;
pub mod bounds;
pub mod broadphase;
pub mod composite;
pub mod constraint;
pub mod decompose;
pub mod engine;
pub mod error;
pub mod events;
pub mod factory;
pub mod math;
pub mod narrowphase;
pub mod pairs;
pub mod query;
pub mod resolver;
pub mod sleeping;
pub mod vertices;

pub use body::{Body, BodyConfig, BodyId, CollisionFilter, Part};
pub use bounds::Aabb;
pub use broadphase::{Grid, Region};
pub use composite::{Composite, CompositeId, World, WorldEvent, WorldObject};
pub use constraint::{Constraint, ConstraintConfig, ConstraintId, RenderHint};
pub use engine::{Engine, EngineConfig, Timing};
pub use error::PhysicsError;
pub use events::{Channel, CollisionEvent, EngineEvents, SleepEvent, StepEvent};
pub use narrowphase::{Collision, PartHandle, Support};
pub use pairs::{Contact, ContactId, Pair, Pairs};
pub use vertices::{Chamfer, Vertex};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::body::{Body, BodyConfig, BodyId, CollisionFilter};
    pub use crate::bounds::Aabb;
    pub use crate::composite::{CompositeId, World, WorldObject};
    pub use crate::constraint::{Constraint, ConstraintConfig, ConstraintId};
    pub use crate::engine::{Engine, EngineConfig};
    pub use crate::error::PhysicsError;
    pub use crate::events::{CollisionEvent, SleepEvent, StepEvent};
    pub use crate::factory;
    pub use crate::query;
    pub use crate::vertices::Chamfer;
}
