//! Body Factories
//!
//! Convenience constructors for common shapes, plus [`from_vertices`], which
//! turns arbitrary simple polygons into bodies by convex decomposition,
//! building a compound body when more than one convex piece results.

use glam::DVec2;

use crate::body::{Body, BodyConfig};
use crate::decompose;
use crate::error::PhysicsError;
use crate::vertices;

/// Squared world-unit threshold under which part edges count as coincident.
const COINCIDENT_MAX_DIST: f64 = 5.0;

fn labeled(mut config: BodyConfig, label: &str) -> BodyConfig {
    if config.label == "Body" {
        config.label = label.to_owned();
    }
    config
}

/// An axis-aligned `width` x `height` rectangle centred at `(x, y)`.
#[must_use]
pub fn rectangle(x: f64, y: f64, width: f64, height: f64, config: BodyConfig) -> Body {
    let mut config = labeled(config, "Rectangle Body");
    config.position = DVec2::new(x, y);
    config.vertices = vec![
        DVec2::new(0.0, 0.0),
        DVec2::new(width, 0.0),
        DVec2::new(width, height),
        DVec2::new(0.0, height),
    ];
    Body::new(config)
}

/// A regular polygon with `sides` vertices on a circle of `radius`, centred
/// at `(x, y)`.
#[must_use]
pub fn polygon(x: f64, y: f64, sides: usize, radius: f64, config: BodyConfig) -> Body {
    if sides < 3 {
        return circle(x, y, radius, config, 25);
    }

    let theta = std::f64::consts::TAU / sides as f64;
    let offset = theta * 0.5;
    let points: Vec<DVec2> = (0..sides)
        .map(|i| {
            let angle = offset + i as f64 * theta;
            DVec2::new(angle.cos() * radius, angle.sin() * radius)
        })
        .collect();

    let mut config = labeled(config, "Polygon Body");
    config.position = DVec2::new(x, y);
    config.vertices = points;
    Body::new(config)
}

/// A circle of `radius` centred at `(x, y)`, approximated by a regular
/// polygon with an even number of sides, at most `max_sides`.
#[must_use]
pub fn circle(x: f64, y: f64, radius: f64, config: BodyConfig, max_sides: usize) -> Body {
    let mut sides = (max_sides as f64).min(radius).max(10.0).ceil() as usize;
    // even side counts give symmetric axes
    if sides % 2 == 1 {
        sides += 1;
    }

    let mut config = labeled(config, "Circle Body");
    config.circle_radius = Some(radius);
    polygon(x, y, sides, radius, config)
}

/// An isosceles trapezoid of `width` x `height` centred at `(x, y)`.
///
/// `slope` in `(0, 1)` controls how far the roof is inset on each side; at
/// `1` the shape degenerates to a triangle.
#[must_use]
pub fn trapezoid(x: f64, y: f64, width: f64, height: f64, slope: f64, config: BodyConfig) -> Body {
    let slope = slope * 0.5;
    let roof = (1.0 - slope * 2.0) * width;
    let x1 = width * slope;
    let x2 = x1 + roof;
    let x3 = x2 + x1;

    let points = if slope < 0.5 {
        vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(x1, -height),
            DVec2::new(x2, -height),
            DVec2::new(x3, 0.0),
        ]
    } else {
        vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(x2, -height),
            DVec2::new(x3, 0.0),
        ]
    };

    let mut config = labeled(config, "Trapezoid Body");
    config.position = DVec2::new(x, y);
    config.vertices = points;
    Body::new(config)
}

/// Build a body from one or more simple polygons, decomposing concave rings
/// into convex parts.
///
/// Convex input becomes a single body. Concave input is cleaned
/// (`remove_collinear` radians collinearity threshold, duplicate removal),
/// decomposed with [`decompose::quick_decomp`], filtered by `minimum_area`,
/// and assembled into a compound at `(x, y)`. Non-simple input and failed
/// decompositions fall back to the convex hull with a warning.
///
/// With `flag_internal`, edges shared between parts (within a squared
/// distance of 5 world units) are marked [`vertices::Vertex::is_internal`].
pub fn from_vertices(
    x: f64,
    y: f64,
    vertex_sets: Vec<Vec<DVec2>>,
    config: BodyConfig,
    flag_internal: bool,
    remove_collinear: f64,
    minimum_area: f64,
) -> Result<Body, PhysicsError> {
    if vertex_sets.is_empty() {
        return Err(PhysicsError::InvalidGeometry {
            reason: "no vertex sets supplied",
        });
    }

    let mut bodies: Vec<Body> = Vec::new();
    for points in &vertex_sets {
        if points.len() < 3 {
            return Err(PhysicsError::InvalidGeometry {
                reason: "fewer than 3 vertices",
            });
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err(PhysicsError::InvalidGeometry {
                reason: "non-finite coordinate",
            });
        }

        if vertices::is_convex(points) == Some(true) {
            let mut sorted = points.clone();
            vertices::clockwise_sort(&mut sorted);
            bodies.push(part_body(DVec2::new(x, y), sorted, &config));
            continue;
        }

        // concave: clean up, orient and decompose
        let mut ring = points.clone();
        decompose::make_ccw(&mut ring);
        if remove_collinear > 0.0 {
            decompose::remove_collinear(&mut ring, remove_collinear);
        }
        decompose::remove_duplicates(&mut ring, 0.01);

        let chunks = if decompose::is_simple(&ring) {
            let result = decompose::quick_decomp(&ring);
            if result.truncated {
                tracing::warn!("decomposition truncated, using partial result");
            }
            result.polygons
        } else {
            tracing::warn!("non-simple polygon, falling back to convex hull");
            Vec::new()
        };

        let mut kept = 0;
        for chunk in &chunks {
            if minimum_area > 0.0 {
                let chunk_ring = vertices::create(chunk);
                if vertices::area(&chunk_ring, false) < minimum_area {
                    continue;
                }
            }
            let mut sorted = chunk.clone();
            vertices::clockwise_sort(&mut sorted);
            let centre = vertices::centre(&vertices::create(&sorted));
            bodies.push(part_body(centre, sorted, &config));
            kept += 1;
        }

        if kept == 0 {
            // hull fallback for non-simple or fully filtered input
            let hull = vertices::hull(points);
            let hull_ring = vertices::create(&hull);
            if hull.len() < 3 || vertices::area(&hull_ring, false) <= 0.0 {
                return Err(PhysicsError::DecompositionFailed {
                    reason: "no convex pieces and degenerate hull",
                });
            }
            bodies.push(part_body(DVec2::new(x, y), hull, &config));
        }
    }

    if flag_internal {
        flag_coincident_edges(&mut bodies);
    }

    if bodies.len() == 1 {
        let mut body = bodies.into_iter().next().expect("length checked");
        body.set_position(DVec2::new(x, y));
        Ok(body)
    } else {
        let mut compound = Body::new(BodyConfig {
            vertices: bodies[0].vertices().iter().map(|v| v.point).collect(),
            ..clone_material(&config)
        });
        compound.set_parts(bodies, true);
        compound.set_position(DVec2::new(x, y));
        Ok(compound)
    }
}

fn part_body(position: DVec2, points: Vec<DVec2>, config: &BodyConfig) -> Body {
    let mut part_config = clone_material(config);
    part_config.position = position;
    part_config.vertices = points;
    Body::new(part_config)
}

/// Copy everything from `config` except geometry placement.
fn clone_material(config: &BodyConfig) -> BodyConfig {
    BodyConfig {
        vertices: BodyConfig::default().vertices,
        position: DVec2::ZERO,
        angle: 0.0,
        chamfer: None,
        circle_radius: None,
        ..config.clone()
    }
}

/// Mark edges that two parts share (within [`COINCIDENT_MAX_DIST`], squared
/// world units) as internal on both rings.
fn flag_coincident_edges(bodies: &mut [Body]) {
    for i in 0..bodies.len() {
        for j in i + 1..bodies.len() {
            let (head, tail) = bodies.split_at_mut(j);
            let a = &mut head[i].parts[0].vertices;
            let b = &mut tail[0].parts[0].vertices;
            let (na, nb) = (a.len(), b.len());

            for k in 0..na {
                for l in 0..nb {
                    let da = a[(k + 1) % na].point.distance_squared(b[l].point);
                    let db = a[k].point.distance_squared(b[(l + 1) % nb].point);
                    if da < COINCIDENT_MAX_DIST && db < COINCIDENT_MAX_DIST {
                        a[k].is_internal = true;
                        b[l].is_internal = true;
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
