//! Polygon Vertex Operations
//!
//! A body's shape is a clockwise ring of [`Vertex`] values in world space
//! (screen convention: y grows downward, so "clockwise" has positive signed
//! area here). This module provides the polygon primitives the rest of the
//! engine is built from: area, centroid, second moment, in-place transforms,
//! point containment, convex hull, chamfering and path parsing.
//!
//! Constructive helpers that run before a ring exists (sorting, hull,
//! chamfer, convexity probe, path parsing) operate on plain point slices;
//! everything applied to live rings operates on `[Vertex]`.

use glam::DVec2;

use crate::error::PhysicsError;
use crate::math;

/// One vertex of a body's polygon ring.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    /// World-space position.
    pub point: DVec2,
    /// 1-based position within the owning ring. Stable across transforms;
    /// contact identifiers are derived from it.
    pub index: usize,
    /// Id of the owning part (`0` until the body is registered in a world).
    pub part: u32,
    /// Marks an edge coincident with another part of the same compound body.
    pub is_internal: bool,
}

/// Build a vertex ring from points. Indices are 1-based; the owning part id
/// is assigned later, when the body joins a world.
#[must_use]
pub fn create(points: &[DVec2]) -> Vec<Vertex> {
    points
        .iter()
        .enumerate()
        .map(|(i, &point)| Vertex {
            point,
            index: i + 1,
            part: 0,
            is_internal: false,
        })
        .collect()
}

/// Extract the bare points of a ring.
#[must_use]
pub fn points(vertices: &[Vertex]) -> Vec<DVec2> {
    vertices.iter().map(|v| v.point).collect()
}

// ============================================================================
// Measures
// ============================================================================

/// Polygon area via the shoelace formula.
///
/// Unsigned unless `signed` is set; the signed value is positive for
/// clockwise rings (y-down convention).
#[must_use]
pub fn area(vertices: &[Vertex], signed: bool) -> f64 {
    let mut area = 0.0;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        area += (vertices[j].point.x - vertices[i].point.x)
            * (vertices[j].point.y + vertices[i].point.y);
        j = i;
    }
    if signed {
        area / 2.0
    } else {
        (area / 2.0).abs()
    }
}

/// Arithmetic mean of the vertex positions.
#[must_use]
pub fn mean(vertices: &[Vertex]) -> DVec2 {
    let sum: DVec2 = vertices.iter().map(|v| v.point).sum();
    sum / vertices.len() as f64
}

/// Area-weighted centroid via the cross-product shoelace (not the mean).
#[must_use]
pub fn centre(vertices: &[Vertex]) -> DVec2 {
    let signed_area = area(vertices, true);
    let mut centre = DVec2::ZERO;
    for i in 0..vertices.len() {
        let j = (i + 1) % vertices.len();
        let cross = math::cross(vertices[i].point, vertices[j].point);
        centre += (vertices[i].point + vertices[j].point) * cross;
    }
    centre / (6.0 * signed_area)
}

/// Second moment of area of the polygon about its origin, scaled by mass.
///
/// Bourke's formula; the ring must already be expressed relative to the
/// rotation origin.
#[must_use]
pub fn inertia(vertices: &[Vertex], mass: f64) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for i in 0..vertices.len() {
        let j = (i + 1) % vertices.len();
        let a = vertices[j].point;
        let b = vertices[i].point;
        let cross = math::cross(a, b).abs();
        numerator += cross * (a.dot(a) + a.dot(b) + b.dot(b));
        denominator += cross;
    }
    (mass / 6.0) * (numerator / denominator)
}

// ============================================================================
// In-place transforms
// ============================================================================

/// Translate every vertex by `delta`.
pub fn translate(vertices: &mut [Vertex], delta: DVec2) {
    for vertex in vertices {
        vertex.point += delta;
    }
}

/// Rotate every vertex by `angle` radians about `point`.
pub fn rotate(vertices: &mut [Vertex], angle: f64, point: DVec2) {
    if angle == 0.0 {
        return;
    }
    let (sin, cos) = angle.sin_cos();
    for vertex in vertices {
        let d = vertex.point - point;
        vertex.point = point + DVec2::new(d.x * cos - d.y * sin, d.x * sin + d.y * cos);
    }
}

/// Scale the ring about `point` by independent x/y factors.
pub fn scale(vertices: &mut [Vertex], scale_x: f64, scale_y: f64, point: DVec2) {
    if scale_x == 1.0 && scale_y == 1.0 {
        return;
    }
    for vertex in vertices {
        let delta = vertex.point - point;
        vertex.point = point + delta * DVec2::new(scale_x, scale_y);
    }
}

/// Half-plane containment test for clockwise rings.
///
/// Returns `true` iff `point` lies on the inner side of every edge.
#[must_use]
pub fn contains(vertices: &[Vertex], point: DVec2) -> bool {
    for i in 0..vertices.len() {
        let vertex = vertices[i].point;
        let next = vertices[(i + 1) % vertices.len()].point;
        if (point.x - vertex.x) * (next.y - vertex.y)
            + (point.y - vertex.y) * (vertex.x - next.x)
            > 0.0
        {
            return false;
        }
    }
    true
}

// ============================================================================
// Constructive helpers (point slices)
// ============================================================================

/// Sort points into clockwise order around their mean.
pub fn clockwise_sort(points: &mut [DVec2]) {
    let sum: DVec2 = points.iter().sum();
    let centre = sum / points.len() as f64;
    points.sort_by(|&a, &b| math::angle(centre, a).total_cmp(&math::angle(centre, b)));
}

/// Convexity probe.
///
/// `Some(true)` if the ring is convex, `Some(false)` if mixed turn signs are
/// found, `None` for fewer than 3 points or a fully degenerate (zero-area)
/// ring. Assumes the clockwise y-down winding used throughout the engine.
#[must_use]
pub fn is_convex(points: &[DVec2]) -> Option<bool> {
    let n = points.len();
    if n < 3 {
        return None;
    }
    let mut flag = 0;
    for i in 0..n {
        let j = (i + 1) % n;
        let k = (i + 2) % n;
        let z = (points[j].x - points[i].x) * (points[k].y - points[j].y)
            - (points[j].y - points[i].y) * (points[k].x - points[j].x);
        if z < 0.0 {
            flag |= 1;
        } else if z > 0.0 {
            flag |= 2;
        }
        if flag == 3 {
            return Some(false);
        }
    }
    if flag != 0 {
        Some(true)
    } else {
        None
    }
}

/// Convex hull of a point set (Andrew's monotone chain), returned in
/// clockwise order.
#[must_use]
pub fn hull(points: &[DVec2]) -> Vec<DVec2> {
    let mut sorted: Vec<DVec2> = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));

    let mut lower: Vec<DVec2> = Vec::with_capacity(sorted.len());
    for &point in &sorted {
        while lower.len() >= 2
            && math::cross3(lower[lower.len() - 2], lower[lower.len() - 1], point) <= 0.0
        {
            lower.pop();
        }
        lower.push(point);
    }

    let mut upper: Vec<DVec2> = Vec::with_capacity(sorted.len());
    for &point in sorted.iter().rev() {
        while upper.len() >= 2
            && math::cross3(upper[upper.len() - 2], upper[upper.len() - 1], point) <= 0.0
        {
            upper.pop();
        }
        upper.push(point);
    }

    upper.pop();
    lower.pop();
    upper.extend(lower);
    upper
}

/// Rounding quality for [`chamfer`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chamfer {
    /// Corner radius per vertex; the last entry repeats for any remaining
    /// vertices.
    pub radius: Vec<f64>,
    /// Arc segment count; `-1` derives it from the radius.
    pub quality: f64,
    /// Lower bound on the derived segment count.
    pub quality_min: f64,
    /// Upper bound on the derived segment count.
    pub quality_max: f64,
}

impl Default for Chamfer {
    fn default() -> Self {
        Self {
            radius: vec![8.0],
            quality: -1.0,
            quality_min: 2.0,
            quality_max: 14.0,
        }
    }
}

/// Replace each corner of the ring with a circular arc.
///
/// The automatic quality is `clamp(radius^0.32 * 1.75, quality_min,
/// quality_max)`, rounded up to an even segment count.
#[must_use]
pub fn chamfer(points: &[DVec2], config: &Chamfer) -> Vec<DVec2> {
    if config.radius.is_empty() {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(points.len() * 4);
    for i in 0..points.len() {
        let prev = points[if i == 0 { points.len() - 1 } else { i - 1 }];
        let vertex = points[i];
        let next = points[(i + 1) % points.len()];

        let radius = config.radius[i.min(config.radius.len() - 1)];
        if radius == 0.0 {
            out.push(vertex);
            continue;
        }

        let prev_normal = DVec2::new(vertex.y - prev.y, prev.x - vertex.x).normalize();
        let next_normal = DVec2::new(next.y - vertex.y, vertex.x - next.x).normalize();

        let diagonal_radius = (2.0 * radius * radius).sqrt();
        let radius_vector = prev_normal * radius;
        let mid_normal = ((prev_normal + next_normal) * 0.5).normalize();
        let scaled_vertex = vertex - mid_normal * diagonal_radius;

        let mut precision = config.quality;
        if precision == -1.0 {
            precision = radius.powf(0.32) * 1.75;
        }
        precision = precision.clamp(config.quality_min, config.quality_max);
        // even arc counts meet edges symmetrically
        if precision % 2.0 == 1.0 {
            precision += 1.0;
        }

        let alpha = prev_normal.dot(next_normal).acos();
        let theta = alpha / precision;

        for j in 0..precision as usize {
            out.push(math::rotate(radius_vector, theta * j as f64) + scaled_vertex);
        }
    }
    out
}

// ============================================================================
// Path strings
// ============================================================================

/// Parse a whitespace/comma-separated `x y` coordinate list, with optional
/// `L` command letters, into points.
pub fn from_path(path: &str) -> Result<Vec<DVec2>, PhysicsError> {
    let tokens: Vec<&str> = path
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("L"))
        .collect();
    if tokens.len() % 2 != 0 {
        return Err(PhysicsError::InvalidPath {
            token: tokens.len(),
        });
    }
    let mut points = Vec::with_capacity(tokens.len() / 2);
    for (i, pair) in tokens.chunks(2).enumerate() {
        let x: f64 = pair[0]
            .parse()
            .map_err(|_| PhysicsError::InvalidPath { token: i * 2 })?;
        let y: f64 = pair[1]
            .parse()
            .map_err(|_| PhysicsError::InvalidPath { token: i * 2 + 1 })?;
        points.push(DVec2::new(x, y));
    }
    Ok(points)
}

/// Serialize points back into the path form accepted by [`from_path`].
///
/// Coordinates are printed with shortest round-trip formatting, so
/// `from_path(&to_path(&p))` reproduces `p` exactly.
#[must_use]
pub fn to_path(points: &[DVec2]) -> String {
    let mut path = String::new();
    for point in points {
        if !path.is_empty() {
            path.push(' ');
        }
        path.push_str(&format!("L {} {}", point.x, point.y));
    }
    path
}

// ============================================================================
// Tests
// ============================================================================
