//! Convex Decomposition of Simple Polygons
//!
//! Splits a simple, counter-clockwise polygon into convex pieces so concave
//! shapes can be simulated as compound bodies of convex parts.
//!
//! # Algorithms
//!
//! - [`decomp`]: exhaustive reflex-diagonal search, O(n^4). For each reflex
//!   vertex every visible diagonal is tried and the split minimizing the
//!   total piece count wins. Produces optimal decompositions for small rings.
//! - [`quick_decomp`]: Bayazit's algorithm. For each reflex vertex, rays
//!   shot through its incident edges find the lower/upper boundary
//!   intersections; the split goes to the closest visible vertex inside that
//!   wedge, or to a Steiner point at the wedge midpoint when the wedge spans
//!   a single edge. Recursion solves the smaller half first and is capped at
//!   [`MAX_LEVEL`]; an overflowing subtree is abandoned with a warning and
//!   the partial result is returned.
//!
//! Callers that cannot tolerate partial output should fall back to the
//! convex hull of the input.

use glam::DVec2;

use crate::math;

/// Recursion cap for [`quick_decomp`]. Subtrees deeper than this are dropped.
pub const MAX_LEVEL: u32 = 100;

/// Output of [`quick_decomp`].
#[derive(Clone, Debug, Default)]
pub struct Decomposition {
    /// Convex pieces, each wound like the input.
    pub polygons: Vec<Vec<DVec2>>,
    /// Reflex vertices encountered while splitting.
    pub reflex: Vec<DVec2>,
    /// Steiner points inserted on polygon edges.
    pub steiner: Vec<DVec2>,
    /// Set when the recursion cap discarded a subtree; the result is then
    /// a partial cover of the input.
    pub truncated: bool,
}

#[inline]
fn at(polygon: &[DVec2], i: isize) -> DVec2 {
    let n = polygon.len() as isize;
    polygon[(((i % n) + n) % n) as usize]
}

#[inline]
fn left(a: DVec2, b: DVec2, c: DVec2) -> bool {
    math::cross3(a, b, c) > 0.0
}

#[inline]
fn left_on(a: DVec2, b: DVec2, c: DVec2) -> bool {
    math::cross3(a, b, c) >= 0.0
}

#[inline]
fn right(a: DVec2, b: DVec2, c: DVec2) -> bool {
    math::cross3(a, b, c) < 0.0
}

#[inline]
fn right_on(a: DVec2, b: DVec2, c: DVec2) -> bool {
    math::cross3(a, b, c) <= 0.0
}

#[inline]
fn is_reflex(polygon: &[DVec2], i: isize) -> bool {
    right(at(polygon, i - 1), at(polygon, i), at(polygon, i + 1))
}

/// Intersection of the infinite lines through (`p1`,`p2`) and (`q1`,`q2`).
/// Returns the origin for parallel lines, matching the permissive behavior
/// the wedge search expects.
fn line_intersection(p1: DVec2, p2: DVec2, q1: DVec2, q2: DVec2) -> DVec2 {
    let a1 = p2.y - p1.y;
    let b1 = p1.x - p2.x;
    let c1 = a1 * p1.x + b1 * p1.y;
    let a2 = q2.y - q1.y;
    let b2 = q1.x - q2.x;
    let c2 = a2 * q1.x + b2 * q1.y;
    let det = a1 * b2 - a2 * b1;
    if det == 0.0 {
        DVec2::ZERO
    } else {
        DVec2::new((b2 * c1 - b1 * c2) / det, (a1 * c2 - a2 * c1) / det)
    }
}

/// Proper segment-segment intersection test.
pub(crate) fn segments_intersect(p1: DVec2, p2: DVec2, q1: DVec2, q2: DVec2) -> bool {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let da = q2.x - q1.x;
    let db = q2.y - q1.y;

    // parallel segments do not count as intersecting
    if da * dy - db * dx == 0.0 {
        return false;
    }

    let s = (dx * (q1.y - p1.y) + dy * (p1.x - q1.x)) / (da * dy - db * dx);
    let t = (da * (p1.y - q1.y) + db * (q1.x - p1.x)) / (db * dx - da * dy);
    (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t)
}

/// Visibility used by the exhaustive search: `a` sees `b` when the diagonal
/// stays inside the polygon and crosses no boundary edge.
fn can_see(polygon: &[DVec2], a: isize, b: isize) -> bool {
    if left_on(at(polygon, a + 1), at(polygon, a), at(polygon, b))
        && right_on(at(polygon, a - 1), at(polygon, a), at(polygon, b))
    {
        return false;
    }
    let dist = at(polygon, a).distance_squared(at(polygon, b));
    for i in 0..polygon.len() as isize {
        if (i + 1) % polygon.len() as isize == a || i == a {
            continue;
        }
        if left_on(at(polygon, a), at(polygon, b), at(polygon, i + 1))
            && right_on(at(polygon, a), at(polygon, b), at(polygon, i))
        {
            let p = line_intersection(
                at(polygon, a),
                at(polygon, b),
                at(polygon, i),
                at(polygon, i + 1),
            );
            if at(polygon, a).distance_squared(p) < dist {
                return false;
            }
        }
    }
    true
}

/// Visibility used by the quick decomposition: edge-crossing test only.
fn can_see_simple(polygon: &[DVec2], a: usize, b: usize) -> bool {
    let n = polygon.len();
    for i in 0..n {
        let j = (i + 1) % n;
        if i == a || i == b || j == a || j == b {
            continue;
        }
        if segments_intersect(polygon[a], polygon[b], polygon[i], polygon[j]) {
            return false;
        }
    }
    true
}

/// Copy the ring slice from `i` to `j` inclusive, wrapping past the end.
fn copy_range(polygon: &[DVec2], i: usize, j: usize) -> Vec<DVec2> {
    let mut out = Vec::new();
    if i < j {
        out.extend_from_slice(&polygon[i..=j]);
    } else {
        out.extend_from_slice(&polygon[i..]);
        out.extend_from_slice(&polygon[..=j]);
    }
    out
}

// ============================================================================
// Orientation and cleanup
// ============================================================================

/// Reorient the polygon counter-clockwise if needed, pivoting on the
/// bottom-right vertex. Returns whether the ring was reversed.
pub fn make_ccw(polygon: &mut [DVec2]) -> bool {
    let mut br = 0;
    for i in 1..polygon.len() {
        if polygon[i].y < polygon[br].y
            || (polygon[i].y == polygon[br].y && polygon[i].x > polygon[br].x)
        {
            br = i;
        }
    }
    let br = br as isize;
    if !left(at(polygon, br - 1), at(polygon, br), at(polygon, br + 1)) {
        polygon.reverse();
        true
    } else {
        false
    }
}

/// Whether the closed ring is free of self-intersections.
#[must_use]
pub fn is_simple(polygon: &[DVec2]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    // every open segment pair except neighbours
    for i in 0..n - 1 {
        for j in 0..i.saturating_sub(1) {
            if segments_intersect(polygon[i], polygon[i + 1], polygon[j], polygon[j + 1]) {
                return false;
            }
        }
    }
    // closing segment against all but its neighbours
    for i in 1..n - 2 {
        if segments_intersect(polygon[n - 1], polygon[0], polygon[i], polygon[i + 1]) {
            return false;
        }
    }
    true
}

fn collinear(a: DVec2, b: DVec2, c: DVec2, threshold_angle: f64) -> bool {
    if threshold_angle == 0.0 {
        return math::cross3(a, b, c) == 0.0;
    }
    let ab = b - a;
    let bc = c - b;
    let denom = ab.length() * bc.length();
    if denom == 0.0 {
        return true;
    }
    let angle = (ab.dot(bc) / denom).clamp(-1.0, 1.0).acos();
    angle < threshold_angle
}

/// Drop vertices whose incident edges deviate by less than `threshold_angle`
/// radians. Returns the number removed. Never reduces the ring below a
/// triangle.
pub fn remove_collinear(polygon: &mut Vec<DVec2>, threshold_angle: f64) -> usize {
    let mut removed = 0;
    let mut i = polygon.len() as isize - 1;
    while polygon.len() > 3 && i >= 0 {
        if collinear(
            at(polygon, i - 1),
            at(polygon, i),
            at(polygon, i + 1),
            threshold_angle,
        ) {
            polygon.remove(i as usize % polygon.len());
            removed += 1;
        }
        i -= 1;
    }
    removed
}

/// Drop points closer than `tolerance` to an earlier point.
pub fn remove_duplicates(polygon: &mut Vec<DVec2>, tolerance: f64) {
    let tol_sq = tolerance * tolerance;
    let mut i = polygon.len();
    while i > 1 {
        i -= 1;
        for j in 0..i {
            if polygon[i].distance_squared(polygon[j]) < tol_sq {
                polygon.remove(i);
                break;
            }
        }
    }
}

// ============================================================================
// Exhaustive decomposition
// ============================================================================

/// Optimal convex decomposition via exhaustive reflex-diagonal search.
///
/// O(n^4); intended for small rings. The input must be simple and
/// counter-clockwise (see [`make_ccw`]).
#[must_use]
pub fn decomp(polygon: &[DVec2]) -> Vec<Vec<DVec2>> {
    if polygon.len() < 3 {
        return Vec::new();
    }

    let n = polygon.len() as isize;
    let mut best: Option<Vec<Vec<DVec2>>> = None;

    for i in 0..n {
        if !is_reflex(polygon, i) {
            continue;
        }
        for j in 0..n {
            // a diagonal must connect non-adjacent vertices
            let gap = (j - i).rem_euclid(n);
            if gap <= 1 || gap == n - 1 {
                continue;
            }
            if !can_see(polygon, i, j) {
                continue;
            }
            let lower = decomp(&copy_range(polygon, i as usize, j as usize));
            let upper = decomp(&copy_range(polygon, j as usize, i as usize));
            let count = lower.len() + upper.len();
            if best.as_ref().map_or(true, |b| count < b.len()) {
                let mut pieces = lower;
                pieces.extend(upper);
                best = Some(pieces);
            }
        }
    }

    best.unwrap_or_else(|| vec![polygon.to_vec()])
}

// ============================================================================
// Bayazit quick decomposition
// ============================================================================

/// Bayazit's quick convex decomposition.
///
/// The input must be simple and counter-clockwise (see [`make_ccw`] and
/// [`is_simple`]); a non-simple input yields an unspecified partial cover.
#[must_use]
pub fn quick_decomp(polygon: &[DVec2]) -> Decomposition {
    let mut result = Decomposition::default();
    quick_decomp_level(polygon, &mut result, 0);
    result
}

fn quick_decomp_level(polygon: &[DVec2], out: &mut Decomposition, level: u32) {
    if polygon.len() < 3 {
        return;
    }
    let level = level + 1;
    if level > MAX_LEVEL {
        tracing::warn!(
            max_level = MAX_LEVEL,
            "quick_decomp recursion cap reached, dropping subtree"
        );
        out.truncated = true;
        return;
    }

    let n = polygon.len();
    for i in 0..n as isize {
        if !is_reflex(polygon, i) {
            continue;
        }
        out.reflex.push(at(polygon, i));

        let mut lower_dist = f64::MAX;
        let mut upper_dist = f64::MAX;
        let mut lower_int = DVec2::ZERO;
        let mut upper_int = DVec2::ZERO;
        let mut lower_index = 0usize;
        let mut upper_index = 0usize;

        for j in 0..n as isize {
            // ray through edge (i-1, i) against edge (j-1, j)
            if left(at(polygon, i - 1), at(polygon, i), at(polygon, j))
                && right_on(at(polygon, i - 1), at(polygon, i), at(polygon, j - 1))
            {
                let p = line_intersection(
                    at(polygon, i - 1),
                    at(polygon, i),
                    at(polygon, j),
                    at(polygon, j - 1),
                );
                if right(at(polygon, i + 1), at(polygon, i), p) {
                    let d = at(polygon, i).distance_squared(p);
                    if d < lower_dist {
                        lower_dist = d;
                        lower_int = p;
                        lower_index = j as usize;
                    }
                }
            }
            // ray through edge (i+1, i) against edge (j, j+1)
            if left(at(polygon, i + 1), at(polygon, i), at(polygon, j + 1))
                && right_on(at(polygon, i + 1), at(polygon, i), at(polygon, j))
            {
                let p = line_intersection(
                    at(polygon, i + 1),
                    at(polygon, i),
                    at(polygon, j),
                    at(polygon, j + 1),
                );
                if left(at(polygon, i - 1), at(polygon, i), p) {
                    let d = at(polygon, i).distance_squared(p);
                    if d < upper_dist {
                        upper_dist = d;
                        upper_int = p;
                        upper_index = j as usize;
                    }
                }
            }
        }

        let i = i as usize;
        let mut lower_poly = Vec::new();
        let mut upper_poly = Vec::new();

        if lower_index == (upper_index + 1) % n {
            // the wedge spans a single edge: split at its midpoint
            let p = (lower_int + upper_int) / 2.0;
            out.steiner.push(p);

            if i < upper_index {
                lower_poly.extend_from_slice(&polygon[i..=upper_index]);
                lower_poly.push(p);
                upper_poly.push(p);
                if lower_index != 0 {
                    upper_poly.extend_from_slice(&polygon[lower_index..]);
                }
                upper_poly.extend_from_slice(&polygon[..=i]);
            } else {
                if i != 0 {
                    lower_poly.extend_from_slice(&polygon[i..]);
                }
                lower_poly.extend_from_slice(&polygon[..=upper_index]);
                lower_poly.push(p);
                upper_poly.push(p);
                // empty when the wedge leaves no vertices between
                for k in lower_index..=i {
                    if k < polygon.len() {
                        upper_poly.push(polygon[k]);
                    }
                }
            }
        } else {
            // connect to the closest visible vertex inside the wedge
            if lower_index > upper_index {
                upper_index += n;
            }
            if upper_index < lower_index {
                return;
            }
            let mut closest_dist = f64::MAX;
            let mut closest_index = 0usize;
            for j in lower_index..=upper_index {
                let jm = j as isize;
                if left_on(at(polygon, i as isize - 1), at(polygon, i as isize), at(polygon, jm))
                    && right_on(
                        at(polygon, i as isize + 1),
                        at(polygon, i as isize),
                        at(polygon, jm),
                    )
                {
                    let d = at(polygon, i as isize).distance_squared(at(polygon, jm));
                    if d < closest_dist && can_see_simple(polygon, i, j % n) {
                        closest_dist = d;
                        closest_index = j % n;
                    }
                }
            }

            if i < closest_index {
                lower_poly.extend_from_slice(&polygon[i..=closest_index]);
                if closest_index != 0 {
                    upper_poly.extend_from_slice(&polygon[closest_index..]);
                }
                upper_poly.extend_from_slice(&polygon[..=i]);
            } else {
                if i != 0 {
                    lower_poly.extend_from_slice(&polygon[i..]);
                }
                lower_poly.extend_from_slice(&polygon[..=closest_index]);
                upper_poly.extend_from_slice(&polygon[closest_index..=i]);
            }
        }

        // smaller half first keeps the recursion shallow
        if lower_poly.len() < upper_poly.len() {
            quick_decomp_level(&lower_poly, out, level);
            quick_decomp_level(&upper_poly, out, level);
        } else {
            quick_decomp_level(&upper_poly, out, level);
            quick_decomp_level(&lower_poly, out, level);
        }
        return;
    }

    // no reflex vertex: the ring is convex
    out.polygons.push(polygon.to_vec());
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn polygon_area(polygon: &[DVec2]) -> f64 {
        let mut area = 0.0;
        let mut j = polygon.len() - 1;
        for i in 0..polygon.len() {
            area += (polygon[j].x - polygon[i].x) * (polygon[j].y + polygon[i].y);
            j = i;
        }
        (area / 2.0).abs()
    }

    fn is_convex_ccw(polygon: &[DVec2]) -> bool {
        let n = polygon.len() as isize;
        (0..n).all(|i| !is_reflex(polygon, i))
    }

    /// The notch polygon used throughout: a unit-height rectangle with a
    /// wedge cut into its top edge.
    fn notched() -> Vec<DVec2> {
        vec![
            DVec2::new(-1.0, 1.0),
            DVec2::new(-1.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(1.0, 1.0),
            DVec2::new(0.5, 0.5),
        ]
    }

    #[test]
    fn test_make_ccw() {
        let mut polygon = notched();
        let reversed = make_ccw(&mut polygon);
        // run twice: the second call must be a no-op
        let mut again = polygon.clone();
        assert!(!make_ccw(&mut again));
        assert_eq!(again, polygon);
        let _ = reversed;
    }

    #[test]
    fn test_is_simple() {
        let mut polygon = notched();
        make_ccw(&mut polygon);
        assert!(is_simple(&polygon));

        let bowtie = [
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 1.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(0.0, 1.0),
        ];
        assert!(!is_simple(&bowtie));
    }

    #[test]
    fn test_quick_decomp_notch() {
        let mut polygon = notched();
        make_ccw(&mut polygon);
        let input_area = polygon_area(&polygon);

        let result = quick_decomp(&polygon);
        assert_eq!(result.polygons.len(), 2, "the notch splits into 2 pieces");
        assert!(!result.truncated);

        let total: f64 = result.polygons.iter().map(|p| polygon_area(p)).sum();
        assert!(
            (total - input_area).abs() < 1e-9,
            "area must be conserved: {total} vs {input_area}"
        );
        for piece in &result.polygons {
            assert!(is_convex_ccw(piece), "piece is convex: {piece:?}");
        }
    }

    #[test]
    fn test_quick_decomp_convex_passthrough() {
        let mut square = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(1.0, 1.0),
            DVec2::new(0.0, 1.0),
        ];
        make_ccw(&mut square);
        let result = quick_decomp(&square);
        assert_eq!(result.polygons.len(), 1);
        assert!(result.reflex.is_empty());
        assert!(result.steiner.is_empty());
    }

    #[test]
    fn test_quick_decomp_star() {
        // 8-point star: alternating outer/inner radius, many reflex vertices
        let mut star = Vec::new();
        for i in 0..16 {
            let angle = std::f64::consts::TAU * i as f64 / 16.0;
            let r = if i % 2 == 0 { 10.0 } else { 4.0 };
            star.push(DVec2::new(r * angle.cos(), r * angle.sin()));
        }
        make_ccw(&mut star);
        let input_area = polygon_area(&star);

        let result = quick_decomp(&star);
        assert!(result.polygons.len() >= 8);
        let total: f64 = result.polygons.iter().map(|p| polygon_area(p)).sum();
        assert!((total - input_area).abs() < 1e-6);
        for piece in &result.polygons {
            assert!(is_convex_ccw(piece));
        }
    }

    #[test]
    fn test_decomp_exhaustive_matches_area() {
        let mut polygon = notched();
        make_ccw(&mut polygon);
        let pieces = decomp(&polygon);
        assert_eq!(pieces.len(), 2);
        let total: f64 = pieces.iter().map(|p| polygon_area(p)).sum();
        assert!((total - polygon_area(&polygon)).abs() < 1e-9);
    }

    #[test]
    fn test_remove_collinear() {
        let mut polygon = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(0.5, 0.0), // collinear
            DVec2::new(1.0, 0.0),
            DVec2::new(1.0, 1.0),
            DVec2::new(0.0, 1.0),
        ];
        let removed = remove_collinear(&mut polygon, 0.01);
        assert_eq!(removed, 1);
        assert_eq!(polygon.len(), 4);
    }

    #[test]
    fn test_remove_collinear_keeps_triangle() {
        let mut polygon = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(2.0, 0.0),
        ];
        remove_collinear(&mut polygon, 0.01);
        assert_eq!(polygon.len(), 3);
    }

    #[test]
    fn test_remove_duplicates() {
        let mut polygon = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(1.0, 1e-8),
            DVec2::new(0.0, 1.0),
        ];
        remove_duplicates(&mut polygon, 1e-4);
        assert_eq!(polygon.len(), 3);
    }
}
