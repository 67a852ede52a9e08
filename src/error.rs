//! Physics Error Types
//!
//! Unified error type for the engine. Construction-time validation
//! (degenerate geometry, unparseable paths, failed decomposition) returns
//! `Result<T, PhysicsError>`. Nothing inside the step loop returns an error:
//! solver-level degeneracies are handled by clamping.

use thiserror::Error;

/// Unified error type for physics operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PhysicsError {
    /// The supplied geometry cannot form a polygon (fewer than 3 vertices,
    /// zero area, or non-finite coordinates).
    #[error("invalid geometry: {reason}")]
    InvalidGeometry {
        /// Human-readable description of the problem
        reason: &'static str,
    },

    /// A polygon handed to the decomposer self-intersects.
    #[error("polygon is not simple (self-intersecting)")]
    NonSimplePolygon,

    /// Convex decomposition produced no usable convex pieces.
    #[error("convex decomposition failed: {reason}")]
    DecompositionFailed {
        /// Human-readable description of the problem
        reason: &'static str,
    },

    /// A vertex path string could not be parsed.
    #[error("unparseable vertex path at token {token}")]
    InvalidPath {
        /// Index of the offending token
        token: usize,
    },
}

// ============================================================================
// Tests
// ============================================================================
