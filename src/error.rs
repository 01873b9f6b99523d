//! Error taxonomy for the engine (spec §7). Degenerate-geometry and
//! subdivision-refusal cases are recovered locally and never surface here;
//! only programming errors and invariant violations do.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum BhError {
    /// `Vector2::normalize()` was called on a zero-length vector.
    #[error("cannot normalize a zero-length vector")]
    DegenerateVector,

    /// A `ParticleStore` accessor was given an index outside `0..len`.
    #[error("particle index {index} out of range (len {len})")]
    InvalidIndex { index: usize, len: usize },

    /// A particle's mass was not strictly positive where one is required.
    #[error("particle {index} has non-positive mass {mass}")]
    NonPositiveMass { index: usize, mass: f64 },

    /// Insertion placed a particle outside the quadtree's root bounds.
    #[error("particle {index} lies outside the quadtree root bounds")]
    OutOfBounds { index: usize },

    /// Raised only by callers that explicitly ask whether a step would be
    /// a no-op; the engine itself treats an empty population as a silent
    /// no-op rather than an error (spec §7).
    #[error("particle store has no live particles")]
    EmptyPopulation,
}
