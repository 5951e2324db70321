use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the simulation core.
///
/// Degenerate numeric cases inside the collision math (parallel
/// trajectories, zero relative velocity, already-touching pairs) are policy
/// branches, not errors; these variants cover the construction boundary and
/// genuine numerical pathology.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user or API parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Numerical or geometric issue (e.g., degenerate contact normal, NaN
    /// impact time).
    #[error("numerical error: {0}")]
    MathError(String),

    /// A particle cannot be contained by the arena bounds.
    #[error("out of bounds: {0}")]
    OutOfBounds(String),
}
