#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a hypervolume indicator is requested but no reference
    /// point was given at construction.
    #[error("a reference point is needed to compute hypervolume indicators (must be given initially)")]
    MissingReferencePoint,

    /// Returned when an objective or constraint vector has the wrong length.
    #[error("vector has wrong length: expected {expected}, got {got}")]
    Arity {
        /// The number of coordinates the archive expects.
        expected: usize,
        /// The number of coordinates that were provided.
        got: usize,
    },

    /// Returned when an integer index exceeds the archive length.
    #[error("index {index} out of range for archive of length {len}")]
    OutOfRange {
        /// The offending index.
        index: usize,
        /// The archive length at the time of the call.
        len: usize,
    },

    /// Returned when an ideal point is not strictly smaller than the
    /// reference point in every objective, or is set without one.
    #[error("invalid ideal point: {reason}")]
    InvalidIdealPoint {
        /// The reason the ideal point was rejected.
        reason: &'static str,
    },

    /// Returned when the requested number of objectives is not 2, 3 or 4.
    #[error("unsupported number of objectives: {0} (supported: 2, 3, 4)")]
    UnsupportedDimension(usize),

    /// Returned when an internal invariant is violated. Always a bug.
    #[error("internal invariant violation: {0}")]
    Inconsistent(&'static str),
}

pub type Result<T> = core::result::Result<T, Error>;
