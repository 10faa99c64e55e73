//! Error types returned by tree construction and queries.

use thiserror::Error;

/// Reasons `BallTree::build` can refuse to produce a tree.
///
/// Construction is all-or-nothing: when any of these is returned no partial
/// tree exists.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// No point ids were supplied.
    #[error("cannot build a ball tree over an empty point set")]
    EmptyInput,
    /// `min_leaf_size` must be at least one.
    #[error("min_leaf_size must be at least 1 (got {got})")]
    InvalidMinLeafSize { got: usize },
    /// `MaxDepth::Levels(0)` leaves no room for even a single leaf.
    #[error("max_depth must allow at least one level")]
    InvalidMaxDepth,
    /// Points without coordinates cannot be bounded.
    #[error("points must have at least one dimension")]
    ZeroDimension,
    /// A point's coordinate count differs from the first point's.
    #[error("point {id} has {got} coordinates, expected {expected}")]
    InconsistentDimension { id: usize, expected: usize, got: usize },
    /// An id referenced a point the accessor does not hold.
    #[error("point id {id} is out of range for an accessor holding {count} points")]
    PointOutOfRange { id: usize, count: usize },
    /// The same id was listed more than once.
    #[error("point id {id} appears more than once in the input set")]
    DuplicatePoint { id: usize },
    /// Anchor growth asked for a new pivot but every anchor is down to its own pivot.
    #[error("cannot grow anchor {requested} of {target}: no anchor has a spare member")]
    AnchorExhausted { requested: usize, target: usize },
}

/// Reasons a single query is rejected. The tree stays valid afterwards.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("k must be greater than 0")]
    ZeroNeighbors,
    #[error("query point has {got} dimensions but the tree holds {expected}-dimensional points")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("search radius must be a non-negative number (got {radius})")]
    InvalidRadius { radius: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = ConstructionError::PointOutOfRange { id: 7, count: 3 };
        assert_eq!(err.to_string(), "point id 7 is out of range for an accessor holding 3 points");

        let err = QueryError::DimensionMismatch { expected: 2, got: 3 };
        assert!(err.to_string().contains("3 dimensions"));
        assert!(err.to_string().contains("2-dimensional"));
    }
}
