//! Exact k-nearest-neighbour search over a ball tree built "middle-out".
//!
//! Points are grouped around pivots (anchors), each anchor becomes a leaf
//! ball, and the leaves are merged bottom-up into a binary tree of enclosing
//! balls. Leaves that are still too large are rebuilt the same way one level
//! down. Queries walk the tree nearest-child-first and skip any ball that
//! cannot beat the current k-th best distance.
//!
//! ```
//! use anchor_ball_tree::{BallTree, KnnDistance, Neighbor, PointSet};
//!
//! let points = PointSet::from_rows(&[[0.0, 0.0], [1.0, 0.0], [10.0, 10.0], [10.0, 11.0]]).unwrap();
//! let tree = BallTree::from_points(points, KnnDistance::Euclidean, 1).unwrap();
//! let nearest = tree.query(&[0.0, 1.0], 2).unwrap();
//! assert_eq!(nearest, vec![Neighbor::new(1.0, 0), Neighbor::new(2.0, 1)]);
//! ```

pub mod common_types;
pub mod config;
pub mod error;
pub mod knn;

#[cfg(feature = "python")]
mod python;

pub use common_types::{Coordinate, Neighbor, PointAccessor, PointSet};
pub use config::{AnchorPruning, BallTreeConfig, MaxDepth, PivotRule};
pub use error::{ConstructionError, QueryError};
pub use knn::ball_tree::{Ball, BallNodeContents, BallTree, BallTreeNode, NodeId, SearchOptions, SearchStats, TreeStats};
pub use knn::{DistanceKernel, KnnDistance};
