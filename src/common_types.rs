//! This module contains the data types shared by the index and its callers:
//! the coordinate bound, point storage and the neighbour record a query returns.

use num_traits::{AsPrimitive, Float};
use std::fmt::Debug;
use std::iter::Sum;

use crate::error::ConstructionError;

/// Numeric type usable as a point coordinate (e.g. `f32`, `f64`).
///
/// Distances are always reported as `f64`, so coordinates must convert to it.
pub trait Coordinate: Float + AsPrimitive<f64> + Sum + Debug + Send + Sync {}

impl<F> Coordinate for F where F: Float + AsPrimitive<f64> + Sum + Debug + Send + Sync {}

/// Random access to point coordinates by integer id in `[0, count())`.
pub trait PointAccessor<F> {
    /// Coordinates of point `id`. Callers only pass ids below `count()`.
    fn coordinates(&self, id: usize) -> &[F];

    /// Number of points held.
    fn count(&self) -> usize;

    /// Dimensionality shared by every point.
    fn dimension(&self) -> usize;
}

/// Dense row-major point storage.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet<F> {
    dimension: usize,
    data: Vec<F>,
}

impl<F: Copy> PointSet<F> {
    /// Wraps a flat buffer of `data.len() / dimension` points.
    pub fn new(dimension: usize, data: Vec<F>) -> Result<Self, ConstructionError> {
        if dimension == 0 {
            return Err(ConstructionError::ZeroDimension);
        }
        if data.len() % dimension != 0 {
            return Err(ConstructionError::InconsistentDimension {
                id: data.len() / dimension,
                expected: dimension,
                got: data.len() % dimension,
            });
        }
        Ok(PointSet { dimension, data })
    }

    /// Copies a list of rows into flat storage; every row must have the same length.
    pub fn from_rows<R: AsRef<[F]>>(rows: &[R]) -> Result<Self, ConstructionError> {
        let dimension = match rows.first() {
            Some(row) => row.as_ref().len(),
            None => return Err(ConstructionError::EmptyInput),
        };
        if dimension == 0 {
            return Err(ConstructionError::ZeroDimension);
        }

        let mut data = Vec::with_capacity(rows.len() * dimension);
        for (id, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != dimension {
                return Err(ConstructionError::InconsistentDimension {
                    id,
                    expected: dimension,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(PointSet { dimension, data })
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<F> PointAccessor<F> for PointSet<F> {
    fn coordinates(&self, id: usize) -> &[F] {
        let start = id * self.dimension;
        &self.data[start..start + self.dimension]
    }

    fn count(&self) -> usize {
        self.data.len() / self.dimension
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// Rows are taken as-is; the builder checks every indexed row against the first.
impl<F> PointAccessor<F> for Vec<Vec<F>> {
    fn coordinates(&self, id: usize) -> &[F] {
        &self[id]
    }

    fn count(&self) -> usize {
        self.len()
    }

    fn dimension(&self) -> usize {
        self.first().map_or(0, |row| row.len())
    }
}

/// One entry of a k-NN result.
///
/// `point` is `None` for the padding entries returned when the tree holds
/// fewer than `k` points; their squared distance is `+inf`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Neighbor {
    /// Squared distance to the query under the tree's kernel.
    pub squared_distance: f64,
    pub point: Option<usize>,
}

impl Neighbor {
    pub fn new(squared_distance: f64, point: usize) -> Self {
        Neighbor { squared_distance, point: Some(point) }
    }

    /// The "missing" sentinel used to pad short results.
    pub fn missing() -> Self {
        Neighbor { squared_distance: f64::INFINITY, point: None }
    }

    pub fn is_missing(&self) -> bool {
        self.point.is_none()
    }

    /// Unsquared distance.
    pub fn distance(&self) -> f64 {
        self.squared_distance.sqrt()
    }
}
