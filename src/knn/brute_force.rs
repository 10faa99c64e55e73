//! Linear-scan reference search. Returns exactly what `BallTree::query` and
//! `BallTree::query_radius` return for the same ids, ties included.

use super::DistanceKernel;
use crate::common_types::{Coordinate, Neighbor, PointAccessor};

fn scan_all<F, P, K>(points: &P, ids: &[usize], kernel: &K, query: &[F]) -> Vec<Neighbor>
where
    F: Coordinate,
    P: PointAccessor<F>,
    K: DistanceKernel<F>,
{
    let mut distances: Vec<Neighbor> = ids
        .iter()
        .map(|&id| Neighbor::new(kernel.squared_distance(query, points.coordinates(id)), id))
        .collect();

    // Sort by distance (ascending), then id
    distances.sort_by(|a, b| {
        a.squared_distance
            .total_cmp(&b.squared_distance)
            .then_with(|| a.point.cmp(&b.point))
    });
    distances
}

/// The `k` nearest of `ids` to `query`, padded with `Neighbor::missing()`
/// up to `k` entries.
pub fn linear_scan<F, P, K>(points: &P, ids: &[usize], kernel: &K, query: &[F], k: usize) -> Vec<Neighbor>
where
    F: Coordinate,
    P: PointAccessor<F>,
    K: DistanceKernel<F>,
{
    let mut neighbors = scan_all(points, ids, kernel, query);
    neighbors.truncate(k);
    neighbors.resize(k, Neighbor::missing());
    neighbors
}

/// Every id within `max_squared_distance` of `query`, nearest first.
pub fn linear_scan_radius<F, P, K>(
    points: &P,
    ids: &[usize],
    kernel: &K,
    query: &[F],
    max_squared_distance: f64,
) -> Vec<Neighbor>
where
    F: Coordinate,
    P: PointAccessor<F>,
    K: DistanceKernel<F>,
{
    let mut neighbors = scan_all(points, ids, kernel, query);
    neighbors.retain(|n| n.squared_distance <= max_squared_distance);
    neighbors
}
