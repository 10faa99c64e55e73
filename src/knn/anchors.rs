//! Anchor partitioning: splits a working set of point ids into pivot-centred
//! clusters, grown "middle-out" from a single anchor, and turns each cluster
//! into a bounding-ball leaf.

use log::trace;
use std::marker::PhantomData;

use super::ball_tree::Ball;
use super::DistanceKernel;
use crate::common_types::{Coordinate, PointAccessor};
use crate::error::ConstructionError;

/// A pivot plus the points currently closer to it than to any other pivot.
///
/// `members` holds `(id, squared distance to pivot)` sorted by distance,
/// farthest first. The pivot is a member at distance 0 and sorts after any
/// other member at the same distance, so `members[0]` is a non-pivot point
/// whenever the anchor has more than one member.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub pivot: usize,
    pub members: Vec<(usize, f64)>,
}

/// The bounding ball of one anchor, ready to be placed in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorLeaf<F> {
    pub ball: Ball<F>,
    pub pivot: usize,
    pub point_ids: Vec<usize>,
}

impl Anchor {
    fn sort_members(&mut self) {
        let pivot = self.pivot;
        self.members.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| (a.0 == pivot).cmp(&(b.0 == pivot)))
                .then_with(|| a.0.cmp(&b.0))
        });
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Squared distance of the farthest non-pivot member, if there is one.
    pub fn spare_distance(&self) -> Option<f64> {
        if self.members.len() > 1 {
            self.members.first().map(|&(_, d)| d)
        } else {
            None
        }
    }

    /// Converts the anchor into a leaf centred on its pivot whose radius
    /// reaches the farthest member.
    pub fn into_leaf<F, P>(self, points: &P) -> AnchorLeaf<F>
    where
        F: Coordinate,
        P: PointAccessor<F>,
    {
        let radius = self.members.first().map_or(0.0, |&(_, d)| d.max(0.0).sqrt());
        AnchorLeaf {
            ball: Ball { center: points.coordinates(self.pivot).to_vec(), radius },
            pivot: self.pivot,
            point_ids: self.members.into_iter().map(|(id, _)| id).collect(),
        }
    }
}

/// A partition of a working set into anchors.
pub struct AnchorSet<'a, F, P, K> {
    points: &'a P,
    kernel: &'a K,
    anchors: Vec<Anchor>,
    prune: bool,
    _coordinate: PhantomData<F>,
}

impl<'a, F, P, K> AnchorSet<'a, F, P, K>
where
    F: Coordinate,
    P: PointAccessor<F>,
    K: DistanceKernel<F>,
{
    /// Starts with a single anchor around `pivot` holding every id in `ids`.
    ///
    /// `pivot` must be one of `ids`. With `prune` set, anchor growth skips the
    /// tail of an anchor once the triangle inequality rules out any further
    /// reassignment; only pass `true` for metric kernels.
    pub fn new(points: &'a P, kernel: &'a K, ids: &[usize], pivot: usize, prune: bool) -> Self {
        let pivot_coords = points.coordinates(pivot);
        let members = ids
            .iter()
            .map(|&id| {
                let d = if id == pivot {
                    0.0
                } else {
                    kernel.squared_distance(pivot_coords, points.coordinates(id))
                };
                (id, d)
            })
            .collect();
        let mut anchor = Anchor { pivot, members };
        anchor.sort_members();

        AnchorSet { points, kernel, anchors: vec![anchor], prune, _coordinate: PhantomData }
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn into_anchors(self) -> Vec<Anchor> {
        self.anchors
    }

    /// Index of the anchor whose farthest spare member is farthest away.
    fn richest_anchor(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, anchor) in self.anchors.iter().enumerate() {
            if let Some(d) = anchor.spare_distance() {
                match best {
                    Some((_, best_d)) if d <= best_d => {}
                    _ => best = Some((idx, d)),
                }
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Adds `count` anchors, each pivoting on the point currently worst
    /// served by its own pivot.
    pub fn create_anchors(&mut self, count: usize) -> Result<(), ConstructionError> {
        let target = self.anchors.len() + count;
        for _ in 0..count {
            let source = self.richest_anchor().ok_or(ConstructionError::AnchorExhausted {
                requested: self.anchors.len() + 1,
                target,
            })?;
            let (new_pivot, _) = self.anchors[source].members.remove(0);
            let new_coords = self.points.coordinates(new_pivot);
            let mut new_anchor = Anchor { pivot: new_pivot, members: vec![(new_pivot, 0.0)] };

            for anchor in self.anchors.iter_mut() {
                let between = self
                    .kernel
                    .squared_distance(self.points.coordinates(anchor.pivot), new_coords);

                // Removing entries keeps the remaining ones sorted.
                let mut members = std::mem::take(&mut anchor.members).into_iter();
                let mut retained = Vec::with_capacity(members.len());
                for (id, d_old) in members.by_ref() {
                    // d(x, new) >= d(old, new) - d(x, old) > d(x, old) for this and every closer member
                    if self.prune && 4.0 * d_old < between {
                        retained.push((id, d_old));
                        break;
                    }
                    let d_new = self.kernel.squared_distance(self.points.coordinates(id), new_coords);
                    if d_new < d_old {
                        new_anchor.members.push((id, d_new));
                    } else {
                        retained.push((id, d_old));
                    }
                }
                retained.extend(members);
                anchor.members = retained;
            }

            new_anchor.sort_members();
            trace!(
                "anchor {} pivots on point {} with {} members",
                self.anchors.len(),
                new_pivot,
                new_anchor.len()
            );
            self.anchors.push(new_anchor);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_types::PointSet;
    use crate::knn::KnnDistance;

    const EPSILON: f64 = 1e-9;

    fn line_points() -> PointSet<f64> {
        // ids 0..=5 at x = 0, 1, 2, 10, 11, 12
        PointSet::from_rows(&[[0.0], [1.0], [2.0], [10.0], [11.0], [12.0]]).unwrap()
    }

    fn check_partition(anchors: &[Anchor], expected_len: usize) {
        let mut ids: Vec<usize> = anchors.iter().flat_map(|a| a.members.iter().map(|m| m.0)).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..expected_len).collect::<Vec<_>>());
    }

    #[test]
    fn test_initial_anchor_sorted_descending() {
        let points = line_points();
        let ids: Vec<usize> = (0..6).collect();
        let set = AnchorSet::new(&points, &KnnDistance::Euclidean, &ids, 0, true);

        let anchor = &set.anchors()[0];
        assert_eq!(anchor.pivot, 0);
        assert_eq!(anchor.members[0], (5, 144.0));
        assert_eq!(anchor.members.last(), Some(&(0, 0.0)));
        assert!(anchor.members.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_second_anchor_takes_far_cluster() {
        let points = line_points();
        let ids: Vec<usize> = (0..6).collect();
        let mut set = AnchorSet::new(&points, &KnnDistance::Euclidean, &ids, 0, true);
        set.create_anchors(1).unwrap();

        let anchors = set.anchors();
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[1].pivot, 5);

        let mut near: Vec<usize> = anchors[0].members.iter().map(|m| m.0).collect();
        let mut far: Vec<usize> = anchors[1].members.iter().map(|m| m.0).collect();
        near.sort_unstable();
        far.sort_unstable();
        assert_eq!(near, vec![0, 1, 2]);
        assert_eq!(far, vec![3, 4, 5]);
        // member distances now refer to the new pivot
        assert_eq!(anchors[1].members[0], (3, 4.0));
        check_partition(anchors, 6);
    }

    #[test]
    fn test_pruning_does_not_change_partition() {
        let rows: Vec<[f64; 2]> = (0..40)
            .map(|i| {
                let t = i as f64;
                [(t * 0.37).sin() * 10.0 + t * 0.1, (t * 1.3).cos() * 5.0]
            })
            .collect();
        let points = PointSet::from_rows(&rows).unwrap();
        let ids: Vec<usize> = (0..40).collect();

        let mut pruned = AnchorSet::new(&points, &KnnDistance::Euclidean, &ids, 0, true);
        let mut exhaustive = AnchorSet::new(&points, &KnnDistance::Euclidean, &ids, 0, false);
        pruned.create_anchors(6).unwrap();
        exhaustive.create_anchors(6).unwrap();

        assert_eq!(pruned.anchors(), exhaustive.anchors());
        check_partition(pruned.anchors(), 40);
    }

    #[test]
    fn test_every_member_closest_to_its_pivot() {
        let points = line_points();
        let ids: Vec<usize> = (0..6).collect();
        let mut set = AnchorSet::new(&points, &KnnDistance::Euclidean, &ids, 2, true);
        set.create_anchors(3).unwrap();

        let anchors = set.anchors();
        for anchor in anchors {
            for &(id, d) in &anchor.members {
                let own = KnnDistance::Euclidean.squared_distance(points.coordinates(id), points.coordinates(anchor.pivot));
                assert!((own - d).abs() < EPSILON);
                for other in anchors {
                    let alt = KnnDistance::Euclidean.squared_distance(points.coordinates(id), points.coordinates(other.pivot));
                    assert!(own <= alt + EPSILON, "point {} is closer to pivot {}", id, other.pivot);
                }
            }
        }
    }

    #[test]
    fn test_exhausted_anchors_fail() {
        let points = line_points();
        let ids = vec![0, 1];
        let mut set = AnchorSet::new(&points, &KnnDistance::Euclidean, &ids, 0, true);
        set.create_anchors(1).unwrap();
        assert_eq!(
            set.create_anchors(1),
            Err(ConstructionError::AnchorExhausted { requested: 3, target: 3 })
        );
    }

    #[test]
    fn test_duplicate_points_never_move_pivot() {
        let points = PointSet::from_rows(&[[1.0, 1.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]).unwrap();
        let ids: Vec<usize> = (0..4).collect();
        let mut set = AnchorSet::new(&points, &KnnDistance::Euclidean, &ids, 0, true);
        set.create_anchors(2).unwrap();

        let anchors = set.anchors();
        assert_eq!(anchors.len(), 3);
        assert!(anchors.iter().all(|a| a.members.iter().any(|m| m.0 == a.pivot)));
        check_partition(anchors, 4);
    }

    #[test]
    fn test_into_leaf() {
        let points = line_points();
        let ids = vec![3, 4, 5];
        let set = AnchorSet::new(&points, &KnnDistance::Euclidean, &ids, 4, true);
        let leaf = set.into_anchors().remove(0).into_leaf(&points);

        assert_eq!(leaf.pivot, 4);
        assert_eq!(leaf.ball.center, vec![11.0]);
        assert!((leaf.ball.radius - 1.0).abs() < EPSILON);
        assert_eq!(leaf.point_ids, vec![3, 5, 4]);

        let lone = Anchor { pivot: 1, members: vec![(1, 0.0)] }.into_leaf(&points);
        assert_eq!(lone.ball.radius, 0.0);
        assert_eq!(lone.point_ids, vec![1]);
    }
}
