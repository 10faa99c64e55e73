//! This module contains the Ball Tree: an arena of bounding balls built
//! middle-out from anchors, answering exact k-NN and radius queries.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::anchors::{AnchorLeaf, AnchorSet};
use super::heap_utils::KBestNeighbors; // Import shared heap utilities
use super::merge::{enclosing_ball, merge_leaves, MergeNode, MergeTree};
use super::DistanceKernel;
use crate::common_types::{Coordinate, Neighbor, PointAccessor};
use crate::config::{BallTreeConfig, MaxDepth, PivotRule};
use crate::error::{ConstructionError, QueryError};

/// Handle of a node inside `BallTree::nodes`.
pub type NodeId = usize;

/// Relative slack on radii and bounds when pruning, so points sitting on a
/// ball's boundary survive rounding in radii and merged centres.
const PRUNE_SLACK: f64 = 1e-9;

/// Lower bound on the squared distance from a query to anything inside a ball
/// whose centre is `d2_center` away.
fn min_squared_distance(d2_center: f64, radius: f64) -> f64 {
    let d_min = (d2_center.max(0.0).sqrt() - radius * (1.0 + PRUNE_SLACK)).max(0.0);
    d_min * d_min
}

fn beyond(min_d2: f64, bound: f64) -> bool {
    min_d2 > bound * (1.0 + PRUNE_SLACK)
}

/// A bounding sphere: every point below the node lies within `radius` of `center`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ball<F> {
    pub center: Vec<F>,
    pub radius: f64,
}

impl<F: Coordinate> Ball<F> {
    /// Whether `point` lies inside the ball, allowing `slack` for rounding.
    pub fn covers<K: DistanceKernel<F>>(&self, point: &[F], kernel: &K, slack: f64) -> bool {
        kernel.squared_distance(&self.center, point).max(0.0).sqrt() <= self.radius + slack
    }

    /// Whether `other` lies entirely inside this ball, allowing `slack`.
    pub fn encloses<K: DistanceKernel<F>>(&self, other: &Ball<F>, kernel: &K, slack: f64) -> bool {
        let d = kernel.squared_distance(&self.center, &other.center).max(0.0).sqrt();
        d + other.radius <= self.radius + slack
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BallNodeContents {
    Internal {
        left_child: NodeId,
        right_child: NodeId,
    },
    Leaf {
        /// The point the ball is centred on; always one of `point_ids`.
        pivot: usize,
        point_ids: Vec<usize>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BallTreeNode<F> {
    pub ball: Ball<F>,
    pub contents: BallNodeContents,
}

impl<F> BallTreeNode<F> {
    pub fn is_leaf(&self) -> bool {
        matches!(self.contents, BallNodeContents::Leaf { .. })
    }
}

/// Knobs for a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Skip subtrees whose ball cannot hold anything closer than the current
    /// k-th best. Turning it off visits every leaf and yields the same answer.
    pub prune: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions { prune: true }
    }
}

/// Work done by one query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes_visited: usize,
    pub nodes_pruned: usize,
    pub leaves_scanned: usize,
    pub distance_evaluations: usize,
}

/// Shape of a built tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub point_count: usize,
    pub node_count: usize,
    pub leaf_count: usize,
    /// Levels on the longest root-to-leaf path; a lone leaf has depth 1.
    pub depth: usize,
    pub largest_leaf: usize,
}

/// Represents the Ball Tree itself.
///
/// Nodes live in an arena and are written once, children before parents, so
/// the root is the last node. The tree owns its point accessor and kernel and
/// is read-only after `build`; queries keep their state on the stack.
#[derive(Debug, Clone)]
pub struct BallTree<F, P, K> {
    nodes: Vec<BallTreeNode<F>>,
    root: NodeId,
    points: P,
    kernel: K,
    dimension: usize,
    len: usize,
}

/// Mutable state of one k-NN query.
struct SearchContext<'q, F> {
    query: &'q [F],
    best: KBestNeighbors<usize>,
    d2_bound: f64,
    prune: bool,
    stats: SearchStats,
}

impl<F> SearchContext<'_, F> {
    fn offer(&mut self, d2: f64, id: usize) {
        // equal distances are still offered so ties resolve by id, not visit order
        if d2 <= self.d2_bound {
            self.best.add(d2, id);
            if let Some(worst) = self.best.current_farthest_distance() {
                self.d2_bound = worst;
            }
        }
    }
}

/// Construction-time state shared by every level of the recursion.
struct TreeBuilder<'a, F, P, K> {
    points: &'a P,
    kernel: &'a K,
    min_leaf_size: usize,
    prune_anchors: bool,
    rng: Option<StdRng>,
    nodes: Vec<BallTreeNode<F>>,
}

impl<'a, F, P, K> TreeBuilder<'a, F, P, K>
where
    F: Coordinate,
    P: PointAccessor<F>,
    K: DistanceKernel<F>,
{
    fn pick_pivot(&mut self, ids: &[usize]) -> usize {
        match self.rng.as_mut() {
            Some(rng) => ids[rng.gen_range(0..ids.len())],
            None => ids[0],
        }
    }

    fn push(&mut self, node: BallTreeNode<F>) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn push_leaf(&mut self, leaf: AnchorLeaf<F>) -> NodeId {
        self.push(BallTreeNode {
            ball: leaf.ball,
            contents: BallNodeContents::Leaf { pivot: leaf.pivot, point_ids: leaf.point_ids },
        })
    }

    /// Builds the subtree over `ids` and returns its root handle.
    fn build(&mut self, ids: &[usize], depth: MaxDepth) -> Result<NodeId, ConstructionError> {
        let pivot = self.pick_pivot(ids);
        let mut anchors = AnchorSet::new(self.points, self.kernel, ids, pivot, self.prune_anchors);

        // Base Case: one anchor over the whole set becomes a leaf
        if depth.is_last_level() || ids.len() <= self.min_leaf_size {
            let leaf = anchors
                .into_anchors()
                .into_iter()
                .next()
                .ok_or(ConstructionError::EmptyInput)?
                .into_leaf(self.points);
            return Ok(self.push_leaf(leaf));
        }

        let target = (1 + (ids.len() as f64).sqrt().floor() as usize).min(ids.len());
        anchors.create_anchors(target - 1)?;
        let leaves: Vec<AnchorLeaf<F>> = anchors
            .into_anchors()
            .into_iter()
            .map(|anchor| anchor.into_leaf(self.points))
            .collect();
        debug!("split {} points into {} anchors", ids.len(), leaves.len());

        let merged = merge_leaves(leaves, self.kernel).ok_or(ConstructionError::EmptyInput)?;
        self.link(merged, depth.descend())
    }

    /// Writes a merge topology into the arena.
    ///
    /// Merge nodes are visited in creation order, which puts children before
    /// parents. Oversized leaves are replaced by a freshly built subtree, and
    /// each internal ball is recomputed around its final children.
    fn link(&mut self, tree: MergeTree<F>, depth: MaxDepth) -> Result<NodeId, ConstructionError> {
        let mut handles: Vec<NodeId> = Vec::with_capacity(tree.nodes.len());
        for node in tree.nodes {
            let handle = match node {
                MergeNode::Leaf(leaf) if leaf.point_ids.len() > self.min_leaf_size && !depth.is_last_level() => {
                    // pivot first, so a rebuild with the default rule centres on the same point
                    let mut ids = Vec::with_capacity(leaf.point_ids.len());
                    ids.push(leaf.pivot);
                    ids.extend(leaf.point_ids.iter().copied().filter(|&id| id != leaf.pivot));
                    self.build(&ids, depth)?
                }
                MergeNode::Leaf(leaf) => self.push_leaf(leaf),
                MergeNode::Internal { left, right, .. } => {
                    let (left_child, right_child) = (handles[left], handles[right]);
                    let ball = enclosing_ball(&self.nodes[left_child].ball, &self.nodes[right_child].ball, self.kernel);
                    self.push(BallTreeNode {
                        ball,
                        contents: BallNodeContents::Internal { left_child, right_child },
                    })
                }
            };
            handles.push(handle);
        }
        Ok(handles[tree.root])
    }
}

impl<F, P, K> BallTree<F, P, K>
where
    F: Coordinate,
    P: PointAccessor<F>,
    K: DistanceKernel<F>,
{
    /// Indexes every point of `points`, using default settings apart from
    /// `min_leaf_size`.
    pub fn from_points(points: P, kernel: K, min_leaf_size: usize) -> Result<Self, ConstructionError> {
        let ids: Vec<usize> = (0..points.count()).collect();
        Self::build(points, kernel, &ids, &BallTreeConfig::new(min_leaf_size))
    }

    /// Builds a tree over the points named by `point_ids`.
    pub fn build(points: P, kernel: K, point_ids: &[usize], config: &BallTreeConfig) -> Result<Self, ConstructionError> {
        if config.min_leaf_size == 0 {
            return Err(ConstructionError::InvalidMinLeafSize { got: config.min_leaf_size });
        }
        if config.max_depth == MaxDepth::Levels(0) {
            return Err(ConstructionError::InvalidMaxDepth);
        }
        if point_ids.is_empty() {
            return Err(ConstructionError::EmptyInput);
        }
        let dimension = points.dimension();
        if dimension == 0 {
            return Err(ConstructionError::ZeroDimension);
        }

        let count = points.count();
        let mut seen = vec![false; count];
        for &id in point_ids {
            if id >= count {
                return Err(ConstructionError::PointOutOfRange { id, count });
            }
            if seen[id] {
                return Err(ConstructionError::DuplicatePoint { id });
            }
            seen[id] = true;
            let got = points.coordinates(id).len();
            if got != dimension {
                return Err(ConstructionError::InconsistentDimension { id, expected: dimension, got });
            }
        }

        if !kernel.is_metric() {
            warn!("distance kernel is not a metric; nearest-neighbour results may be inexact");
        }

        let mut builder = TreeBuilder {
            points: &points,
            kernel: &kernel,
            min_leaf_size: config.min_leaf_size,
            prune_anchors: config.anchor_pruning.enabled(kernel.is_metric()),
            rng: match config.pivot {
                PivotRule::First => None,
                PivotRule::Seeded(seed) => Some(StdRng::seed_from_u64(seed)),
            },
            nodes: Vec::new(),
        };
        let root = builder.build(point_ids, config.max_depth)?;
        let nodes = builder.nodes;

        debug!(
            "built ball tree over {} points: {} nodes, min_leaf_size {}",
            point_ids.len(),
            nodes.len(),
            config.min_leaf_size
        );
        Ok(BallTree { nodes, root, points, kernel, dimension, len: point_ids.len() })
    }

    fn check_query(&self, query: &[F]) -> Result<(), QueryError> {
        if query.len() != self.dimension {
            return Err(QueryError::DimensionMismatch { expected: self.dimension, got: query.len() });
        }
        Ok(())
    }

    /// Finds the `k` nearest indexed points to `query`, nearest first.
    ///
    /// The result always has `k` entries; when the tree holds fewer points the
    /// tail is padded with `Neighbor::missing()`. Among equally distant points
    /// the smaller ids win.
    pub fn query(&self, query: &[F], k: usize) -> Result<Vec<Neighbor>, QueryError> {
        self.query_with(query, k, &SearchOptions::default()).map(|(neighbors, _)| neighbors)
    }

    /// `query` with explicit options, also reporting how much of the tree was touched.
    pub fn query_with(
        &self,
        query: &[F],
        k: usize,
        options: &SearchOptions,
    ) -> Result<(Vec<Neighbor>, SearchStats), QueryError> {
        if k == 0 {
            return Err(QueryError::ZeroNeighbors);
        }
        self.check_query(query)?;

        let mut ctx = SearchContext {
            query,
            best: KBestNeighbors::new(k),
            d2_bound: f64::INFINITY,
            prune: options.prune,
            stats: SearchStats::default(),
        };
        let d2_root = self.kernel.squared_distance(query, &self.nodes[self.root].ball.center);
        ctx.stats.distance_evaluations += 1;
        self.search_nn_recursive(self.root, d2_root, &mut ctx);

        let stats = ctx.stats;
        let mut neighbors: Vec<Neighbor> = ctx
            .best
            .into_sorted_vec()
            .into_iter()
            .map(|(d2, id)| Neighbor::new(d2, id))
            .collect();
        neighbors.resize(k, Neighbor::missing());
        Ok((neighbors, stats))
    }

    fn search_nn_recursive(&self, node_id: NodeId, d2_center: f64, ctx: &mut SearchContext<'_, F>) {
        let node = &self.nodes[node_id];
        ctx.stats.nodes_visited += 1;

        if ctx.prune && beyond(min_squared_distance(d2_center, node.ball.radius), ctx.d2_bound) {
            ctx.stats.nodes_pruned += 1;
            return;
        }

        match &node.contents {
            BallNodeContents::Leaf { pivot, point_ids } => {
                ctx.stats.leaves_scanned += 1;
                for &id in point_ids {
                    let d2 = if id == *pivot {
                        d2_center
                    } else {
                        ctx.stats.distance_evaluations += 1;
                        self.kernel.squared_distance(ctx.query, self.points.coordinates(id))
                    };
                    ctx.offer(d2, id);
                }
            }
            BallNodeContents::Internal { left_child, right_child } => {
                let d2_left = self.kernel.squared_distance(ctx.query, &self.nodes[*left_child].ball.center);
                let d2_right = self.kernel.squared_distance(ctx.query, &self.nodes[*right_child].ball.center);
                ctx.stats.distance_evaluations += 2;

                // Search the child whose centre is closer first
                if d2_left <= d2_right {
                    self.search_nn_recursive(*left_child, d2_left, ctx);
                    self.search_nn_recursive(*right_child, d2_right, ctx);
                } else {
                    self.search_nn_recursive(*right_child, d2_right, ctx);
                    self.search_nn_recursive(*left_child, d2_left, ctx);
                }
            }
        }
    }

    /// Runs `query` for each row of `queries`.
    pub fn query_batch<Q: AsRef<[F]>>(&self, queries: &[Q], k: usize) -> Result<Vec<Vec<Neighbor>>, QueryError> {
        queries.iter().map(|q| self.query(q.as_ref(), k)).collect()
    }

    /// All indexed points whose squared distance to `query` is at most
    /// `max_squared_distance`, nearest first (ties by id).
    pub fn query_radius(&self, query: &[F], max_squared_distance: f64) -> Result<Vec<Neighbor>, QueryError> {
        if max_squared_distance.is_nan() || max_squared_distance < 0.0 {
            return Err(QueryError::InvalidRadius { radius: max_squared_distance });
        }
        self.check_query(query)?;

        let mut found = Vec::new();
        let d2_root = self.kernel.squared_distance(query, &self.nodes[self.root].ball.center);
        self.search_radius_recursive(self.root, d2_root, query, max_squared_distance, &mut found);
        found.sort_by(|a: &Neighbor, b: &Neighbor| {
            a.squared_distance
                .total_cmp(&b.squared_distance)
                .then_with(|| a.point.cmp(&b.point))
        });
        Ok(found)
    }

    fn search_radius_recursive(
        &self,
        node_id: NodeId,
        d2_center: f64,
        query: &[F],
        max_squared_distance: f64,
        found: &mut Vec<Neighbor>,
    ) {
        let node = &self.nodes[node_id];
        if beyond(min_squared_distance(d2_center, node.ball.radius), max_squared_distance) {
            return;
        }

        match &node.contents {
            BallNodeContents::Leaf { pivot, point_ids } => {
                for &id in point_ids {
                    let d2 = if id == *pivot {
                        d2_center
                    } else {
                        self.kernel.squared_distance(query, self.points.coordinates(id))
                    };
                    if d2 <= max_squared_distance {
                        found.push(Neighbor::new(d2, id));
                    }
                }
            }
            BallNodeContents::Internal { left_child, right_child } => {
                // No specific order needed, just recurse if not pruned
                for &child in [left_child, right_child] {
                    let d2 = self.kernel.squared_distance(query, &self.nodes[child].ball.center);
                    self.search_radius_recursive(child, d2, query, max_squared_distance, found);
                }
            }
        }
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            point_count: self.len,
            node_count: self.nodes.len(),
            leaf_count: 0,
            depth: 0,
            largest_leaf: 0,
        };
        let mut stack = vec![(self.root, 1)];
        while let Some((node_id, level)) = stack.pop() {
            stats.depth = stats.depth.max(level);
            match &self.nodes[node_id].contents {
                BallNodeContents::Leaf { point_ids, .. } => {
                    stats.leaf_count += 1;
                    stats.largest_leaf = stats.largest_leaf.max(point_ids.len());
                }
                BallNodeContents::Internal { left_child, right_child } => {
                    stack.push((*left_child, level + 1));
                    stack.push((*right_child, level + 1));
                }
            }
        }
        stats
    }
}

impl<F, P, K> BallTree<F, P, K> {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&BallTreeNode<F>> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[BallTreeNode<F>] {
        &self.nodes
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`: `build` refuses an empty id list.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn points(&self) -> &P {
        &self.points
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }
}
