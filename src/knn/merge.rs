//! Agglomerative merging of anchor leaves into one binary subtree.
//!
//! Every step joins the two nodes whose enclosing ball is smallest. When
//! several pairs tie, the first pair met while scanning `(i, j)` with `i < j`
//! over the working list wins; the merged node goes to the end of the list.

use super::anchors::AnchorLeaf;
use super::ball_tree::Ball;
use super::DistanceKernel;
use crate::common_types::Coordinate;

/// A node of the merge topology. `left`/`right` index into `MergeTree::nodes`.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeNode<F> {
    Leaf(AnchorLeaf<F>),
    Internal { ball: Ball<F>, left: usize, right: usize },
}

impl<F> MergeNode<F> {
    pub fn ball(&self) -> &Ball<F> {
        match self {
            MergeNode::Leaf(leaf) => &leaf.ball,
            MergeNode::Internal { ball, .. } => ball,
        }
    }
}

/// Result of merging: children always precede their parent in `nodes`.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeTree<F> {
    pub nodes: Vec<MergeNode<F>>,
    pub root: usize,
}

/// Radius of the smallest ball enclosing both balls whose centres are
/// `center_distance` apart.
fn enclosing_radius(r1: f64, r2: f64, center_distance: f64) -> f64 {
    if center_distance + r2 <= r1 {
        r1
    } else if center_distance + r1 <= r2 {
        r2
    } else {
        (center_distance + r1 + r2) / 2.0
    }
}

/// Smallest ball enclosing `a` and `b`.
///
/// If one ball already contains the other it is reused; otherwise the new
/// centre lies on the segment between the two centres.
pub fn enclosing_ball<F, K>(a: &Ball<F>, b: &Ball<F>, kernel: &K) -> Ball<F>
where
    F: Coordinate,
    K: DistanceKernel<F>,
{
    let d = kernel.squared_distance(&a.center, &b.center).max(0.0).sqrt();
    if d + b.radius <= a.radius {
        return a.clone();
    }
    if d + a.radius <= b.radius {
        return b.clone();
    }

    let radius = (d + a.radius + b.radius) / 2.0;
    // d > 0 here, otherwise one ball would contain the other
    let t = F::from((radius - a.radius) / d).unwrap_or_else(F::zero);
    let center: Vec<F> = a
        .center
        .iter()
        .zip(b.center.iter())
        .map(|(&c1, &c2)| c1 + (c2 - c1) * t)
        .collect();

    // the rounded centre can drift off the ideal point; measure from where it landed
    let reach_a = kernel.squared_distance(&center, &a.center).max(0.0).sqrt() + a.radius;
    let reach_b = kernel.squared_distance(&center, &b.center).max(0.0).sqrt() + b.radius;
    Ball { center, radius: radius.max(reach_a).max(reach_b) }
}

/// Merges `leaves` into a single subtree. Returns `None` for an empty list.
pub fn merge_leaves<F, K>(leaves: Vec<AnchorLeaf<F>>, kernel: &K) -> Option<MergeTree<F>>
where
    F: Coordinate,
    K: DistanceKernel<F>,
{
    let mut nodes: Vec<MergeNode<F>> = leaves.into_iter().map(MergeNode::Leaf).collect();
    let mut active: Vec<usize> = (0..nodes.len()).collect();

    while active.len() > 1 {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..active.len() {
            let a = nodes[active[i]].ball();
            for j in (i + 1)..active.len() {
                let b = nodes[active[j]].ball();
                let d = kernel.squared_distance(&a.center, &b.center).max(0.0).sqrt();
                let radius = enclosing_radius(a.radius, b.radius, d);
                match best {
                    Some((_, _, best_radius)) if radius >= best_radius => {}
                    _ => best = Some((i, j, radius)),
                }
            }
        }

        let Some((i, j, _)) = best else { break };
        let (left, right) = (active[i], active[j]);
        let ball = enclosing_ball(nodes[left].ball(), nodes[right].ball(), kernel);

        // j > i, so removing j first keeps i valid
        active.remove(j);
        active.remove(i);
        nodes.push(MergeNode::Internal { ball, left, right });
        active.push(nodes.len() - 1);
    }

    let root = *active.first()?;
    Some(MergeTree { nodes, root })
}
