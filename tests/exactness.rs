use anchor_ball_tree::knn::brute_force::{linear_scan, linear_scan_radius};
use anchor_ball_tree::{
    AnchorPruning, BallNodeContents, BallTree, BallTreeConfig, DistanceKernel, KnnDistance, MaxDepth,
    PivotRule, PointAccessor, PointSet, QueryError, SearchOptions,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_cloud(seed: u64, count: usize, dimension: usize) -> PointSet<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f64> = (0..count * dimension).map(|_| rng.gen_range(-100.0..100.0)).collect();
    PointSet::new(dimension, data).unwrap()
}

/// Points snapped to a coarse grid, so many distances tie exactly.
fn grid_cloud(seed: u64, count: usize, dimension: usize) -> PointSet<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f64> = (0..count * dimension).map(|_| rng.gen_range(0..6) as f64).collect();
    PointSet::new(dimension, data).unwrap()
}

fn random_query(rng: &mut StdRng, dimension: usize) -> Vec<f64> {
    (0..dimension).map(|_| rng.gen_range(-120.0..120.0)).collect()
}

#[test]
fn test_matches_brute_force_for_every_k() {
    init_logging();
    let points = random_cloud(7, 60, 3);
    let ids: Vec<usize> = (0..60).collect();
    let tree = BallTree::from_points(points.clone(), KnnDistance::Euclidean, 4).unwrap();

    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..10 {
        let query = random_query(&mut rng, 3);
        for k in 1..=60 {
            let expected = linear_scan(&points, &ids, &KnnDistance::Euclidean, &query, k);
            assert_eq!(tree.query(&query, k).unwrap(), expected, "k = {}", k);
        }
    }
}

#[test]
fn test_matches_brute_force_across_kernels_and_leaf_sizes() {
    init_logging();
    let kernels = [
        KnnDistance::Euclidean,
        KnnDistance::Manhattan,
        KnnDistance::Chebyshev,
        KnnDistance::Minkowski { p: 3 },
    ];
    let mut rng = StdRng::seed_from_u64(2024);
    for (seed, kernel) in kernels.into_iter().enumerate() {
        let points = random_cloud(seed as u64, 300, 4);
        let ids: Vec<usize> = (0..300).collect();
        for min_leaf_size in [1, 5, 40] {
            let tree = BallTree::from_points(points.clone(), kernel, min_leaf_size).unwrap();
            for _ in 0..5 {
                let query = random_query(&mut rng, 4);
                let expected = linear_scan(&points, &ids, &kernel, &query, 10);
                assert_eq!(tree.query(&query, 10).unwrap(), expected, "{:?}, leaf size {}", kernel, min_leaf_size);
            }
        }
    }
}

#[test]
fn test_ties_resolve_like_brute_force() {
    init_logging();
    let points = grid_cloud(3, 200, 2);
    let ids: Vec<usize> = (0..200).collect();
    let tree = BallTree::from_points(points.clone(), KnnDistance::Euclidean, 3).unwrap();

    for x in 0..6 {
        for y in 0..6 {
            let query = [x as f64 + 0.5, y as f64];
            for k in [1, 4, 17] {
                let expected = linear_scan(&points, &ids, &KnnDistance::Euclidean, &query, k);
                assert_eq!(tree.query(&query, k).unwrap(), expected);
            }
        }
    }
}

#[test]
fn test_pruning_is_sound() {
    init_logging();
    let points = random_cloud(11, 500, 3);
    let tree = BallTree::from_points(points, KnnDistance::Euclidean, 8).unwrap();

    let mut rng = StdRng::seed_from_u64(5);
    let mut pruned_any = false;
    for _ in 0..20 {
        let query = random_query(&mut rng, 3);
        let (pruned, stats) = tree.query_with(&query, 5, &SearchOptions::default()).unwrap();
        let (full, full_stats) = tree.query_with(&query, 5, &SearchOptions { prune: false }).unwrap();
        assert_eq!(pruned, full);
        assert!(stats.leaves_scanned <= full_stats.leaves_scanned);
        pruned_any |= stats.nodes_pruned > 0;
    }
    assert!(pruned_any);
}

#[test]
fn test_radius_matches_brute_force() {
    init_logging();
    let points = random_cloud(21, 250, 2);
    let ids: Vec<usize> = (0..250).collect();
    let tree = BallTree::from_points(points.clone(), KnnDistance::Manhattan, 6).unwrap();

    let mut rng = StdRng::seed_from_u64(8);
    for radius in [0.0, 5.0, 30.0, 400.0] {
        let query = random_query(&mut rng, 2);
        let r2 = radius * radius;
        let expected = linear_scan_radius(&points, &ids, &KnnDistance::Manhattan, &query, r2);
        assert_eq!(tree.query_radius(&query, r2).unwrap(), expected);
    }
}

#[test]
fn test_build_is_deterministic() {
    init_logging();
    let points = random_cloud(31, 400, 5);
    let ids: Vec<usize> = (0..400).collect();
    for config in [
        BallTreeConfig::new(6),
        BallTreeConfig::new(6).with_pivot(PivotRule::Seeded(123)),
        BallTreeConfig::new(2).with_max_depth(MaxDepth::Levels(3)),
    ] {
        let first = BallTree::build(points.clone(), KnnDistance::Euclidean, &ids, &config).unwrap();
        let second = BallTree::build(points.clone(), KnnDistance::Euclidean, &ids, &config).unwrap();
        assert_eq!(first.nodes(), second.nodes());
        assert_eq!(first.root(), second.root());
    }
}

#[test]
fn test_tree_invariants_on_random_clouds() {
    init_logging();
    for (seed, min_leaf_size) in [(1, 1), (2, 3), (3, 10)] {
        let points = random_cloud(seed, 150, 3);
        let config = BallTreeConfig::new(min_leaf_size).with_pivot(PivotRule::Seeded(seed));
        let ids: Vec<usize> = (0..150).collect();
        let tree = BallTree::build(points, KnnDistance::Euclidean, &ids, &config).unwrap();

        let mut owner = vec![None; 150];
        for (node_id, node) in tree.nodes().iter().enumerate() {
            match &node.contents {
                BallNodeContents::Leaf { pivot, point_ids } => {
                    assert!(point_ids.len() <= min_leaf_size);
                    assert!(point_ids.contains(pivot));
                    for &id in point_ids {
                        assert!(owner[id].is_none(), "point {} in two leaves", id);
                        owner[id] = Some(node_id);
                        assert!(node.ball.covers(tree.points().coordinates(id), tree.kernel(), 1e-6));
                    }
                }
                BallNodeContents::Internal { left_child, right_child } => {
                    for child in [*left_child, *right_child] {
                        assert!(node.ball.encloses(&tree.nodes()[child].ball, tree.kernel(), 1e-6));
                    }
                }
            }
        }
        assert!(owner.iter().all(Option::is_some));
        assert_eq!(tree.root(), tree.nodes().len() - 1);
        assert_eq!(tree.stats().point_count, 150);
    }
}

#[test]
fn test_anchor_pruning_override_for_non_metric_kernel() {
    init_logging();
    let points = random_cloud(41, 120, 3);
    let ids: Vec<usize> = (0..120).collect();
    assert!(!DistanceKernel::<f64>::is_metric(&KnnDistance::Cosine));

    let auto = BallTree::build(points.clone(), KnnDistance::Cosine, &ids, &BallTreeConfig::new(4)).unwrap();
    let never = BallTree::build(
        points,
        KnnDistance::Cosine,
        &ids,
        &BallTreeConfig::new(4).with_anchor_pruning(AnchorPruning::Never),
    )
    .unwrap();
    // Auto disables the shortcut for non-metric kernels
    assert_eq!(auto.nodes(), never.nodes());

    let results = auto.query(&[1.0, 2.0, 3.0], 5).unwrap();
    assert_eq!(results.len(), 5);
    assert!(results.windows(2).all(|w| w[0].squared_distance <= w[1].squared_distance));
}

#[test]
fn test_f32_matches_brute_force() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(77);
    let data: Vec<f32> = (0..200 * 3).map(|_| rng.gen_range(-10.0_f32..10.0)).collect();
    let points = PointSet::new(3, data).unwrap();
    let ids: Vec<usize> = (0..200).collect();
    let tree = BallTree::from_points(points.clone(), KnnDistance::Euclidean, 5).unwrap();

    for _ in 0..10 {
        let query: Vec<f32> = (0..3).map(|_| rng.gen_range(-12.0_f32..12.0)).collect();
        let expected = linear_scan(&points, &ids, &KnnDistance::Euclidean, &query, 8);
        assert_eq!(tree.query(&query, 8).unwrap(), expected);
    }
}

#[test]
fn test_small_inputs() {
    init_logging();
    let single = PointSet::from_rows(&[[4.0, -2.0, 1.0]]).unwrap();
    let tree = BallTree::from_points(single, KnnDistance::Euclidean, 40).unwrap();
    let root = &tree.nodes()[tree.root()];
    assert_eq!(root.ball.radius, 0.0);

    let results = tree.query(&[4.0, -2.0, 2.0], 3).unwrap();
    assert_eq!(results[0].point, Some(0));
    assert_eq!(results[0].squared_distance, 1.0);
    assert!(results[1].is_missing() && results[2].is_missing());

    assert_eq!(tree.query(&[4.0, -2.0, 2.0], 0), Err(QueryError::ZeroNeighbors));
    assert_eq!(
        tree.query(&[4.0, -2.0], 1),
        Err(QueryError::DimensionMismatch { expected: 3, got: 2 })
    );
}
