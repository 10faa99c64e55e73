//! Python bindings (feature `python`).

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::common_types::PointSet;
use crate::config::{BallTreeConfig, MaxDepth};
use crate::knn::ball_tree::BallTree;
use crate::knn::{DistanceKernel, KnnDistance};

/// Python-friendly representation of KnnDistance
#[pyclass(name = "KnnDistance")]
#[derive(Clone)]
enum PyKnnDistance {
    Euclidean,
    Manhattan,
    Chebyshev,
    Cosine,
}

impl From<PyKnnDistance> for KnnDistance {
    fn from(val: PyKnnDistance) -> Self {
        match val {
            PyKnnDistance::Euclidean => KnnDistance::Euclidean,
            PyKnnDistance::Manhattan => KnnDistance::Manhattan,
            PyKnnDistance::Chebyshev => KnnDistance::Chebyshev,
            PyKnnDistance::Cosine => KnnDistance::Cosine,
        }
    }
}

fn value_error(err: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Resolves the `metric`/`p` pair; `p` selects a Minkowski order and wins over `metric`.
fn resolve_kernel(metric: PyKnnDistance, p: Option<u32>) -> KnnDistance {
    match p {
        Some(p) => KnnDistance::Minkowski { p },
        None => metric.into(),
    }
}

/// Distance between two vectors under the given metric.
#[pyfunction]
#[pyo3(signature = (a, b, metric = PyKnnDistance::Euclidean, p = None))]
fn distance(a: Vec<f64>, b: Vec<f64>, metric: PyKnnDistance, p: Option<u32>) -> PyResult<f64> {
    if a.len() != b.len() {
        return Err(PyValueError::new_err("Input vectors must have the same length."));
    }
    Ok(resolve_kernel(metric, p).squared_distance(&a[..], &b[..]).sqrt())
}

#[pyclass(name = "BallTree")]
struct PyBallTree {
    tree: BallTree<f64, PointSet<f64>, KnnDistance>,
}

#[pymethods]
impl PyBallTree {
    #[new]
    #[pyo3(signature = (points, min_leaf_size = BallTreeConfig::DEFAULT_LEAF_SIZE, max_depth = None, metric = PyKnnDistance::Euclidean, p = None))]
    fn new(
        points: Vec<Vec<f64>>,
        min_leaf_size: usize,
        max_depth: Option<usize>,
        metric: PyKnnDistance,
        p: Option<u32>,
    ) -> PyResult<Self> {
        let point_set = PointSet::from_rows(&points).map_err(value_error)?;
        let config = BallTreeConfig::new(min_leaf_size)
            .with_max_depth(max_depth.map_or(MaxDepth::Unlimited, MaxDepth::Levels));
        let ids: Vec<usize> = (0..points.len()).collect();
        let tree = BallTree::build(point_set, resolve_kernel(metric, p), &ids, &config).map_err(value_error)?;
        Ok(PyBallTree { tree })
    }

    /// The `k` nearest points as `(distance, id)` pairs; `id` is `None` for
    /// padding when the tree holds fewer than `k` points.
    fn query(&self, point: Vec<f64>, k: usize) -> PyResult<Vec<(f64, Option<usize>)>> {
        let neighbors = self.tree.query(&point, k).map_err(value_error)?;
        Ok(neighbors.iter().map(|n| (n.distance(), n.point)).collect())
    }

    /// All points within `radius` (inclusive), nearest first.
    fn query_radius(&self, point: Vec<f64>, radius: f64) -> PyResult<Vec<(f64, usize)>> {
        if radius.is_nan() || radius < 0.0 {
            return Err(PyValueError::new_err("radius must be a non-negative number"));
        }
        let neighbors = self.tree.query_radius(&point, radius * radius).map_err(value_error)?;
        Ok(neighbors
            .iter()
            .filter_map(|n| n.point.map(|id| (n.distance(), id)))
            .collect())
    }

    fn __len__(&self) -> usize {
        self.tree.len()
    }

    #[getter]
    fn dimension(&self) -> usize {
        self.tree.dimension()
    }

    /// `(node_count, leaf_count, depth, largest_leaf)`
    #[getter]
    fn stats(&self) -> (usize, usize, usize, usize) {
        let stats = self.tree.stats();
        (stats.node_count, stats.leaf_count, stats.depth, stats.largest_leaf)
    }
}

/// A Python module implemented in Rust. The name of this function must match
/// the `lib.name` in `Cargo.toml`.
#[pymodule]
fn anchor_ball_tree(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(distance, m)?)?;
    m.add_class::<PyKnnDistance>()?;
    m.add_class::<PyBallTree>()?;
    Ok(())
}
