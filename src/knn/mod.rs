//! Nearest-neighbour search: distance kernels and the ball tree built on them.

pub mod anchors;
pub mod ball_tree;
pub mod brute_force;
pub mod heap_utils;
pub mod merge;

use crate::common_types::Coordinate;

/// Pairwise distance evaluation, reported in squared form.
///
/// `squared_distance` must be symmetric and non-negative. Search is exact and
/// anchor growth may use triangle-inequality shortcuts only when the square
/// root of the returned value is a metric; kernels that are not must return
/// `false` from `is_metric`.
pub trait DistanceKernel<F> {
    fn squared_distance(&self, a: &[F], b: &[F]) -> f64;

    fn is_metric(&self) -> bool {
        true
    }
}

impl<F, K: DistanceKernel<F> + ?Sized> DistanceKernel<F> for &K {
    fn squared_distance(&self, a: &[F], b: &[F]) -> f64 {
        (**self).squared_distance(a, b)
    }

    fn is_metric(&self) -> bool {
        (**self).is_metric()
    }
}

/// The built-in kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KnnDistance {
    #[default]
    Euclidean,
    Manhattan,
    Chebyshev,
    Minkowski { p: u32 }, // p is the order; 0 is treated as 1
    /// `1 - cos(a, b)`. Not a metric, so results are best effort.
    Cosine,
}

// --- Helper functions for vector operations ---

/// Calculates the dot product of two f64 vectors.
fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Calculates the magnitude (L2 norm) of an f64 vector.
fn magnitude(vec: &[f64]) -> f64 {
    vec.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Minkowski distance of order `p` (0 is treated as 1).
///
/// Differences are divided by the largest one before raising them to `p`, so
/// high orders and large coordinates stay finite.
fn minkowski<F: Coordinate>(a: &[F], b: &[F], p: u32) -> f64 {
    let p = f64::from(p.max(1));
    let abs_diff = |(&x, &y): (&F, &F)| -> f64 { (x - y).abs().as_() };

    let largest = a.iter().zip(b.iter()).map(abs_diff).fold(0.0_f64, f64::max);
    if largest == 0.0 || !largest.is_finite() {
        return largest;
    }
    let sum_of_powers: f64 = a.iter().zip(b.iter()).map(|pair| (abs_diff(pair) / largest).powf(p)).sum();
    largest * sum_of_powers.powf(1.0 / p)
}

pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        // two zero vectors coincide; a zero and a non-zero vector are maximally apart
        return if mag_a == mag_b { 0.0 } else { 1.0 };
    }
    let similarity = (dot_product(a, b) / (mag_a * mag_b)).clamp(-1.0, 1.0);
    1.0 - similarity
}

impl<F: Coordinate> DistanceKernel<F> for KnnDistance {
    fn squared_distance(&self, a: &[F], b: &[F]) -> f64 {
        match *self {
            KnnDistance::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| {
                    let diff: f64 = (x - y).as_();
                    diff * diff
                })
                .sum(),
            KnnDistance::Manhattan => {
                let d = minkowski(a, b, 1);
                d * d
            }
            KnnDistance::Chebyshev => {
                let d = a
                    .iter()
                    .zip(b.iter())
                    .map(|(&x, &y)| -> f64 { (x - y).abs().as_() })
                    .fold(0.0_f64, f64::max);
                d * d
            }
            KnnDistance::Minkowski { p: 2 } => {
                <KnnDistance as DistanceKernel<F>>::squared_distance(&KnnDistance::Euclidean, a, b)
            }
            KnnDistance::Minkowski { p } => {
                let d = minkowski(a, b, p);
                d * d
            }
            KnnDistance::Cosine => {
                let a_f64: Vec<f64> = a.iter().map(|&x| -> f64 { x.as_() }).collect();
                let b_f64: Vec<f64> = b.iter().map(|&x| -> f64 { x.as_() }).collect();
                let d = cosine_distance(&a_f64, &b_f64);
                d * d
            }
        }
    }

    fn is_metric(&self) -> bool {
        !matches!(self, KnnDistance::Cosine)
    }
}
