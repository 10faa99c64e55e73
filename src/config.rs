//! Construction parameters for the ball tree.

/// How many levels of anchor subdivision the builder may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MaxDepth {
    /// Keep subdividing until every leaf fits `min_leaf_size`.
    #[default]
    Unlimited,
    /// At most this many levels; `Levels(1)` puts every point in one leaf.
    Levels(usize),
}

impl MaxDepth {
    /// True when the current level must be built as a single leaf.
    pub fn is_last_level(self) -> bool {
        matches!(self, MaxDepth::Levels(n) if n <= 1)
    }

    /// Budget handed to the next level down.
    pub fn descend(self) -> Self {
        match self {
            MaxDepth::Unlimited => MaxDepth::Unlimited,
            MaxDepth::Levels(n) => MaxDepth::Levels(n.saturating_sub(1)),
        }
    }
}

/// Rule for the first pivot of every anchor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PivotRule {
    /// The first id of the working set.
    #[default]
    First,
    /// A uniformly drawn id from a `StdRng` seeded with this value.
    /// One generator serves the whole build, so the tree is reproducible.
    Seeded(u64),
}

/// Whether anchor growth may stop scanning an anchor early using the
/// triangle inequality.
///
/// The shortcut is only sound for kernels that are true metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AnchorPruning {
    /// Use it when the kernel reports `is_metric()`.
    #[default]
    Auto,
    Always,
    Never,
}

impl AnchorPruning {
    pub fn enabled(self, kernel_is_metric: bool) -> bool {
        match self {
            AnchorPruning::Auto => kernel_is_metric,
            AnchorPruning::Always => true,
            AnchorPruning::Never => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BallTreeConfig {
    /// Largest point count a leaf may hold before it is subdivided.
    pub min_leaf_size: usize,
    pub max_depth: MaxDepth,
    pub pivot: PivotRule,
    pub anchor_pruning: AnchorPruning,
}

impl BallTreeConfig {
    pub const DEFAULT_LEAF_SIZE: usize = 40;

    pub fn new(min_leaf_size: usize) -> Self {
        BallTreeConfig { min_leaf_size, ..Self::default() }
    }

    pub fn with_max_depth(mut self, max_depth: MaxDepth) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_pivot(mut self, pivot: PivotRule) -> Self {
        self.pivot = pivot;
        self
    }

    pub fn with_anchor_pruning(mut self, anchor_pruning: AnchorPruning) -> Self {
        self.anchor_pruning = anchor_pruning;
        self
    }
}

impl Default for BallTreeConfig {
    fn default() -> Self {
        BallTreeConfig {
            min_leaf_size: Self::DEFAULT_LEAF_SIZE,
            max_depth: MaxDepth::Unlimited,
            pivot: PivotRule::First,
            anchor_pruning: AnchorPruning::Auto,
        }
    }
}
