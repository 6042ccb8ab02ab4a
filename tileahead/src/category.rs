//! Prefetch categories and their priority weights.
//!
//! Every planned task belongs to exactly one of five fixed categories; the
//! configured weight of its category is the integer part of its priority and
//! decides dispatch order between categories. Sub-priority offsets (per
//! next-navigation target, per background layer) refine the order *inside*
//! a category and must never cross into the next one; see
//! [`CategoryWeights::set`].

use std::fmt;

use tracing::warn;

/// Additive priority offset per next-navigation target index.
///
/// Target `i` contributes `i * TARGET_PRIORITY_STEP`, so an earlier target's
/// tiles always precede a later target's within the same category.
pub const TARGET_PRIORITY_STEP: f64 = 0.1;

/// Scale applied to a background layer's registered priority.
///
/// Keeps relative layer ordering inside a category without crossing the
/// spacing between adjacent category weights.
pub const LAYER_PRIORITY_SCALE: f64 = 0.001;

/// Purpose of a planned tile load.
///
/// Categories partition all tasks at any instant; ordering between
/// categories is total, given by the configured weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefetchCategory {
    /// Offscreen ring around the current viewport for the active layer.
    SpatialActive,
    /// Current viewport tiles for registered non-active layers.
    BackgroundViewport,
    /// Reserved: offscreen ring for non-active layers. Declared for weight
    /// configuration and stats, not currently produced by the planner.
    BackgroundBuffer,
    /// Active-layer tiles for an anticipated future viewport.
    NextNavActive,
    /// Non-active-layer tiles for an anticipated future viewport.
    NextNavBackground,
}

impl PrefetchCategory {
    /// All categories, in default-weight order.
    pub const ALL: [PrefetchCategory; 5] = [
        PrefetchCategory::SpatialActive,
        PrefetchCategory::BackgroundViewport,
        PrefetchCategory::BackgroundBuffer,
        PrefetchCategory::NextNavActive,
        PrefetchCategory::NextNavBackground,
    ];

    /// Stable index into per-category arrays.
    pub fn index(self) -> usize {
        match self {
            PrefetchCategory::SpatialActive => 0,
            PrefetchCategory::BackgroundViewport => 1,
            PrefetchCategory::BackgroundBuffer => 2,
            PrefetchCategory::NextNavActive => 3,
            PrefetchCategory::NextNavBackground => 4,
        }
    }

    /// Default priority weight (lower dispatches first).
    pub fn default_weight(self) -> f64 {
        match self {
            PrefetchCategory::SpatialActive => 1.0,
            PrefetchCategory::BackgroundViewport => 2.0,
            PrefetchCategory::BackgroundBuffer => 3.0,
            PrefetchCategory::NextNavActive => 4.0,
            PrefetchCategory::NextNavBackground => 5.0,
        }
    }

    /// Human-readable label for logs and dashboards.
    pub fn label(self) -> &'static str {
        match self {
            PrefetchCategory::SpatialActive => "spatial-active",
            PrefetchCategory::BackgroundViewport => "background-viewport",
            PrefetchCategory::BackgroundBuffer => "background-buffer",
            PrefetchCategory::NextNavActive => "next-nav-active",
            PrefetchCategory::NextNavBackground => "next-nav-background",
        }
    }

    /// True for the two next-navigation categories.
    pub fn is_next_nav(self) -> bool {
        matches!(
            self,
            PrefetchCategory::NextNavActive | PrefetchCategory::NextNavBackground
        )
    }
}

impl fmt::Display for PrefetchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Runtime-configurable priority weights, one per category.
///
/// Any subset of categories may be updated without affecting the others.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryWeights {
    weights: [f64; 5],
}

impl Default for CategoryWeights {
    fn default() -> Self {
        let mut weights = [0.0; 5];
        for category in PrefetchCategory::ALL {
            weights[category.index()] = category.default_weight();
        }
        Self { weights }
    }
}

impl CategoryWeights {
    /// Weight for a category.
    pub fn get(&self, category: PrefetchCategory) -> f64 {
        self.weights[category.index()]
    }

    /// Sets the weight of a single category.
    ///
    /// Invariant: sub-priority offsets are strictly below 1.0 (the largest
    /// is the per-target step at realistic target counts plus the layer
    /// scale), so the spacing between any two adjacent configured weights
    /// must stay at least 1.0 for offsets to never reorder tasks across
    /// categories. A narrower spacing is accepted but logged.
    pub fn set(&mut self, category: PrefetchCategory, weight: f64) {
        self.weights[category.index()] = weight;

        let spacing = self.min_spacing();
        if spacing < 1.0 {
            warn!(
                category = category.label(),
                weight,
                spacing,
                "category weight spacing below 1.0; sub-priority offsets may cross categories"
            );
        }
    }

    /// Applies a partial update, leaving unnamed categories untouched.
    pub fn apply(&mut self, updates: &[(PrefetchCategory, f64)]) {
        for &(category, weight) in updates {
            self.set(category, weight);
        }
    }

    /// Smallest gap between two distinct configured weights.
    pub fn min_spacing(&self) -> f64 {
        let mut sorted = self.weights;
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        sorted
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .fold(f64::INFINITY, f64::min)
    }

    /// Weights paired with their categories, for snapshots.
    pub fn entries(&self) -> [(PrefetchCategory, f64); 5] {
        let mut out = [(PrefetchCategory::SpatialActive, 0.0); 5];
        for (slot, category) in out.iter_mut().zip(PrefetchCategory::ALL) {
            *slot = (category, self.weights[category.index()]);
        }
        out
    }
}
