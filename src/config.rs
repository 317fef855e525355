use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Rect;

pub const DEFAULT_TIME_LIMIT_MS: u64 = 2000;

/// How item footprints are charged against the sheet in the pricing relaxation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapacityPolicy {
    /// Item width counts against sheet width, item height against sheet height.
    #[default]
    AsGiven,
    /// The item's shorter side counts against the sheet's shorter side and the
    /// longer side against the longer side, so either orientation may be cut.
    EitherOrientation,
}

/// Order in which candidate top-left corners are tried on a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum SearchStrategy {
    /// Every position, increasing y then x. First fit wins.
    #[default]
    RowMajor,
    /// Uniformly sampled positions, at most `attempts` per item orientation.
    Random { attempts: u32 },
}

/// Order in which the pieces of the chosen patterns are offered to a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PieceOrder {
    /// Pattern pool order, then item order within each pattern.
    Pool,
    /// Largest area first; pool order breaks ties.
    #[default]
    LargestFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Sheet extent used by pricing. `None` uses the largest stock in the call.
    pub pricing_sheet: Option<Rect>,
    pub capacity: CapacityPolicy,
    pub search: SearchStrategy,
    pub order: PieceOrder,
    /// Retry an item with width and height swapped when it cannot be placed as given.
    pub allow_rotate: bool,
    /// Upper bound on pricing rounds per call.
    pub max_iterations: usize,
    /// Wall-clock budget per decision in milliseconds, shared by pricing and
    /// the integer master (0 = unlimited).
    pub time_limit_ms: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            pricing_sheet: None,
            capacity: CapacityPolicy::default(),
            search: SearchStrategy::default(),
            order: PieceOrder::default(),
            allow_rotate: true,
            max_iterations: 500,
            time_limit_ms: DEFAULT_TIME_LIMIT_MS,
        }
    }
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pricing_sheet(mut self, sheet: Rect) -> Self {
        self.pricing_sheet = Some(sheet);
        self
    }

    pub fn with_capacity(mut self, capacity: CapacityPolicy) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_search(mut self, search: SearchStrategy) -> Self {
        self.search = search;
        self
    }

    pub fn with_order(mut self, order: PieceOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_rotation(mut self, allow_rotate: bool) -> Self {
        self.allow_rotate = allow_rotate;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_time_limit(mut self, time_limit_ms: u64) -> Self {
        self.time_limit_ms = time_limit_ms;
        self
    }

    pub fn time_limit(&self) -> Option<Duration> {
        (self.time_limit_ms > 0).then(|| Duration::from_millis(self.time_limit_ms))
    }
}
