use serde::{Deserialize, Serialize};

use crate::{Dimensionality, Variant};

// =============================================================================
// Grid shape
// =============================================================================

/// A `(x, y)` factorization of the total GPU count into a 2-D process grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridShape {
    pub x: u32,
    pub y: u32,
}

impl GridShape {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn area(&self) -> u64 {
        self.x as u64 * self.y as u64
    }
}

impl From<(u32, u32)> for GridShape {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

// =============================================================================
// Planned runs
// =============================================================================

/// One planned benchmark invocation, produced by the sweep generator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub node_count: u32,
    pub tile_index: u32,
    pub ratio_index: u32,
    pub variant: Variant,
    pub dimensionality: Dimensionality,
    pub tile_start: u64,
    pub tile_current: u64,
    pub domain_x: u64,
    pub domain_y: u64,
    pub grid_x: u32,
    pub grid_y: u32,
}

impl RunConfig {
    pub fn grid(&self) -> GridShape {
        GridShape::new(self.grid_x, self.grid_y)
    }

    pub fn identity(&self) -> RunIdentity {
        RunIdentity {
            node_count: self.node_count,
            tile_index: Some(self.tile_index),
            ratio_index: Some(self.ratio_index),
            tile_start: Some(self.tile_start),
            tile_current: Some(self.tile_current),
            domain_x: self.domain_x,
            domain_y: self.domain_y,
            variant: self.variant,
            dimensionality: self.dimensionality,
            grid_x: self.grid_x,
            grid_y: self.grid_y,
        }
    }

    /// Fields in scheduler submission order.
    pub fn submission_fields(&self) -> [String; 11] {
        [
            self.node_count.to_string(),
            self.tile_index.to_string(),
            self.ratio_index.to_string(),
            self.variant.tag().to_string(),
            self.dimensionality.digit().to_string(),
            self.tile_start.to_string(),
            self.tile_current.to_string(),
            self.domain_x.to_string(),
            self.domain_y.to_string(),
            self.grid_x.to_string(),
            self.grid_y.to_string(),
        ]
    }
}

// =============================================================================
// Identities
// =============================================================================

/// Identifies a class of repeated trials.
///
/// Optional fields are those that simpler sweep types do not encode. The
/// derived ordering (node count first, in declaration order) is the sort key
/// of the aggregate table.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunIdentity {
    pub node_count: u32,
    #[serde(default)]
    pub tile_index: Option<u32>,
    #[serde(default)]
    pub ratio_index: Option<u32>,
    #[serde(default)]
    pub tile_start: Option<u64>,
    #[serde(default)]
    pub tile_current: Option<u64>,
    pub domain_x: u64,
    pub domain_y: u64,
    pub variant: Variant,
    pub dimensionality: Dimensionality,
    pub grid_x: u32,
    pub grid_y: u32,
}

impl RunIdentity {
    pub fn grid(&self) -> GridShape {
        GridShape::new(self.grid_x, self.grid_y)
    }

    pub fn config_key(&self) -> ConfigKey {
        ConfigKey {
            node_count: self.node_count,
            tile_index: self.tile_index,
            ratio_index: self.ratio_index,
            tile_start: self.tile_start,
            tile_current: self.tile_current,
            domain_x: self.domain_x,
            domain_y: self.domain_y,
        }
    }
}

/// A sub-configuration: everything but the partitioning choice.
///
/// Optimized and Baseline runs sharing a `ConfigKey` are compared against
/// each other.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigKey {
    pub node_count: u32,
    pub tile_index: Option<u32>,
    pub ratio_index: Option<u32>,
    pub tile_start: Option<u64>,
    pub tile_current: Option<u64>,
    pub domain_x: u64,
    pub domain_y: u64,
}

impl ConfigKey {
    /// Work per run used for throughput: `tile_current²` when the tile is
    /// encoded, the iteration-space area otherwise.
    pub fn grid_area(&self) -> f64 {
        match self.tile_current {
            Some(tile) => tile as f64 * tile as f64,
            None => self.domain_x as f64 * self.domain_y as f64,
        }
    }
}

// =============================================================================
// Measurements
// =============================================================================

/// One parsed log file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub identity: RunIdentity,
    pub repetition: u32,
    pub elapsed_seconds: f64,
}

/// Repeated trials of one identity reduced to a single time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub identity: RunIdentity,
    pub representative_time: f64,
    pub sample_count: usize,
}

/// Optimized-vs-baseline ratio for one sub-configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImprovementSample {
    pub key: ConfigKey,
    pub ratio: f64,
}
