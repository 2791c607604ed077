use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ConfigKey, Dimensionality, GridSweepError, Result, RunIdentity, Variant};

/// Reduces the repeated trials of one identity to a single time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    /// Middle element; mean of the two middle elements for even counts.
    #[default]
    Median,
    Mean,
}

impl Reducer {
    pub fn label(&self) -> &'static str {
        match self {
            Reducer::Median => "median",
            Reducer::Mean => "mean",
        }
    }
}

impl FromStr for Reducer {
    type Err = GridSweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "median" => Ok(Reducer::Median),
            "mean" => Ok(Reducer::Mean),
            other => Err(GridSweepError::InvalidArgument(format!("unknown reducer '{}'", other))),
        }
    }
}

/// What a per-configuration ratio expresses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricFraming {
    /// Optimized throughput over baseline throughput; above 1 is better.
    #[default]
    Throughput,
    /// Optimized time over baseline time; below 1 is better.
    Runtime,
}

impl MetricFraming {
    pub fn label(&self) -> &'static str {
        match self {
            MetricFraming::Throughput => "throughput",
            MetricFraming::Runtime => "runtime",
        }
    }
}

impl FromStr for MetricFraming {
    type Err = GridSweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "throughput" => Ok(MetricFraming::Throughput),
            "runtime" => Ok(MetricFraming::Runtime),
            other => Err(GridSweepError::InvalidArgument(format!("unknown framing '{}'", other))),
        }
    }
}

/// Picks one run of a variant out of a sub-configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSelector {
    pub variant: Variant,
    pub preferred: Dimensionality,
    #[serde(default)]
    pub fallback: Option<Dimensionality>,
}

impl VariantSelector {
    /// Candidate dimensionalities, most preferred first.
    pub fn candidates(&self) -> impl Iterator<Item = Dimensionality> {
        std::iter::once(self.preferred).chain(self.fallback)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSelection {
    pub optimized: VariantSelector,
    pub baseline: VariantSelector,
}

impl Default for PairSelection {
    fn default() -> Self {
        Self {
            // Many configurations only ever produce a one-dimension optimized run.
            optimized: VariantSelector {
                variant: Variant::Optimized,
                preferred: Dimensionality::TwoD,
                fallback: Some(Dimensionality::OneD),
            },
            baseline: VariantSelector {
                variant: Variant::Baseline,
                preferred: Dimensionality::OneD,
                fallback: None,
            },
        }
    }
}

/// Rows dropped before metrics are computed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    #[serde(default)]
    pub exclude_node_counts: Vec<u32>,
    #[serde(default)]
    pub exclude_tile_indices: Vec<u32>,
    #[serde(default)]
    pub max_ratio_index: Option<u32>,
}

impl RowFilter {
    pub fn keeps(&self, identity: &RunIdentity) -> bool {
        if self.exclude_node_counts.contains(&identity.node_count) {
            return false;
        }
        if identity
            .tile_index
            .is_some_and(|t| self.exclude_tile_indices.contains(&t))
        {
            return false;
        }
        match (self.max_ratio_index, identity.ratio_index) {
            (Some(max), Some(r)) => r <= max,
            _ => true,
        }
    }
}

/// Experiment dimension that improvement ratios are grouped by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Axis {
    #[default]
    Node,
    Tile,
    Ratio,
    TileCurrent,
}

impl Axis {
    pub fn label(&self) -> &'static str {
        match self {
            Axis::Node => "node",
            Axis::Tile => "tile",
            Axis::Ratio => "ratio",
            Axis::TileCurrent => "tile-current",
        }
    }

    pub fn all() -> &'static [Axis] {
        &[Axis::Node, Axis::Tile, Axis::Ratio, Axis::TileCurrent]
    }

    pub fn value(&self, key: &ConfigKey) -> Option<u64> {
        match self {
            Axis::Node => Some(key.node_count as u64),
            Axis::Tile => key.tile_index.map(u64::from),
            Axis::Ratio => key.ratio_index.map(u64::from),
            Axis::TileCurrent => key.tile_current,
        }
    }
}

impl FromStr for Axis {
    type Err = GridSweepError;

    fn from_str(s: &str) -> Result<Self> {
        Axis::all()
            .iter()
            .find(|a| a.label() == s)
            .copied()
            .ok_or_else(|| GridSweepError::InvalidArgument(format!("unknown axis '{}'", s)))
    }
}

fn default_expected_repeat_count() -> usize {
    20
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub reducer: Reducer,
    #[serde(default = "default_expected_repeat_count")]
    pub expected_repeat_count: usize,
    #[serde(default)]
    pub framing: MetricFraming,
    #[serde(default)]
    pub selection: PairSelection,
    #[serde(default)]
    pub filter: RowFilter,
    #[serde(default)]
    pub axis: Axis,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            reducer: Reducer::default(),
            expected_repeat_count: default_expected_repeat_count(),
            framing: MetricFraming::default(),
            selection: PairSelection::default(),
            filter: RowFilter::default(),
            axis: Axis::default(),
        }
    }
}
