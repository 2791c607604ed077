use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{AnalysisConfig, GridShape, IdentitySchema, Result, SweepKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridSweepConfig {
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub baseline: BaselineGridTable,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl GridSweepConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GridSweepConfig = serde_json::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub gpus_per_node: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { gpus_per_node: 4 }
    }
}

// =============================================================================
// Sweep generation
// =============================================================================

/// How the per-run tile grows from the schedule's starting value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TileScaling {
    /// `tile_start`
    Fixed,
    /// `tile_start × node_count`
    #[default]
    NodeLinear,
    /// `⌊tile_start × 2^(0.5·log2(node_count))⌋`
    NodeSqrt,
    /// `⌊tile_start × 2^(0.5·tile_index)⌋`
    TileIndexSqrt2,
}

/// Decides whether a grid is split across nodes enough for the
/// two-dimension variant to differ from the one-dimension run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterNodePolicy {
    pub grid_x_above: u32,
    pub grid_y_above: u32,
}

impl Default for InterNodePolicy {
    fn default() -> Self {
        Self {
            grid_x_above: 2,
            grid_y_above: 1,
        }
    }
}

impl InterNodePolicy {
    pub fn is_inter_node(&self, grid: GridShape) -> bool {
        grid.x > self.grid_x_above && grid.y > self.grid_y_above
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub kind: SweepKind,
    pub node_counts: Vec<u32>,
    pub tile_schedule: Vec<u64>,
    /// `domain_y : domain_x` targets.
    pub ratio_schedule: Vec<u32>,
    #[serde(default)]
    pub tile_scaling: TileScaling,
    #[serde(default)]
    pub inter_node: InterNodePolicy,
    /// Overrides the built-in filename grammar of `kind`.
    #[serde(default)]
    pub schema: Option<IdentitySchema>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            kind: SweepKind::default(),
            node_counts: vec![1, 2, 4, 8, 16, 32, 64],
            tile_schedule: vec![
                1000 * 1000,
                5000 * 5000,
                10000 * 10000,
                10000 * 10000 * 2,
                10000 * 10000 * 3,
                10000 * 10000 * 4,
            ],
            ratio_schedule: vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 512],
            tile_scaling: TileScaling::default(),
            inter_node: InterNodePolicy::default(),
            schema: None,
        }
    }
}

impl SweepConfig {
    pub fn schema(&self) -> IdentitySchema {
        self.schema.clone().unwrap_or_else(|| self.kind.schema())
    }
}

/// Total GPU count → baseline process grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaselineGridTable(pub BTreeMap<u32, GridShape>);

impl Default for BaselineGridTable {
    fn default() -> Self {
        Self::from_pairs(&[
            (4, (2, 2)),
            (8, (4, 2)),
            (16, (4, 4)),
            (32, (8, 4)),
            (64, (8, 8)),
            (128, (16, 8)),
            (256, (16, 16)),
        ])
    }
}

impl BaselineGridTable {
    pub fn from_pairs(pairs: &[(u32, (u32, u32))]) -> Self {
        Self(pairs.iter().map(|(gpus, grid)| (*gpus, GridShape::from(*grid))).collect())
    }

    pub fn get(&self, gpus: u32) -> Option<GridShape> {
        self.0.get(&gpus).copied()
    }

    pub fn remove(&mut self, gpus: u32) -> Option<GridShape> {
        self.0.remove(&gpus)
    }
}

// =============================================================================
// Submission files
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitPolicy {
    #[default]
    PerNode,
    PerNodeAndTile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionConfig {
    pub file_prefix: String,
    pub extension: String,
    #[serde(default)]
    pub split: SplitPolicy,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            file_prefix: "bsub_stencil_swp".to_string(),
            extension: "lsf".to_string(),
            split: SplitPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_baseline_is_consistent() {
        let table = BaselineGridTable::default();
        for (gpus, grid) in &table.0 {
            assert_eq!(grid.area(), *gpus as u64);
        }
        assert_eq!(table.get(8), Some(GridShape::new(4, 2)));
        assert_eq!(table.get(512), None);
    }

    #[test]
    fn test_inter_node_policy() {
        let policy = InterNodePolicy::default();
        assert!(policy.is_inter_node(GridShape::new(4, 2)));
        assert!(!policy.is_inter_node(GridShape::new(2, 4)));
        assert!(!policy.is_inter_node(GridShape::new(8, 1)));
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "cluster": {{ "gpus_per_node": 8 }},
                "baseline": {{ "8": {{ "x": 4, "y": 2 }} }},
                "analysis": {{ "reducer": "mean", "expected_repeat_count": 5 }}
            }}"#
        )
        .unwrap();

        let config = GridSweepConfig::load(file.path()).unwrap();
        assert_eq!(config.cluster.gpus_per_node, 8);
        assert_eq!(config.baseline.0.len(), 1);
        assert_eq!(config.analysis.expected_repeat_count, 5);
        assert_eq!(config.sweep, SweepConfig::default());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = GridSweepConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: GridSweepConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
