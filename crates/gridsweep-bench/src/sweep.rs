use gridsweep_core::{
    BaselineGridTable, ClusterConfig, Dimensionality, GridShape, GridSweepError, Result,
    RunConfig, SweepConfig, SweepKind, TileScaling, Variant,
};

use crate::factorization::compute_best_factor_pair;

/// Generated runs for one node count.
///
/// A failure here is local to the node count: a missing or inconsistent
/// baseline entry does not stop other node counts from being generated.
#[derive(Debug)]
pub struct NodeSweep {
    pub node_count: u32,
    pub runs: Result<Vec<RunConfig>>,
}

#[derive(Debug, Default)]
pub struct SweepPlan {
    pub nodes: Vec<NodeSweep>,
}

impl SweepPlan {
    /// Every generated run, in contract order.
    pub fn configs(&self) -> impl Iterator<Item = &RunConfig> {
        self.nodes
            .iter()
            .filter_map(|n| n.runs.as_ref().ok())
            .flatten()
    }

    pub fn failures(&self) -> impl Iterator<Item = (u32, &GridSweepError)> {
        self.nodes
            .iter()
            .filter_map(|n| n.runs.as_ref().err().map(|e| (n.node_count, e)))
    }

    pub fn is_complete(&self) -> bool {
        self.nodes.iter().all(|n| n.runs.is_ok())
    }
}

pub fn tile_current(
    scaling: TileScaling,
    tile_start: u64,
    tile_index: u32,
    node_count: u32,
) -> Result<u64> {
    let scaled = match scaling {
        TileScaling::Fixed => return Ok(tile_start),
        TileScaling::NodeLinear => {
            return tile_start.checked_mul(node_count as u64).ok_or_else(|| {
                GridSweepError::InvalidArgument(format!(
                    "tile {} × {} nodes overflows",
                    tile_start, node_count
                ))
            })
        }
        TileScaling::NodeSqrt => {
            tile_start as f64 * 2f64.powf(0.5 * (node_count as f64).log2())
        }
        TileScaling::TileIndexSqrt2 => tile_start as f64 * 2f64.powf(0.5 * tile_index as f64),
    };

    if !scaled.is_finite() || scaled >= u64::MAX as f64 {
        return Err(GridSweepError::InvalidArgument(format!(
            "scaled tile {} is out of range",
            scaled
        )));
    }
    Ok(scaled.floor() as u64)
}

/// Iteration-space extents for a tile and a `domain_y : domain_x` ratio.
///
/// `domain_x` rounds down and `domain_y` rounds up; both stay at least 1.
pub fn compute_domain(tile_current: u64, ratio: u32) -> (u64, u64) {
    let tile = tile_current as f64;
    let ratio = ratio as f64;
    let domain_x = (tile / ratio).sqrt().floor() as u64;
    let domain_y = (tile * ratio).sqrt().ceil() as u64;
    (domain_x.max(1), domain_y.max(1))
}

fn validate(sweep: &SweepConfig, cluster: &ClusterConfig) -> Result<()> {
    let invalid = |msg: &str| Err(GridSweepError::InvalidArgument(msg.to_string()));

    if sweep.kind != SweepKind::Sweep {
        return Err(GridSweepError::InvalidArgument(format!(
            "only the sweep layout can be generated, '{}' is parse-only",
            sweep.kind.label()
        )));
    }
    if cluster.gpus_per_node == 0 {
        return invalid("gpus_per_node must be at least 1");
    }
    if sweep.node_counts.is_empty()
        || sweep.tile_schedule.is_empty()
        || sweep.ratio_schedule.is_empty()
    {
        return invalid("node counts, tile schedule and ratio schedule must be non-empty");
    }
    if sweep.node_counts.contains(&0) {
        return invalid("node counts must be at least 1");
    }
    if sweep.tile_schedule.contains(&0) {
        return invalid("tile sizes must be at least 1");
    }
    if sweep.ratio_schedule.contains(&0) {
        return invalid("aspect ratios must be at least 1");
    }
    Ok(())
}

/// Expands node counts × tile schedule × ratio schedule into run configs.
///
/// Output order: node count, tile index, ratio index, then Optimized before
/// Baseline and one dimension before two. The two-dimension run of a variant
/// is only emitted when its grid is inter-node under `sweep.inter_node`.
pub fn generate_sweep(
    sweep: &SweepConfig,
    cluster: &ClusterConfig,
    baseline: &BaselineGridTable,
) -> Result<SweepPlan> {
    validate(sweep, cluster)?;

    tracing::info!(
        "Generating {} sweep for {} node count(s)",
        sweep.kind.label(),
        sweep.node_counts.len()
    );

    let nodes = sweep
        .node_counts
        .iter()
        .map(|&node_count| {
            let runs = generate_node(sweep, cluster, baseline, node_count);
            match &runs {
                Ok(r) => tracing::debug!("Node {}: {} runs", node_count, r.len()),
                Err(e) => tracing::warn!("Node {} skipped: {}", node_count, e),
            }
            NodeSweep { node_count, runs }
        })
        .collect();

    Ok(SweepPlan { nodes })
}

fn generate_node(
    sweep: &SweepConfig,
    cluster: &ClusterConfig,
    baseline: &BaselineGridTable,
    node_count: u32,
) -> Result<Vec<RunConfig>> {
    let gpus = node_count.checked_mul(cluster.gpus_per_node).ok_or_else(|| {
        GridSweepError::InvalidArgument(format!("{} nodes overflow the GPU count", node_count))
    })?;

    let baseline_grid = baseline
        .get(gpus)
        .ok_or(GridSweepError::MissingBaseline { node_count, gpus })?;
    if baseline_grid.area() != gpus as u64 {
        return Err(GridSweepError::InvalidIdentity(format!(
            "baseline grid {}x{} does not cover {} GPUs",
            baseline_grid.x, baseline_grid.y, gpus
        )));
    }

    let mut runs = Vec::new();
    for (tile_index, &tile_start) in sweep.tile_schedule.iter().enumerate() {
        let tile_index = tile_index as u32;
        let tile_current = tile_current(sweep.tile_scaling, tile_start, tile_index, node_count)?;

        for (ratio_index, &ratio) in sweep.ratio_schedule.iter().enumerate() {
            let (domain_x, domain_y) = compute_domain(tile_current, ratio);
            // grid_x : grid_y follows domain_x : domain_y
            let optimized_grid = compute_best_factor_pair(1.0 / ratio as f64, gpus)?;

            let run = |variant: Variant, dimensionality: Dimensionality, grid: GridShape| RunConfig {
                node_count,
                tile_index,
                ratio_index: ratio_index as u32,
                variant,
                dimensionality,
                tile_start,
                tile_current,
                domain_x,
                domain_y,
                grid_x: grid.x,
                grid_y: grid.y,
            };

            for (variant, grid) in [
                (Variant::Optimized, optimized_grid),
                (Variant::Baseline, baseline_grid),
            ] {
                runs.push(run(variant, Dimensionality::OneD, grid));
                if sweep.inter_node.is_inter_node(grid) {
                    runs.push(run(variant, Dimensionality::TwoD, grid));
                }
            }
        }
    }

    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsweep_core::InterNodePolicy;

    fn small_sweep() -> SweepConfig {
        SweepConfig {
            node_counts: vec![1, 2],
            tile_schedule: vec![1000 * 1000],
            ratio_schedule: vec![1, 4],
            ..SweepConfig::default()
        }
    }

    #[test]
    fn test_domain_rounding() {
        assert_eq!(compute_domain(2_000_000, 1), (1414, 1415));
        assert_eq!(compute_domain(1_000_000, 4), (500, 2000));
        assert_eq!(compute_domain(1, 512), (1, 23));
    }

    #[test]
    fn test_tile_scaling_rules() {
        assert_eq!(tile_current(TileScaling::Fixed, 50, 3, 8).unwrap(), 50);
        assert_eq!(tile_current(TileScaling::NodeLinear, 1_000_000, 0, 4).unwrap(), 4_000_000);
        assert_eq!(tile_current(TileScaling::NodeSqrt, 1250, 0, 2).unwrap(), 1767);
        assert_eq!(tile_current(TileScaling::NodeSqrt, 50, 0, 64).unwrap(), 400);
        assert_eq!(tile_current(TileScaling::TileIndexSqrt2, 500, 1, 1).unwrap(), 707);
        assert_eq!(tile_current(TileScaling::TileIndexSqrt2, 500, 2, 1).unwrap(), 1000);
        assert!(tile_current(TileScaling::NodeLinear, u64::MAX, 0, 2).is_err());
    }

    #[test]
    fn test_generated_rows_and_order() {
        let plan = generate_sweep(
            &small_sweep(),
            &ClusterConfig::default(),
            &BaselineGridTable::default(),
        )
        .unwrap();
        assert!(plan.is_complete());

        let lines: Vec<String> = plan.configs().map(|c| c.submission_fields().join(" ")).collect();
        assert_eq!(
            lines,
            vec![
                // 1 node: optimized 2x2 and baseline 2x2 are both intra-node
                "1 0 0 o 1 1000000 1000000 1000 1000 2 2",
                "1 0 0 c 1 1000000 1000000 1000 1000 2 2",
                "1 0 1 o 1 1000000 1000000 500 2000 1 4",
                "1 0 1 c 1 1000000 1000000 500 2000 2 2",
                // 2 nodes: the 4x2 baseline is inter-node
                "2 0 0 o 1 1000000 2000000 1414 1415 2 4",
                "2 0 0 c 1 1000000 2000000 1414 1415 4 2",
                "2 0 0 c 2 1000000 2000000 1414 1415 4 2",
                "2 0 1 o 1 1000000 2000000 707 2829 1 8",
                "2 0 1 c 1 1000000 2000000 707 2829 4 2",
                "2 0 1 c 2 1000000 2000000 707 2829 4 2",
            ]
        );
    }

    #[test]
    fn test_grid_area_invariant() {
        let cluster = ClusterConfig::default();
        let plan = generate_sweep(&SweepConfig::default(), &cluster, &BaselineGridTable::default())
            .unwrap();
        assert!(plan.is_complete());

        let mut count = 0;
        for config in plan.configs() {
            assert_eq!(
                config.grid_x as u64 * config.grid_y as u64,
                config.node_count as u64 * cluster.gpus_per_node as u64
            );
            assert!(config.domain_x >= 1 && config.domain_y >= 1);
            count += 1;
        }
        assert!(count > 0);
    }

    #[test]
    fn test_two_dimension_runs_follow_policy() {
        let sweep = SweepConfig {
            node_counts: vec![4],
            tile_schedule: vec![1_000_000],
            ratio_schedule: vec![1],
            inter_node: InterNodePolicy {
                grid_x_above: 8,
                grid_y_above: 8,
            },
            ..SweepConfig::default()
        };
        let plan = generate_sweep(&sweep, &ClusterConfig::default(), &BaselineGridTable::default())
            .unwrap();
        assert!(plan.configs().all(|c| c.dimensionality == Dimensionality::OneD));

        let sweep = SweepConfig {
            inter_node: InterNodePolicy::default(),
            ..sweep
        };
        let plan = generate_sweep(&sweep, &ClusterConfig::default(), &BaselineGridTable::default())
            .unwrap();
        let dims: Vec<_> = plan.configs().map(|c| (c.variant, c.dimensionality)).collect();
        assert_eq!(
            dims,
            vec![
                (Variant::Optimized, Dimensionality::OneD),
                (Variant::Optimized, Dimensionality::TwoD),
                (Variant::Baseline, Dimensionality::OneD),
                (Variant::Baseline, Dimensionality::TwoD),
            ]
        );
    }

    #[test]
    fn test_missing_baseline_is_local() {
        let mut baseline = BaselineGridTable::default();
        baseline.remove(128);
        let cluster = ClusterConfig { gpus_per_node: 1 };
        let sweep = SweepConfig {
            node_counts: vec![64, 128],
            ..small_sweep()
        };

        let plan = generate_sweep(&sweep, &cluster, &baseline).unwrap();
        assert!(!plan.is_complete());

        let failures: Vec<_> = plan.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 128);
        assert!(matches!(
            failures[0].1,
            GridSweepError::MissingBaseline { node_count: 128, gpus: 128 }
        ));

        let configs: Vec<_> = plan.configs().collect();
        assert!(!configs.is_empty());
        assert!(configs.iter().all(|c| c.node_count == 64 && c.grid().area() == 64));
    }

    #[test]
    fn test_inconsistent_baseline_rejected() {
        let baseline = BaselineGridTable::from_pairs(&[(4, (2, 2)), (8, (2, 2))]);
        let plan = generate_sweep(&small_sweep(), &ClusterConfig::default(), &baseline).unwrap();
        let failures: Vec<_> = plan.failures().collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].1, GridSweepError::InvalidIdentity(_)));
    }

    #[test]
    fn test_invalid_arguments_abort() {
        let sweep = SweepConfig {
            ratio_schedule: vec![1, 0],
            ..small_sweep()
        };
        let err = generate_sweep(&sweep, &ClusterConfig::default(), &BaselineGridTable::default())
            .unwrap_err();
        assert!(matches!(err, GridSweepError::InvalidArgument(_)));

        let err = generate_sweep(
            &small_sweep(),
            &ClusterConfig { gpus_per_node: 0 },
            &BaselineGridTable::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GridSweepError::InvalidArgument(_)));
    }

    #[test]
    fn test_only_sweep_layout_generates() {
        for kind in [SweepKind::All, SweepKind::Map] {
            let sweep = SweepConfig {
                kind,
                ..small_sweep()
            };
            let err = generate_sweep(&sweep, &ClusterConfig::default(), &BaselineGridTable::default())
                .unwrap_err();
            assert_eq!(err.kind(), "invalid_argument");
            assert!(err.to_string().contains(kind.label()));
        }
    }
}
