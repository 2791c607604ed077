use std::path::{Path, PathBuf};

use gridsweep_core::{Result, RunConfig, SplitPolicy, SubmissionConfig};

use crate::sweep::SweepPlan;

/// `run` followed by the run's fields, tab separated.
pub fn render_submission_line(config: &RunConfig) -> String {
    let mut line = String::from("run");
    for field in config.submission_fields() {
        line.push('\t');
        line.push_str(&field);
    }
    line
}

/// Scheduler file name for a batch of runs.
pub fn submission_file_name(
    cfg: &SubmissionConfig,
    node_count: u32,
    tile_index: Option<u32>,
) -> String {
    match tile_index {
        Some(tile) => format!("{}_{}_{}.{}", cfg.file_prefix, node_count, tile, cfg.extension),
        None => format!("{}_{}.{}", cfg.file_prefix, node_count, cfg.extension),
    }
}

/// Writes one submission file per batch, each starting with `template`.
///
/// Batches follow plan order. Node counts that failed to generate get no file.
pub fn write_submissions(
    plan: &SweepPlan,
    cfg: &SubmissionConfig,
    template: &str,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;

    let mut batches: Vec<(String, Vec<&RunConfig>)> = Vec::new();
    for run in plan.configs() {
        let tile = match cfg.split {
            SplitPolicy::PerNode => None,
            SplitPolicy::PerNodeAndTile => Some(run.tile_index),
        };
        let name = submission_file_name(cfg, run.node_count, tile);
        match batches.iter_mut().find(|(n, _)| *n == name) {
            Some((_, runs)) => runs.push(run),
            None => batches.push((name, vec![run])),
        }
    }

    let mut written = Vec::with_capacity(batches.len());
    for (name, runs) in batches {
        let mut content = template.to_string();
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        for run in &runs {
            content.push_str(&render_submission_line(run));
            content.push('\n');
        }

        let path = out_dir.join(&name);
        std::fs::write(&path, content)?;
        tracing::debug!("Wrote {} runs to {}", runs.len(), path.display());
        written.push(path);
    }

    tracing::info!("Wrote {} submission files to {}", written.len(), out_dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::NodeSweep;
    use gridsweep_core::{Dimensionality, GridSweepError, Variant};
    use tempfile::TempDir;

    fn run(node_count: u32, tile_index: u32, variant: Variant) -> RunConfig {
        RunConfig {
            node_count,
            tile_index,
            ratio_index: 0,
            variant,
            dimensionality: Dimensionality::OneD,
            tile_start: 1_000_000,
            tile_current: 1_000_000 * node_count as u64,
            domain_x: 1000,
            domain_y: 1000,
            grid_x: 2 * node_count,
            grid_y: 2,
        }
    }

    fn plan() -> SweepPlan {
        SweepPlan {
            nodes: vec![
                NodeSweep {
                    node_count: 2,
                    runs: Ok(vec![
                        run(2, 0, Variant::Optimized),
                        run(2, 0, Variant::Baseline),
                        run(2, 1, Variant::Optimized),
                    ]),
                },
                NodeSweep {
                    node_count: 128,
                    runs: Err(GridSweepError::MissingBaseline {
                        node_count: 128,
                        gpus: 512,
                    }),
                },
            ],
        }
    }

    #[test]
    fn test_render_line() {
        assert_eq!(
            render_submission_line(&run(2, 0, Variant::Baseline)),
            "run\t2\t0\t0\tc\t1\t1000000\t2000000\t1000\t1000\t4\t2"
        );
    }

    #[test]
    fn test_per_node_files() {
        let tmp = TempDir::new().unwrap();
        let cfg = SubmissionConfig::default();
        let template = "#!/bin/bash\n#BSUB -q normal";
        let written = write_submissions(&plan(), &cfg, template, tmp.path()).unwrap();

        assert_eq!(written, vec![tmp.path().join("bsub_stencil_swp_2.lsf")]);
        let content = std::fs::read_to_string(&written[0]).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "#!/bin/bash");
        assert_eq!(lines[1], "#BSUB -q normal");
        assert!(lines[2..].iter().all(|l| l.starts_with("run\t2\t")));
    }

    #[test]
    fn test_per_tile_files() {
        let tmp = TempDir::new().unwrap();
        let cfg = SubmissionConfig {
            split: SplitPolicy::PerNodeAndTile,
            ..SubmissionConfig::default()
        };
        let written = write_submissions(&plan(), &cfg, "", tmp.path()).unwrap();

        assert_eq!(
            written,
            vec![
                tmp.path().join("bsub_stencil_swp_2_0.lsf"),
                tmp.path().join("bsub_stencil_swp_2_1.lsf"),
            ]
        );
        let first = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(first.lines().count(), 2);
    }
}
