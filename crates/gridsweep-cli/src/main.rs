use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use gridsweep_bench::{
    aggregate, apply_filter, compute_best_factor_pair, compute_geomean, framed_improvement_percent,
    generate_sweep, harvest_dir, pair_samples, read_aggregate_table, render_submission_line,
    summarize, write_aggregate_table, write_submissions, ImprovementSummary, LogParser,
    PairedSample,
};
use gridsweep_core::{
    Axis, GridSweepConfig, GridSweepError, ImprovementSample, MetricFraming, SweepKind,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "GRIDSWEEP_CONFIG";

#[derive(Parser)]
#[command(name = "gridsweep")]
#[command(about = "GridSweep - distributed stencil benchmark sweeps", long_about = None)]
struct Cli {
    /// JSON config file (defaults to $GRIDSWEEP_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Best power-of-two grid shape for a target x:y ratio
    Factor {
        /// Target grid_x / grid_y
        #[arg(short, long)]
        ratio: f64,

        /// Total GPU count
        #[arg(short, long)]
        gpus: u32,
    },

    /// Generate the sweep and write scheduler submission files (sweep layout only)
    Generate {
        /// Directory for submission files
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// File whose contents start every submission file
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Print submission lines instead of writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Harvest a results directory into an aggregate table
    Aggregate {
        /// Directory holding one sub-directory per run
        #[arg(short, long)]
        results: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Sweep type (sweep, all, map); overrides the config
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Geometric-mean improvement per experiment axis
    Improve {
        /// Aggregate table written by `aggregate`
        #[arg(short, long)]
        table: PathBuf,

        /// Grouping axis (node, tile, ratio, tile-current)
        #[arg(short, long)]
        axis: Option<String>,

        /// Ratio framing (throughput, runtime)
        #[arg(short, long)]
        framing: Option<String>,

        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Factor { ratio, gpus } => cmd_factor(ratio, gpus)?,
        Commands::Generate {
            out,
            template,
            dry_run,
        } => cmd_generate(&config, out.as_deref(), template.as_deref(), dry_run)?,
        Commands::Aggregate { results, out, kind } => {
            cmd_aggregate(&config, &results, out.as_deref(), kind.as_deref())?
        }
        Commands::Improve {
            table,
            axis,
            framing,
            output,
        } => cmd_improve(&config, &table, axis.as_deref(), framing.as_deref(), &output)?,
        Commands::Config => println!("{}", serde_json::to_string_pretty(&config)?),
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<GridSweepConfig> {
    let path = path.or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));
    match path {
        Some(path) => {
            tracing::info!("Loading config from {}", path.display());
            match GridSweepConfig::load(&path) {
                Ok(config) => Ok(config),
                Err(e) => anyhow::bail!("Failed to load {}: {}", path.display(), e),
            }
        }
        None => Ok(GridSweepConfig::default()),
    }
}

fn cmd_factor(ratio: f64, gpus: u32) -> Result<()> {
    let grid = compute_best_factor_pair(ratio, gpus)?;
    println!("{} {}", grid.x, grid.y);
    Ok(())
}

fn cmd_generate(
    config: &GridSweepConfig,
    out: Option<&Path>,
    template: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    let plan = generate_sweep(&config.sweep, &config.cluster, &config.baseline)?;

    match out {
        Some(dir) if !dry_run => {
            let template = match template {
                Some(path) => std::fs::read_to_string(path)?,
                None => String::new(),
            };
            let written = write_submissions(&plan, &config.submission, &template, dir)?;
            println!();
            println!("Submission files:");
            println!("{:-<40}", "");
            for path in &written {
                println!("  {}", path.display());
            }
            println!("  Runs: {}", plan.configs().count());
        }
        _ => {
            for run in plan.configs() {
                println!("{}", render_submission_line(run));
            }
        }
    }

    let failures: Vec<(u32, &GridSweepError)> = plan.failures().collect();
    if failures.is_empty() {
        return Ok(());
    }
    eprintln!();
    eprintln!("Skipped node counts:");
    eprintln!("{:-<40}", "");
    for (node_count, error) in &failures {
        eprintln!("  {:<6} {}", node_count, error);
    }
    anyhow::bail!("{} node count(s) could not be generated", failures.len())
}

fn cmd_aggregate(
    config: &GridSweepConfig,
    results: &Path,
    out: Option<&Path>,
    kind: Option<&str>,
) -> Result<()> {
    let schema = match kind {
        Some(kind) => kind.parse::<SweepKind>()?.schema(),
        None => config.sweep.schema(),
    };
    let parser = LogParser::new(schema, config.cluster.gpus_per_node)?;
    let harvest = harvest_dir(results, &parser)?;
    let aggregation = aggregate(
        &harvest.records,
        config.analysis.reducer,
        config.analysis.expected_repeat_count,
    );

    match out {
        Some(path) => {
            let mut file = File::create(path)?;
            write_aggregate_table(&mut file, &aggregation.rows)?;
        }
        None => write_aggregate_table(&mut io::stdout().lock(), &aggregation.rows)?,
    }

    eprintln!();
    eprintln!("Harvest:");
    eprintln!("{:-<40}", "");
    eprintln!("  Records:       {}", harvest.records.len());
    eprintln!("  Rows:          {}", aggregation.rows.len());
    for (kind, count) in harvest.failure_counts() {
        eprintln!("  Skipped ({}): {}", kind, count);
    }
    if !aggregation.mismatches.is_empty() {
        eprintln!("  Count mismatches: {}", aggregation.mismatches.len());
        for m in &aggregation.mismatches {
            eprintln!(
                "    node {} {}x{} {} {} grid {}x{}: {} of {}",
                m.identity.node_count,
                m.identity.domain_x,
                m.identity.domain_y,
                m.identity.variant.label(),
                m.identity.dimensionality.label(),
                m.identity.grid_x,
                m.identity.grid_y,
                m.found,
                m.expected
            );
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct GroupReport {
    value: u64,
    geomean: Option<f64>,
    improvement_percent: Option<f64>,
    error: Option<String>,
}

#[derive(Serialize)]
struct ImprovementReport {
    axis: &'static str,
    framing: MetricFraming,
    groups: Vec<GroupReport>,
    summary: Option<ImprovementSummary>,
}

fn cmd_improve(
    config: &GridSweepConfig,
    table: &Path,
    axis: Option<&str>,
    framing: Option<&str>,
    output_format: &str,
) -> Result<()> {
    let axis = match axis {
        Some(a) => a.parse::<Axis>()?,
        None => config.analysis.axis,
    };
    let framing = match framing {
        Some(f) => f.parse::<MetricFraming>()?,
        None => config.analysis.framing,
    };
    let selection = &config.analysis.selection;

    let rows = read_aggregate_table(BufReader::new(File::open(table)?))?;
    let rows = apply_filter(&rows, &config.analysis.filter);

    let means = compute_geomean(&rows, axis, selection, framing)?;
    let samples: Vec<ImprovementSample> = pair_samples(&rows, selection, framing)
        .iter()
        .filter_map(PairedSample::sample)
        .collect();

    let report = ImprovementReport {
        axis: axis.label(),
        framing,
        groups: group_reports(means, framing),
        summary: summarize(&samples),
    };

    match output_format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "csv" => write_improvement_csv(io::stdout().lock(), &report)?,
        _ => print_improvement_table(&report),
    }

    Ok(())
}

fn write_improvement_csv<W: io::Write>(out: W, report: &ImprovementReport) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([report.axis, "geomean", "improvement_percent", "error"])?;
    for g in &report.groups {
        writer.write_record([
            g.value.to_string(),
            g.geomean.map(|v| format!("{:.6}", v)).unwrap_or_default(),
            g.improvement_percent
                .map(|v| format!("{:.2}", v))
                .unwrap_or_default(),
            g.error.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn group_reports(
    means: BTreeMap<u64, gridsweep_core::Result<f64>>,
    framing: MetricFraming,
) -> Vec<GroupReport> {
    means
        .into_iter()
        .map(|(value, mean)| match mean {
            Ok(g) => GroupReport {
                value,
                geomean: Some(g),
                improvement_percent: Some(framed_improvement_percent(g, framing)),
                error: None,
            },
            Err(e) => GroupReport {
                value,
                geomean: None,
                improvement_percent: None,
                error: Some(e.to_string()),
            },
        })
        .collect()
}

fn improvement_column(framing: MetricFraming) -> &'static str {
    match framing {
        MetricFraming::Throughput => "Throughput gain",
        MetricFraming::Runtime => "Time saved",
    }
}

fn print_improvement_table(report: &ImprovementReport) {
    println!();
    println!("Improvement by {} ({}):", report.axis, report.framing.label());
    println!("{:-<60}", "");
    println!(
        "  {:<12} {:<12} {}",
        report.axis,
        "Geomean",
        improvement_column(report.framing)
    );
    println!("{:-<60}", "");
    for g in &report.groups {
        match (g.geomean, g.improvement_percent) {
            (Some(mean), Some(pct)) => {
                println!("  {:<12} {:<12.4} {:+.2}%", g.value, mean, pct)
            }
            _ => println!(
                "  {:<12} {:<12} {}",
                g.value,
                "-",
                g.error.as_deref().unwrap_or("")
            ),
        }
    }
    println!("{:-<60}", "");
    match &report.summary {
        Some(s) => {
            println!("  Configurations: {}", s.count);
            println!(
                "  Geomean:        {:.4} ({:+.2}%)",
                s.geomean,
                framed_improvement_percent(s.geomean, report.framing)
            );
            println!("  Min:            {:.4}", s.min);
            println!("  Max:            {:.4}", s.max);
        }
        None => println!("  No complete configurations"),
    }
    println!();
}
