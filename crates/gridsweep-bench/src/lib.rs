pub mod aggregator;
pub mod factorization;
pub mod harvest;
pub mod metrics;
pub mod parser;
pub mod submission;
pub mod sweep;
pub mod table;

pub use aggregator::{aggregate, Aggregation, CountMismatch};
pub use factorization::{compute_best_factor_pair, power_of_two_pairs};
pub use harvest::{harvest_dir, harvest_files, Harvest, HarvestFailure};
pub use metrics::{
    apply_filter, compute_geomean, framed_improvement_percent, geometric_mean, improvement_percent,
    pair_samples, summarize, ImprovementSummary, PairedSample,
};
pub use parser::LogParser;
pub use submission::{render_submission_line, submission_file_name, write_submissions};
pub use sweep::{compute_domain, generate_sweep, tile_current, NodeSweep, SweepPlan};
pub use table::{read_aggregate_table, write_aggregate_table};
