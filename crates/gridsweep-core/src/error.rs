use thiserror::Error;

use crate::Field;

#[derive(Error, Debug)]
pub enum GridSweepError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No baseline grid for {node_count} node(s) ({gpus} GPUs)")]
    MissingBaseline { node_count: u32, gpus: u32 },

    #[error("Malformed log name: {0}")]
    MalformedName(String),

    #[error("Inconsistent encoding of {field}: {first} vs {second}")]
    InconsistentEncoding { field: Field, first: u64, second: u64 },

    #[error("Invalid run identity: {0}")]
    InvalidIdentity(String),

    #[error("Content parse failure: {0}")]
    ContentParseFailure(String),

    #[error("Invalid measurement: {0}")]
    InvalidMeasurement(String),

    #[error("Incomplete pair: {0}")]
    IncompletePair(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl GridSweepError {
    /// Stable short name, used when tallying failures.
    pub fn kind(&self) -> &'static str {
        match self {
            GridSweepError::InvalidArgument(_) => "invalid_argument",
            GridSweepError::MissingBaseline { .. } => "missing_baseline",
            GridSweepError::MalformedName(_) => "malformed_name",
            GridSweepError::InconsistentEncoding { .. } => "inconsistent_encoding",
            GridSweepError::InvalidIdentity(_) => "invalid_identity",
            GridSweepError::ContentParseFailure(_) => "content_parse_failure",
            GridSweepError::InvalidMeasurement(_) => "invalid_measurement",
            GridSweepError::IncompletePair(_) => "incomplete_pair",
            GridSweepError::Io(_) => "io",
            GridSweepError::Json(_) => "json",
            GridSweepError::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, GridSweepError>;
