// Domain modules
pub mod analysis;
pub mod config;
pub mod error;
pub mod run;
pub mod schema;
pub mod variant;

pub use analysis::{
    AnalysisConfig, Axis, MetricFraming, PairSelection, Reducer, RowFilter, VariantSelector,
};
pub use config::{
    BaselineGridTable, ClusterConfig, GridSweepConfig, InterNodePolicy, SplitPolicy,
    SubmissionConfig, SweepConfig, TileScaling,
};
pub use error::{GridSweepError, Result};
pub use run::{
    AggregatedRow, ConfigKey, GridShape, ImprovementSample, LogRecord, RunConfig, RunIdentity,
};
pub use schema::{
    DimensionalityTags, Field, FieldKind, IdentitySchema, SweepKind, VariantTags,
};
pub use variant::{Dimensionality, Variant};
