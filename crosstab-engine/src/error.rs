//! FILENAME: crosstab-engine/src/error.rs
//! Error types for the cross-tabulation core.

use thiserror::Error;

/// Failure reported by the external data source collaborator.
///
/// Cancellation and timeout are distinct variants so the engine can
/// propagate them without reinterpretation; a cancelled scan must never
/// degrade into a zero-filled matrix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("grouped scan was cancelled")]
    Cancelled,

    #[error("grouped scan timed out")]
    TimedOut,

    #[error("grouped scan failed: {0}")]
    Failed(String),
}

/// Errors surfaced by the pivot computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PivotError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("pivot requires one or two dimensions, got {0}")]
    DimensionCount(usize),

    #[error("invalid aggregation specification: {0}")]
    AggregationSpec(String),

    #[error("column '{column}' has no values to bin")]
    EmptyRange { column: String },

    #[error("invalid breakpoints: {0}")]
    InvalidBreakpoints(String),

    #[error("data source failure: {0}")]
    External(#[from] SourceError),
}
