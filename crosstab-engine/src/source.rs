//! FILENAME: crosstab-engine/src/source.rs
//! Data source contract - the abstract collaborator that executes one
//! grouped-aggregation scan per pivot computation.
//!
//! The engine assumes nothing about how the source is implemented, only
//! that grouping and aggregation happen on the source's side of the seam
//! and come back as materialized `(row key, col key, value)` rows.

use serde::{Deserialize, Serialize};

use crate::aggregate::ResolvedAggregate;
use crate::binning::Bin;
use crate::definition::OutOfRange;
use crate::error::SourceError;

/// Declared value kind of a source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Text,
    Bool,
}

/// Observed numeric extent of a column, over non-null values only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericProfile {
    pub min: f64,
    pub max: f64,
    /// Number of non-null observations.
    pub count: usize,
}

/// One axis of the grouped scan: a raw column, or a column discretized
/// through a precomputed bin sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AxisExpr {
    Column(String),
    Binned {
        column: String,
        bins: Vec<Bin>,
        out_of_range: OutOfRange,
    },
}

impl AxisExpr {
    pub fn column(&self) -> &str {
        match self {
            AxisExpr::Column(name) => name,
            AxisExpr::Binned { column, .. } => column,
        }
    }
}

/// The single grouped-aggregation request issued per pivot computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRequest {
    pub row: AxisExpr,
    pub col: Option<AxisExpr>,
    pub aggregate: ResolvedAggregate,
}

/// One group of the scan result. `col_label` is `None` for one-dimensional
/// requests. `value` is `None` when the aggregate is undefined for the
/// group (e.g. average over zero non-null targets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedRow {
    pub row_label: String,
    pub col_label: Option<String>,
    pub value: Option<f64>,
}

/// A dataset that can answer schema questions and execute grouped
/// aggregation server-side.
///
/// Implementations must compute `group_aggregate` as one aggregated scan;
/// the engine never issues per-cell queries. Sources are `Sync` so callers
/// may run independent pivot computations concurrently against one source.
pub trait DataSource: Sync {
    /// Declared kind of a column, or `None` if the column does not exist.
    fn column_kind(&self, column: &str) -> Option<ColumnKind>;

    /// Min/max/count over the non-null values of a numeric column.
    /// `Ok(None)` means the column holds no non-null observations.
    fn numeric_profile(&self, column: &str) -> Result<Option<NumericProfile>, SourceError>;

    /// Distinct observed values of a column, rendered as display labels,
    /// in no particular order.
    fn distinct_labels(&self, column: &str) -> Result<Vec<String>, SourceError>;

    /// Executes the grouped aggregation and returns one row per observed
    /// group. Groups with no rows are simply absent; densification is the
    /// engine's job.
    fn group_aggregate(&self, request: &GroupRequest) -> Result<Vec<GroupedRow>, SourceError>;
}
