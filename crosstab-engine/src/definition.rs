//! FILENAME: crosstab-engine/src/definition.rs
//! Pivot Request Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a pivot
//! computation. These structures are designed to be:
//! - Serializable (requests cross process/IPC boundaries)
//! - Immutable snapshots of caller intent
//! - Free of any reference to a concrete data source or renderer

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ============================================================================
// DIMENSIONS
// ============================================================================

/// How a dimension's source column is treated when building an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimensionKind {
    /// Distinct observed values become the axis categories.
    Categorical,
    /// Values are discretized into ordered bins before grouping.
    Continuous,
}

/// Policy for values falling outside explicit user-supplied breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutOfRange {
    /// Drop the record from this axis (default).
    #[default]
    Exclude,
    /// Fold the value into the first or last bin.
    Clamp,
}

/// How a continuous dimension is cut into bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum BinRule {
    /// Sturges' rule on the non-null observation count, clamped to [1, 64].
    #[default]
    Auto,
    /// A fixed number of equal-width bins over the observed range.
    Fixed(usize),
    /// Explicit breakpoints; bins are the intervals between consecutive edges.
    Breakpoints {
        edges: Vec<f64>,
        #[serde(default)]
        out_of_range: OutOfRange,
    },
}

/// One axis (row or column) of the pivot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    /// Name of the source column backing this axis.
    pub column: String,

    /// Explicit kind, or `None` to infer it from the column's value kind
    /// (numeric columns are continuous, everything else categorical).
    #[serde(default)]
    pub kind: Option<DimensionKind>,

    /// Binning policy, used only when the dimension is continuous.
    #[serde(default)]
    pub bins: BinRule,

    /// Explicit ordering for a categorical axis. Observed categories not
    /// listed here are appended in lexicographic order.
    #[serde(default)]
    pub order: Option<Vec<String>>,
}

impl DimensionSpec {
    pub fn new(column: impl Into<String>) -> Self {
        DimensionSpec {
            column: column.into(),
            kind: None,
            bins: BinRule::Auto,
            order: None,
        }
    }

    pub fn categorical(column: impl Into<String>) -> Self {
        DimensionSpec {
            kind: Some(DimensionKind::Categorical),
            ..DimensionSpec::new(column)
        }
    }

    pub fn continuous(column: impl Into<String>, bins: BinRule) -> Self {
        DimensionSpec {
            kind: Some(DimensionKind::Continuous),
            bins,
            ..DimensionSpec::new(column)
        }
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Built-in named statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Statistic {
    #[default]
    Count,
    Sum,
    Average,
    Min,
    Max,
    /// Sample standard deviation.
    StdDev,
    /// Sample variance.
    Variance,
}

impl Statistic {
    /// Lower-case name used in display labels ("count", "avg", ...).
    pub fn name(self) -> &'static str {
        match self {
            Statistic::Count => "count",
            Statistic::Sum => "sum",
            Statistic::Average => "avg",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::StdDev => "stddev",
            Statistic::Variance => "variance",
        }
    }
}

/// The cell-level summary computation, as a closed tagged choice.
///
/// The engine never branches on aggregation kind itself; the resolver in
/// `aggregate` turns this into a [`crate::aggregate::ResolvedAggregate`]
/// exactly once per computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AggregationSpec {
    /// A named statistic applied to an optional target column.
    /// Every statistic except `Count` requires a target.
    Statistic {
        stat: Statistic,
        #[serde(default)]
        of: Option<String>,
    },

    /// A percentile given as a literal integer in 1..=99 (50 means the
    /// 50th percentile), applied to a required target column.
    Percentile {
        value: u8,
        #[serde(default)]
        of: Option<String>,
    },

    /// An opaque aggregate expression evaluated verbatim by the data
    /// source. The resolver performs no validation; a syntax error
    /// surfaces later as an external computation failure.
    Raw { expression: String },
}

impl Default for AggregationSpec {
    fn default() -> Self {
        AggregationSpec::Statistic {
            stat: Statistic::Count,
            of: None,
        }
    }
}

impl AggregationSpec {
    pub fn statistic(stat: Statistic, of: impl Into<String>) -> Self {
        AggregationSpec::Statistic {
            stat,
            of: Some(of.into()),
        }
    }

    pub fn percentile(value: u8, of: impl Into<String>) -> Self {
        AggregationSpec::Percentile {
            value,
            of: Some(of.into()),
        }
    }

    pub fn raw(expression: impl Into<String>) -> Self {
        AggregationSpec::Raw {
            expression: expression.into(),
        }
    }
}

// ============================================================================
// MAIN REQUEST STRUCT
// ============================================================================

/// The complete, serializable description of one pivot computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRequest {
    /// One or two axes: the first is the row axis, the optional second the
    /// column axis. Any other count is rejected by the engine.
    pub dimensions: SmallVec<[DimensionSpec; 2]>,

    /// Cell aggregation; defaults to a plain record count.
    #[serde(default)]
    pub aggregation: AggregationSpec,
}

impl PivotRequest {
    /// A one-dimensional pivot (histogram-like) with the default count.
    pub fn one(row: DimensionSpec) -> Self {
        PivotRequest {
            dimensions: SmallVec::from_vec(vec![row]),
            aggregation: AggregationSpec::default(),
        }
    }

    /// A two-dimensional pivot with the default count.
    pub fn two(row: DimensionSpec, col: DimensionSpec) -> Self {
        PivotRequest {
            dimensions: SmallVec::from_vec(vec![row, col]),
            aggregation: AggregationSpec::default(),
        }
    }

    pub fn with_aggregation(mut self, aggregation: AggregationSpec) -> Self {
        self.aggregation = aggregation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_aggregation_is_count() {
        let request = PivotRequest::one(DimensionSpec::new("category1"));
        assert_eq!(
            request.aggregation,
            AggregationSpec::Statistic {
                stat: Statistic::Count,
                of: None
            }
        );
    }

    #[test]
    fn test_request_round_trips_through_json() {
        let request = PivotRequest::two(
            DimensionSpec::categorical("category1"),
            DimensionSpec::continuous("score1", BinRule::Fixed(3)),
        )
        .with_aggregation(AggregationSpec::percentile(50, "score2"));

        let json = serde_json::to_string(&request).unwrap();
        let back: PivotRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_breakpoints_default_policy_is_exclude() {
        let json = r#"{"Breakpoints":{"edges":[0.0,1.0,2.0]}}"#;
        let rule: BinRule = serde_json::from_str(json).unwrap();
        match rule {
            BinRule::Breakpoints { out_of_range, .. } => {
                assert_eq!(out_of_range, OutOfRange::Exclude);
            }
            other => panic!("unexpected rule: {:?}", other),
        }
    }
}
