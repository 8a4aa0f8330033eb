//! FILENAME: crosstab-engine/src/engine.rs
//! Pivot Engine - orchestrates dimension preparation, the single grouped
//! scan, and dense-grid assembly.
//!
//! Algorithm:
//! 1. Validate the dimension count (one or two axes, nothing else)
//! 2. Resolve the aggregation specification once
//! 3. Prepare each axis: categorical columns keep their distinct values,
//!    continuous columns are discretized through the binner
//! 4. Issue exactly one grouped-aggregation request to the data source
//! 5. Densify: every (row, col) label pair absent from the result gets
//!    the aggregation's default cell

use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::aggregate;
use crate::binning::{breakpoint_bins, equal_width_bins, sturges, Bin};
use crate::definition::{BinRule, DimensionKind, DimensionSpec, OutOfRange, PivotRequest};
use crate::error::PivotError;
use crate::matrix::PivotMatrix;
use crate::source::{AxisExpr, ColumnKind, DataSource, GroupRequest};

/// One axis after preparation: the grouping expression handed to the data
/// source and the ordered labels that will index the matrix.
struct PreparedDimension {
    expr: AxisExpr,
    labels: Vec<String>,
}

/// Computes a pivot matrix for the request against the given data source.
///
/// This is the main entry point of the crate. The call is synchronous and
/// owns no shared state; independent computations may run concurrently
/// against the same source. Identical requests against an unchanged source
/// yield identical matrices.
pub fn compute_pivot(
    source: &dyn DataSource,
    request: &PivotRequest,
) -> Result<PivotMatrix, PivotError> {
    let dim_count = request.dimensions.len();
    if dim_count == 0 || dim_count > 2 {
        return Err(PivotError::DimensionCount(dim_count));
    }

    let aggregate = aggregate::resolve(&request.aggregation, source)?;

    let row_dim = prepare_dimension(source, &request.dimensions[0])?;
    let col_dim = match request.dimensions.get(1) {
        Some(spec) => Some(prepare_dimension(source, spec)?),
        None => None,
    };

    let group_request = GroupRequest {
        row: row_dim.expr,
        col: col_dim.as_ref().map(|d| d.expr.clone()),
        aggregate: aggregate.clone(),
    };
    let grouped = source.group_aggregate(&group_request)?;
    debug!(
        "pivot scan returned {} groups for '{}'",
        grouped.len(),
        aggregate.label()
    );

    // A one-dimensional pivot collapses to a single column captioned with
    // the aggregate's display label.
    let col_labels = match &col_dim {
        Some(dim) => dim.labels.clone(),
        None => vec![aggregate.label()],
    };

    let mut matrix = PivotMatrix::filled(row_dim.labels, col_labels, aggregate.default_cell());

    let row_index: FxHashMap<&str, usize> = matrix
        .row_labels()
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();
    let col_index: FxHashMap<&str, usize> = matrix
        .col_labels()
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();

    let mut placements: Vec<(usize, usize, Option<f64>)> = Vec::with_capacity(grouped.len());
    for group in &grouped {
        let Some(&r) = row_index.get(group.row_label.as_str()) else {
            warn!("source returned unknown row group '{}'", group.row_label);
            continue;
        };
        let c = match (&group.col_label, col_dim.is_some()) {
            (None, false) => 0,
            (Some(label), true) => match col_index.get(label.as_str()) {
                Some(&c) => c,
                None => {
                    warn!("source returned unknown column group '{}'", label);
                    continue;
                }
            },
            _ => {
                warn!("source group keys do not match the requested axes");
                continue;
            }
        };
        placements.push((r, c, group.value));
    }
    for (r, c, value) in placements {
        matrix.set(r, c, value);
    }

    let (rows, cols) = matrix.shape();
    debug!("assembled {}x{} pivot matrix", rows, cols);
    Ok(matrix)
}

/// Prepares one axis: resolves its kind, produces the grouping expression
/// and the ordered axis labels.
fn prepare_dimension(
    source: &dyn DataSource,
    spec: &DimensionSpec,
) -> Result<PreparedDimension, PivotError> {
    let column_kind = source.column_kind(&spec.column).ok_or_else(|| {
        PivotError::Schema(format!("dimension column '{}' does not exist", spec.column))
    })?;

    let kind = spec.kind.unwrap_or(match column_kind {
        ColumnKind::Numeric => DimensionKind::Continuous,
        ColumnKind::Text | ColumnKind::Bool => DimensionKind::Categorical,
    });

    match kind {
        DimensionKind::Categorical => {
            let mut labels = source.distinct_labels(&spec.column)?;
            labels.sort();
            if let Some(order) = &spec.order {
                labels = apply_explicit_order(labels, order);
            }
            Ok(PreparedDimension {
                expr: AxisExpr::Column(spec.column.clone()),
                labels,
            })
        }

        DimensionKind::Continuous => {
            if column_kind != ColumnKind::Numeric {
                return Err(PivotError::Schema(format!(
                    "column '{}' is {:?} and cannot be binned as a continuous dimension",
                    spec.column, column_kind
                )));
            }
            let (bins, out_of_range) = build_bins(source, spec)?;
            let labels = bins.iter().map(|b| b.label()).collect();
            Ok(PreparedDimension {
                expr: AxisExpr::Binned {
                    column: spec.column.clone(),
                    bins,
                    out_of_range,
                },
                labels,
            })
        }
    }
}

/// Produces the bin sequence for a continuous dimension per its rule.
fn build_bins(
    source: &dyn DataSource,
    spec: &DimensionSpec,
) -> Result<(Vec<Bin>, OutOfRange), PivotError> {
    match &spec.bins {
        BinRule::Breakpoints {
            edges,
            out_of_range,
        } => Ok((breakpoint_bins(edges)?, *out_of_range)),

        rule => {
            let profile = source
                .numeric_profile(&spec.column)?
                .ok_or_else(|| PivotError::EmptyRange {
                    column: spec.column.clone(),
                })?;
            let count = match rule {
                BinRule::Fixed(k) => *k,
                _ => sturges(profile.count),
            };
            Ok((
                equal_width_bins(profile.min, profile.max, count),
                // Equal-width bins cover the observed range, so the policy
                // never fires; Exclude keeps drifted floats out of the grid.
                OutOfRange::Exclude,
            ))
        }
    }
}

/// Reorders categorical labels to a caller-supplied sequence; observed
/// categories missing from the sequence keep their lexicographic order at
/// the end.
fn apply_explicit_order(observed: Vec<String>, order: &[String]) -> Vec<String> {
    let observed_set: FxHashSet<&str> = observed.iter().map(String::as_str).collect();
    let ordered_set: FxHashSet<&str> = order.iter().map(String::as_str).collect();

    let mut labels: Vec<String> = order
        .iter()
        .filter(|l| observed_set.contains(l.as_str()))
        .cloned()
        .collect();
    labels.extend(
        observed
            .iter()
            .filter(|l| !ordered_set.contains(l.as_str()))
            .cloned(),
    );
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ResolvedAggregate;
    use crate::definition::{AggregationSpec, Statistic};
    use crate::error::SourceError;
    use crate::memory::{Datum, MemoryTable};
    use crate::source::{GroupedRow, NumericProfile};
    use std::sync::Mutex;

    /// category1 in {A,B,C}, category2 in {D,E}, score1 numeric.
    fn sample_table() -> MemoryTable {
        let mut table = MemoryTable::new(&["category1", "category2", "score1"]);
        let rows: &[(&str, &str, f64)] = &[
            ("A", "D", 1.0),
            ("A", "D", 3.0),
            ("A", "E", 5.0),
            ("B", "D", 2.0),
            ("B", "E", 4.0),
            ("B", "E", 6.0),
            ("C", "D", 7.0),
        ];
        for (c1, c2, s) in rows {
            table.push_row(vec![Datum::text(*c1), Datum::text(*c2), Datum::Number(*s)]);
        }
        table
    }

    #[test]
    fn test_two_categorical_count_grid_sums_to_record_count() {
        let table = sample_table();
        let request = PivotRequest::two(
            DimensionSpec::new("category1"),
            DimensionSpec::new("category2"),
        );
        let matrix = compute_pivot(&table, &request).unwrap();

        assert_eq!(matrix.row_labels(), ["A", "B", "C"]);
        assert_eq!(matrix.col_labels(), ["D", "E"]);
        assert_eq!(matrix.shape(), (3, 2));
        assert_eq!(matrix.total(), table.row_count() as f64);
        assert_eq!(matrix.value(0, 0), Some(2.0)); // A/D
        assert_eq!(matrix.value(2, 1), Some(0.0)); // C/E has no records
    }

    #[test]
    fn test_single_dimension_collapses_to_one_column() {
        let table = sample_table();
        let request = PivotRequest::one(DimensionSpec::new("category1"));
        let matrix = compute_pivot(&table, &request).unwrap();

        assert_eq!(matrix.shape(), (3, 1));
        assert_eq!(matrix.col_labels(), ["count"]);
        assert_eq!(matrix.value(0, 0), Some(3.0));
        assert_eq!(matrix.value(1, 0), Some(3.0));
        assert_eq!(matrix.value(2, 0), Some(1.0));
    }

    #[test]
    fn test_continuous_dimension_equal_width_bins() {
        let mut table = MemoryTable::new(&["x"]);
        for v in [1.0, 2.0, 4.5, 7.0, 9.5, 10.0] {
            table.push_row(vec![Datum::Number(v)]);
        }
        let request = PivotRequest::one(DimensionSpec::continuous("x", BinRule::Fixed(3)));
        let matrix = compute_pivot(&table, &request).unwrap();

        assert_eq!(matrix.row_labels(), ["[1; 4)", "[4; 7)", "[7; 10]"]);
        // 10.0 lands in the closed last bin.
        assert_eq!(matrix.value(2, 0), Some(3.0));
        assert_eq!(matrix.total(), 6.0);
    }

    #[test]
    fn test_auto_bin_rule_uses_sturges() {
        let mut table = MemoryTable::new(&["x"]);
        for i in 0..100 {
            table.push_row(vec![Datum::Number(i as f64)]);
        }
        let request = PivotRequest::one(DimensionSpec::new("x"));
        let matrix = compute_pivot(&table, &request).unwrap();
        assert_eq!(matrix.shape().0, sturges(100));
        assert_eq!(matrix.total(), 100.0);
    }

    #[test]
    fn test_median_per_category() {
        let table = sample_table();
        let request = PivotRequest::one(DimensionSpec::new("category1"))
            .with_aggregation(AggregationSpec::percentile(50, "score1"));
        let matrix = compute_pivot(&table, &request).unwrap();

        assert_eq!(matrix.shape(), (3, 1));
        assert_eq!(matrix.col_labels(), ["50%(score1)"]);
        assert_eq!(matrix.value(0, 0), Some(3.0)); // median of 1,3,5
        assert_eq!(matrix.value(1, 0), Some(4.0)); // median of 2,4,6
        assert_eq!(matrix.value(2, 0), Some(7.0));
    }

    #[test]
    fn test_missing_cells_use_missing_marker_for_non_count() {
        let table = sample_table();
        let request = PivotRequest::two(
            DimensionSpec::new("category1"),
            DimensionSpec::new("category2"),
        )
        .with_aggregation(AggregationSpec::statistic(Statistic::Average, "score1"));
        let matrix = compute_pivot(&table, &request).unwrap();

        // C/E has no records: missing marker, not zero.
        assert_eq!(matrix.value(2, 1), None);
        // C/D is present.
        assert_eq!(matrix.value(2, 0), Some(7.0));
    }

    #[test]
    fn test_idempotent_for_identical_requests() {
        let table = sample_table();
        let request = PivotRequest::two(
            DimensionSpec::new("category1"),
            DimensionSpec::continuous("score1", BinRule::Fixed(2)),
        )
        .with_aggregation(AggregationSpec::statistic(Statistic::Sum, "score1"));

        let first = compute_pivot(&table, &request).unwrap();
        let second = compute_pivot(&table, &request).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_dimension_count_is_bounded() {
        let table = sample_table();

        let empty = PivotRequest {
            dimensions: smallvec::SmallVec::new(),
            aggregation: AggregationSpec::default(),
        };
        assert_eq!(
            compute_pivot(&table, &empty),
            Err(PivotError::DimensionCount(0))
        );

        let three = PivotRequest {
            dimensions: smallvec::SmallVec::from_vec(vec![
                DimensionSpec::new("category1"),
                DimensionSpec::new("category2"),
                DimensionSpec::new("score1"),
            ]),
            aggregation: AggregationSpec::default(),
        };
        assert_eq!(
            compute_pivot(&table, &three),
            Err(PivotError::DimensionCount(3))
        );
    }

    #[test]
    fn test_unknown_dimension_column_is_schema_error() {
        let table = sample_table();
        let request = PivotRequest::one(DimensionSpec::new("nope"));
        assert!(matches!(
            compute_pivot(&table, &request),
            Err(PivotError::Schema(_))
        ));
    }

    #[test]
    fn test_continuous_on_text_column_is_schema_error() {
        let table = sample_table();
        let request =
            PivotRequest::one(DimensionSpec::continuous("category1", BinRule::Fixed(3)));
        assert!(matches!(
            compute_pivot(&table, &request),
            Err(PivotError::Schema(_))
        ));
    }

    #[test]
    fn test_all_null_continuous_column_is_empty_range() {
        let mut table = MemoryTable::new(&["x"]);
        table.push_row(vec![Datum::Null]);
        table.push_row(vec![Datum::Null]);
        let request = PivotRequest::one(DimensionSpec::continuous("x", BinRule::Auto));
        assert_eq!(
            compute_pivot(&table, &request),
            Err(PivotError::EmptyRange {
                column: "x".to_string()
            })
        );
    }

    #[test]
    fn test_explicit_categorical_order() {
        let table = sample_table();
        let mut dim = DimensionSpec::new("category1");
        dim.order = Some(vec!["C".to_string(), "A".to_string()]);
        let matrix = compute_pivot(&table, &PivotRequest::one(dim)).unwrap();
        // Listed labels first, the rest appended lexicographically.
        assert_eq!(matrix.row_labels(), ["C", "A", "B"]);
    }

    // ------------------------------------------------------------------
    // Stub sources for contract-level assertions
    // ------------------------------------------------------------------

    /// Records the grouped-scan request and returns no groups.
    struct RecordingSource {
        captured: Mutex<Option<GroupRequest>>,
    }

    impl RecordingSource {
        fn new() -> Self {
            RecordingSource {
                captured: Mutex::new(None),
            }
        }
    }

    impl DataSource for RecordingSource {
        fn column_kind(&self, column: &str) -> Option<ColumnKind> {
            match column {
                "category1" => Some(ColumnKind::Text),
                "score1" => Some(ColumnKind::Numeric),
                _ => None,
            }
        }

        fn numeric_profile(&self, _: &str) -> Result<Option<NumericProfile>, SourceError> {
            Ok(Some(NumericProfile {
                min: 0.0,
                max: 1.0,
                count: 2,
            }))
        }

        fn distinct_labels(&self, _: &str) -> Result<Vec<String>, SourceError> {
            Ok(vec!["A".to_string(), "B".to_string()])
        }

        fn group_aggregate(&self, request: &GroupRequest) -> Result<Vec<GroupedRow>, SourceError> {
            *self.captured.lock().unwrap() = Some(request.clone());
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_raw_expression_passes_through_verbatim() {
        let source = RecordingSource::new();
        let expr = "COUNT(score1) AS count_score";
        let request = PivotRequest::one(DimensionSpec::new("category1"))
            .with_aggregation(AggregationSpec::raw(expr));
        compute_pivot(&source, &request).unwrap();

        let captured = source.captured.lock().unwrap().take().unwrap();
        assert_eq!(
            captured.aggregate,
            ResolvedAggregate::Raw {
                expression: expr.to_string()
            }
        );
    }

    #[test]
    fn test_exactly_one_grouped_scan_per_computation() {
        struct CountingSource {
            inner: MemoryTable,
            scans: Mutex<usize>,
        }

        impl DataSource for CountingSource {
            fn column_kind(&self, column: &str) -> Option<ColumnKind> {
                self.inner.column_kind(column)
            }
            fn numeric_profile(&self, c: &str) -> Result<Option<NumericProfile>, SourceError> {
                self.inner.numeric_profile(c)
            }
            fn distinct_labels(&self, c: &str) -> Result<Vec<String>, SourceError> {
                self.inner.distinct_labels(c)
            }
            fn group_aggregate(
                &self,
                request: &GroupRequest,
            ) -> Result<Vec<GroupedRow>, SourceError> {
                *self.scans.lock().unwrap() += 1;
                self.inner.group_aggregate(request)
            }
        }

        let source = CountingSource {
            inner: sample_table(),
            scans: Mutex::new(0),
        };
        let request = PivotRequest::two(
            DimensionSpec::new("category1"),
            DimensionSpec::new("category2"),
        );
        compute_pivot(&source, &request).unwrap();
        assert_eq!(*source.scans.lock().unwrap(), 1);
    }

    #[test]
    fn test_cancellation_propagates_as_distinct_error() {
        struct CancelledSource;

        impl DataSource for CancelledSource {
            fn column_kind(&self, _: &str) -> Option<ColumnKind> {
                Some(ColumnKind::Text)
            }
            fn numeric_profile(&self, _: &str) -> Result<Option<NumericProfile>, SourceError> {
                Ok(None)
            }
            fn distinct_labels(&self, _: &str) -> Result<Vec<String>, SourceError> {
                Ok(vec!["A".to_string()])
            }
            fn group_aggregate(&self, _: &GroupRequest) -> Result<Vec<GroupedRow>, SourceError> {
                Err(SourceError::Cancelled)
            }
        }

        let request = PivotRequest::one(DimensionSpec::new("category1"));
        assert_eq!(
            compute_pivot(&CancelledSource, &request),
            Err(PivotError::External(SourceError::Cancelled))
        );
    }
}
