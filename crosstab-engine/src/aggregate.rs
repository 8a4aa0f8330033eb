//! FILENAME: crosstab-engine/src/aggregate.rs
//! Aggregation Resolver - turns an aggregation request into a concrete,
//! data-source-evaluable computation descriptor.
//!
//! Resolution happens exactly once per pivot computation; after this point
//! the engine carries an opaque [`ResolvedAggregate`] and never branches on
//! aggregation kind again.

use serde::{Deserialize, Serialize};

use crate::definition::{AggregationSpec, Statistic};
use crate::error::PivotError;
use crate::source::{ColumnKind, DataSource};

/// A concrete aggregate computation the data source can evaluate per group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResolvedAggregate {
    /// A conventional named statistic. `target` is `None` only for a plain
    /// record count.
    Statistic {
        stat: Statistic,
        target: Option<String>,
    },

    /// A quantile in (0, 1), e.g. 0.5 for the median.
    Quantile { q: f64, target: String },

    /// A caller-supplied expression, forwarded byte-for-byte.
    Raw { expression: String },
}

impl ResolvedAggregate {
    /// Display label, used as the column caption of one-dimensional pivots
    /// (e.g. "count", "avg(score1)", "50%(score1)").
    pub fn label(&self) -> String {
        match self {
            ResolvedAggregate::Statistic { stat, target: None } => stat.name().to_string(),
            ResolvedAggregate::Statistic {
                stat,
                target: Some(col),
            } => format!("{}({})", stat.name(), col),
            ResolvedAggregate::Quantile { q, target } => {
                format!("{}%({})", (q * 100.0).round() as u32, target)
            }
            ResolvedAggregate::Raw { expression } => expression.clone(),
        }
    }

    /// The dense-grid fill for a (row, col) pair with no observed records:
    /// zero for count-like aggregations, the missing marker otherwise.
    pub fn default_cell(&self) -> Option<f64> {
        match self {
            ResolvedAggregate::Statistic {
                stat: Statistic::Count,
                ..
            } => Some(0.0),
            _ => None,
        }
    }
}

/// Resolves an aggregation specification against the data source's schema.
///
/// Raw expressions bypass resolution entirely: they are not validated here,
/// and any syntax error surfaces later as an external computation failure.
pub fn resolve(
    spec: &AggregationSpec,
    source: &dyn DataSource,
) -> Result<ResolvedAggregate, PivotError> {
    match spec {
        AggregationSpec::Statistic { stat, of } => {
            let target = match of {
                Some(col) => Some(require_target(source, col, *stat != Statistic::Count)?),
                None if *stat == Statistic::Count => None,
                None => {
                    return Err(PivotError::AggregationSpec(format!(
                        "statistic '{}' requires a target column",
                        stat.name()
                    )))
                }
            };
            Ok(ResolvedAggregate::Statistic { stat: *stat, target })
        }

        AggregationSpec::Percentile { value, of } => {
            let p = *value;
            if p == 0 || p >= 100 {
                return Err(PivotError::AggregationSpec(format!(
                    "percentile must lie in the open interval (0, 100), got {}",
                    p
                )));
            }
            let target = match of {
                Some(col) => require_target(source, col, true)?,
                None => {
                    return Err(PivotError::AggregationSpec(
                        "percentile requires a target column".to_string(),
                    ))
                }
            };
            Ok(ResolvedAggregate::Quantile {
                q: f64::from(p) / 100.0,
                target,
            })
        }

        AggregationSpec::Raw { expression } => Ok(ResolvedAggregate::Raw {
            expression: expression.clone(),
        }),
    }
}

/// Checks that a target column exists and, when required, is numeric.
fn require_target(
    source: &dyn DataSource,
    column: &str,
    numeric: bool,
) -> Result<String, PivotError> {
    match source.column_kind(column) {
        None => Err(PivotError::Schema(format!(
            "target column '{}' does not exist",
            column
        ))),
        Some(ColumnKind::Numeric) => Ok(column.to_string()),
        Some(_) if !numeric => Ok(column.to_string()),
        Some(kind) => Err(PivotError::Schema(format!(
            "target column '{}' is {:?}, expected a numeric column",
            column, kind
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Datum, MemoryTable};

    fn sample_source() -> MemoryTable {
        let mut table = MemoryTable::new(&["category1", "score1"]);
        table.push_row(vec![Datum::text("A"), Datum::Number(1.0)]);
        table.push_row(vec![Datum::text("B"), Datum::Number(2.0)]);
        table
    }

    #[test]
    fn test_named_statistics_map_one_to_one() {
        let source = sample_source();
        let resolved = resolve(
            &AggregationSpec::statistic(Statistic::Average, "score1"),
            &source,
        )
        .unwrap();
        assert_eq!(
            resolved,
            ResolvedAggregate::Statistic {
                stat: Statistic::Average,
                target: Some("score1".to_string()),
            }
        );
        assert_eq!(resolved.label(), "avg(score1)");
    }

    #[test]
    fn test_count_needs_no_target() {
        let source = sample_source();
        let resolved = resolve(&AggregationSpec::default(), &source).unwrap();
        assert_eq!(resolved.label(), "count");
        assert_eq!(resolved.default_cell(), Some(0.0));
    }

    #[test]
    fn test_statistic_without_target_is_rejected() {
        let source = sample_source();
        let spec = AggregationSpec::Statistic {
            stat: Statistic::Sum,
            of: None,
        };
        assert!(matches!(
            resolve(&spec, &source),
            Err(PivotError::AggregationSpec(_))
        ));
    }

    #[test]
    fn test_percentile_maps_to_quantile() {
        let source = sample_source();
        let resolved = resolve(&AggregationSpec::percentile(50, "score1"), &source).unwrap();
        assert_eq!(
            resolved,
            ResolvedAggregate::Quantile {
                q: 0.5,
                target: "score1".to_string(),
            }
        );
        assert_eq!(resolved.label(), "50%(score1)");
        assert_eq!(resolved.default_cell(), None);
    }

    #[test]
    fn test_percentile_bounds_are_open() {
        let source = sample_source();
        for p in [0, 100, 250] {
            let spec = AggregationSpec::Percentile {
                value: p.min(255) as u8,
                of: Some("score1".to_string()),
            };
            assert!(matches!(
                resolve(&spec, &source),
                Err(PivotError::AggregationSpec(_))
            ));
        }
        assert!(resolve(&AggregationSpec::percentile(1, "score1"), &source).is_ok());
        assert!(resolve(&AggregationSpec::percentile(99, "score1"), &source).is_ok());
    }

    #[test]
    fn test_percentile_on_text_column_is_schema_error() {
        let source = sample_source();
        assert!(matches!(
            resolve(&AggregationSpec::percentile(50, "category1"), &source),
            Err(PivotError::Schema(_))
        ));
    }

    #[test]
    fn test_unknown_target_is_schema_error() {
        let source = sample_source();
        assert!(matches!(
            resolve(&AggregationSpec::statistic(Statistic::Max, "nope"), &source),
            Err(PivotError::Schema(_))
        ));
    }

    #[test]
    fn test_raw_expression_is_untouched() {
        let source = sample_source();
        let expr = "COUNT(score1) AS count_score";
        let resolved = resolve(&AggregationSpec::raw(expr), &source).unwrap();
        assert_eq!(
            resolved,
            ResolvedAggregate::Raw {
                expression: expr.to_string(),
            }
        );
        assert_eq!(resolved.label(), expr);
        // Raw results default to the missing marker, not zero.
        assert_eq!(resolved.default_cell(), None);
    }
}
