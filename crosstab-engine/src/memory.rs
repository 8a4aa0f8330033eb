//! FILENAME: crosstab-engine/src/memory.rs
//! In-memory data source - a columnar table that executes the grouped
//! scan locally.
//!
//! This is the reference implementation of [`DataSource`], used by tests
//! and by embedders that hold their records in memory rather than behind
//! an external query engine. `group_aggregate` is a single pass over the
//! rows with per-group accumulators; raw aggregate expressions are
//! rejected because this source has no expression evaluator.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::aggregate::ResolvedAggregate;
use crate::binning::{bin_index, Bin};
use crate::definition::{OutOfRange, Statistic};
use crate::error::SourceError;
use crate::source::{AxisExpr, ColumnKind, DataSource, GroupRequest, GroupedRow, NumericProfile};

// ============================================================================
// VALUES
// ============================================================================

/// A single cell of the table.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Datum {
    pub fn text(s: impl Into<String>) -> Self {
        Datum::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Numeric view of the datum; `None` for nulls and text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Number(n) => Some(*n),
            Datum::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Display label used for categorical grouping. `None` for nulls.
    fn label(&self) -> Option<String> {
        match self {
            Datum::Null => None,
            Datum::Number(n) => Some(format!("{}", n)),
            Datum::Text(s) => Some(s.clone()),
            Datum::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        }
    }

    fn kind(&self) -> Option<ColumnKind> {
        match self {
            Datum::Null => None,
            Datum::Number(_) => Some(ColumnKind::Numeric),
            Datum::Text(_) => Some(ColumnKind::Text),
            Datum::Bool(_) => Some(ColumnKind::Bool),
        }
    }
}

// ============================================================================
// TABLE
// ============================================================================

/// A named-column, row-appended table.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    names: Vec<String>,
    columns: Vec<Vec<Datum>>,
    /// Kind of each column, settled by its first non-null datum.
    kinds: Vec<Option<ColumnKind>>,
    row_count: usize,
}

impl MemoryTable {
    pub fn new(column_names: &[&str]) -> Self {
        MemoryTable {
            names: column_names.iter().map(|s| s.to_string()).collect(),
            columns: vec![Vec::new(); column_names.len()],
            kinds: vec![None; column_names.len()],
            row_count: 0,
        }
    }

    /// Appends one record. The row must supply one datum per column.
    pub fn push_row(&mut self, row: Vec<Datum>) {
        assert_eq!(
            row.len(),
            self.names.len(),
            "row width must match column count"
        );
        for (i, datum) in row.into_iter().enumerate() {
            if self.kinds[i].is_none() {
                self.kinds[i] = datum.kind();
            }
            self.columns[i].push(datum);
        }
        self.row_count += 1;
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn column(&self, name: &str) -> Result<&[Datum], SourceError> {
        self.column_index(name)
            .map(|i| self.columns[i].as_slice())
            .ok_or_else(|| SourceError::Failed(format!("unknown column '{}'", name)))
    }

}

impl DataSource for MemoryTable {
    fn column_kind(&self, column: &str) -> Option<ColumnKind> {
        let i = self.column_index(column)?;
        self.kinds[i]
    }

    fn numeric_profile(&self, column: &str) -> Result<Option<NumericProfile>, SourceError> {
        let data = self.column(column)?;
        let mut profile: Option<NumericProfile> = None;
        for datum in data {
            if let Datum::Number(v) = datum {
                profile = Some(match profile {
                    None => NumericProfile {
                        min: *v,
                        max: *v,
                        count: 1,
                    },
                    Some(p) => NumericProfile {
                        min: p.min.min(*v),
                        max: p.max.max(*v),
                        count: p.count + 1,
                    },
                });
            }
        }
        Ok(profile)
    }

    fn distinct_labels(&self, column: &str) -> Result<Vec<String>, SourceError> {
        let data = self.column(column)?;
        let mut seen = FxHashSet::default();
        let mut labels = Vec::new();
        for datum in data {
            if let Some(label) = datum.label() {
                if seen.insert(label.clone()) {
                    labels.push(label);
                }
            }
        }
        Ok(labels)
    }

    fn group_aggregate(&self, request: &GroupRequest) -> Result<Vec<GroupedRow>, SourceError> {
        let input = AggregateInput::prepare(self, &request.aggregate)?;
        // Only quantiles need the full per-group value list.
        let keep_values = matches!(request.aggregate, ResolvedAggregate::Quantile { .. });

        let row_axis = PreparedAxis::prepare(self, &request.row)?;
        let col_axis = match &request.col {
            Some(expr) => Some(PreparedAxis::prepare(self, expr)?),
            None => None,
        };

        // One scan over all records; groups materialize in accumulators.
        let mut groups: FxHashMap<(String, Option<String>), Accumulator> = FxHashMap::default();
        for row in 0..self.row_count {
            let Some(row_label) = row_axis.label(row) else {
                continue;
            };
            let col_label = match &col_axis {
                Some(axis) => match axis.label(row) {
                    Some(label) => Some(label),
                    None => continue,
                },
                None => None,
            };

            let acc = groups
                .entry((row_label, col_label))
                .or_insert_with(|| Accumulator::new(keep_values));
            match &input {
                AggregateInput::RowCount => acc.bump(),
                AggregateInput::NonNullCount(data) => {
                    if !data[row].is_null() {
                        acc.bump();
                    }
                }
                AggregateInput::Numeric(data) => {
                    if let Datum::Number(v) = data[row] {
                        acc.update(v);
                    }
                }
            }
        }

        Ok(groups
            .into_iter()
            .map(|((row_label, col_label), acc)| GroupedRow {
                row_label,
                col_label,
                value: acc.finish(&request.aggregate),
            })
            .collect())
    }
}

/// Per-row input feeding the accumulators, fixed before the scan.
enum AggregateInput<'a> {
    RowCount,
    NonNullCount(&'a [Datum]),
    Numeric(&'a [Datum]),
}

impl<'a> AggregateInput<'a> {
    fn prepare(
        table: &'a MemoryTable,
        aggregate: &ResolvedAggregate,
    ) -> Result<Self, SourceError> {
        match aggregate {
            ResolvedAggregate::Statistic {
                stat: Statistic::Count,
                target: None,
            } => Ok(AggregateInput::RowCount),
            ResolvedAggregate::Statistic {
                stat: Statistic::Count,
                target: Some(col),
            } => Ok(AggregateInput::NonNullCount(table.column(col)?)),
            ResolvedAggregate::Statistic {
                target: Some(col), ..
            } => Ok(AggregateInput::Numeric(table.column(col)?)),
            ResolvedAggregate::Statistic { stat, target: None } => Err(SourceError::Failed(
                format!("statistic '{}' arrived without a target", stat.name()),
            )),
            ResolvedAggregate::Quantile { target, .. } => {
                Ok(AggregateInput::Numeric(table.column(target)?))
            }
            ResolvedAggregate::Raw { expression } => Err(SourceError::Failed(format!(
                "in-memory source cannot evaluate raw aggregate expression '{}'",
                expression
            ))),
        }
    }
}

/// An axis expression bound to its column data and precomputed bin labels.
struct PreparedAxis<'a> {
    data: &'a [Datum],
    binned: Option<(&'a [Bin], Vec<String>, OutOfRange)>,
}

impl<'a> PreparedAxis<'a> {
    fn prepare(table: &'a MemoryTable, expr: &'a AxisExpr) -> Result<Self, SourceError> {
        let data = table.column(expr.column())?;
        let binned = match expr {
            AxisExpr::Column(_) => None,
            AxisExpr::Binned {
                bins, out_of_range, ..
            } => Some((
                bins.as_slice(),
                bins.iter().map(|b| b.label()).collect(),
                *out_of_range,
            )),
        };
        Ok(PreparedAxis { data, binned })
    }

    /// Axis label of one record, or `None` when the record is excluded
    /// from the axis (null value, or outside explicit breakpoints).
    fn label(&self, row: usize) -> Option<String> {
        match &self.binned {
            None => self.data[row].label(),
            Some((bins, labels, policy)) => {
                let v = match self.data[row] {
                    Datum::Number(n) => n,
                    _ => return None,
                };
                bin_index(bins, v, *policy).map(|i| labels[i].clone())
            }
        }
    }
}

// ============================================================================
// ACCUMULATOR
// ============================================================================

/// Streaming aggregate state for one group.
#[derive(Debug, Clone)]
struct Accumulator {
    count: u64,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
    /// Populated only when a quantile needs the full value list.
    values: Option<Vec<f64>>,
}

impl Accumulator {
    fn new(keep_values: bool) -> Self {
        Accumulator {
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            values: if keep_values { Some(Vec::new()) } else { None },
        }
    }

    /// Counts an occurrence without a numeric value (count aggregations).
    fn bump(&mut self) {
        self.count += 1;
    }

    fn update(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.sum_sq += v * v;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        if let Some(values) = &mut self.values {
            values.push(v);
        }
    }

    /// Final aggregate value; `None` when the aggregate is undefined for
    /// the collected inputs (e.g. average of zero non-null values).
    fn finish(mut self, aggregate: &ResolvedAggregate) -> Option<f64> {
        match aggregate {
            ResolvedAggregate::Statistic { stat, .. } => match stat {
                Statistic::Count => Some(self.count as f64),
                Statistic::Sum if self.count > 0 => Some(self.sum),
                Statistic::Average if self.count > 0 => Some(self.sum / self.count as f64),
                Statistic::Min if self.count > 0 => Some(self.min),
                Statistic::Max if self.count > 0 => Some(self.max),
                Statistic::Variance if self.count > 1 => Some(self.sample_variance()),
                Statistic::StdDev if self.count > 1 => Some(self.sample_variance().sqrt()),
                _ => None,
            },
            ResolvedAggregate::Quantile { q, .. } => {
                let values = self.values.take()?;
                quantile(values, *q)
            }
            // prepare() already rejected Raw before the scan started.
            ResolvedAggregate::Raw { .. } => None,
        }
    }

    fn sample_variance(&self) -> f64 {
        let n = self.count as f64;
        (self.sum_sq - self.sum * self.sum / n) / (n - 1.0)
    }
}

/// Quantile with linear interpolation between closest ranks.
fn quantile(mut values: Vec<f64>, q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let h = (values.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(values[lo] + (h - lo as f64) * (values[hi] - values[lo]))
}
