//! FILENAME: crosstab-engine/src/matrix.rs
//! Pivot Matrix - the dimension-agnostic output of a pivot computation.
//!
//! Row labels, column labels, and a dense 2-D grid aligned by index.
//! The structure is read-only to renderers: a renderer may re-label axes
//! or re-color cells, but changing any aggregation parameter means a fresh
//! engine call, never an in-place edit.

use serde::{Deserialize, Serialize};

/// A dense cross-tabulation grid with its axis labels.
///
/// Invariant: `grid.len() == row_labels.len()` and every row has exactly
/// `col_labels.len()` cells. `None` is the missing-value marker for cells
/// whose bin combination had no observed records under a non-count
/// aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotMatrix {
    row_labels: Vec<String>,
    col_labels: Vec<String>,
    grid: Vec<Vec<Option<f64>>>,
}

impl PivotMatrix {
    /// Creates a dense matrix with every cell set to `fill`.
    pub fn filled(row_labels: Vec<String>, col_labels: Vec<String>, fill: Option<f64>) -> Self {
        let grid = vec![vec![fill; col_labels.len()]; row_labels.len()];
        PivotMatrix {
            row_labels,
            col_labels,
            grid,
        }
    }

    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    pub fn col_labels(&self) -> &[String] {
        &self.col_labels
    }

    /// `(rows, cols)` dimensions of the grid.
    pub fn shape(&self) -> (usize, usize) {
        (self.row_labels.len(), self.col_labels.len())
    }

    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.grid[row][col]
    }

    pub fn row(&self, row: usize) -> &[Option<f64>] {
        &self.grid[row]
    }

    pub fn grid(&self) -> &[Vec<Option<f64>>] {
        &self.grid
    }

    /// Sum of all present cells (missing cells contribute nothing).
    pub fn total(&self) -> f64 {
        self.grid
            .iter()
            .flat_map(|row| row.iter().flatten())
            .sum()
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, value: Option<f64>) {
        self.grid[row][col] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filled_matrix_is_dense() {
        let m = PivotMatrix::filled(
            vec!["A".into(), "B".into(), "C".into()],
            vec!["D".into(), "E".into()],
            Some(0.0),
        );
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m.grid().len(), 3);
        for row in m.grid() {
            assert_eq!(row.len(), 2);
        }
        assert_eq!(m.total(), 0.0);
    }

    #[test]
    fn test_missing_marker_is_distinct_from_zero() {
        let mut m = PivotMatrix::filled(vec!["r".into()], vec!["c".into()], None);
        assert_eq!(m.value(0, 0), None);
        m.set(0, 0, Some(0.0));
        assert_eq!(m.value(0, 0), Some(0.0));
    }
}
