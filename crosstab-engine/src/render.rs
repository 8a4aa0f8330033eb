//! FILENAME: crosstab-engine/src/render.rs
//! Renderer seam - the capability interface between a pivot matrix and
//! whatever draws it.
//!
//! The matrix itself is backend-agnostic; a backend declares what it can
//! draw through `supports`, and `select_renderer` walks a caller-supplied
//! order deterministically. There is no ambient "current backend" state:
//! the renderer list and options are explicit values.

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matrix::PivotMatrix;

/// Free-form layout parameters handed to a backend. Backends ignore what
/// they do not understand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RenderOptions {
    pub title: Option<String>,
    pub width_hint: Option<u32>,
    pub height_hint: Option<u32>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("renderer cannot draw this matrix: {0}")]
    Unsupported(String),
}

/// A rendering backend. Renderers read the matrix; they never recompute
/// aggregates or mutate it.
pub trait Renderer {
    fn name(&self) -> &str;

    /// Whether this backend can draw a matrix of this shape/configuration.
    fn supports(&self, matrix: &PivotMatrix, options: &RenderOptions) -> bool;

    fn render(&self, matrix: &PivotMatrix, options: &RenderOptions) -> Result<String, RenderError>;
}

/// Picks the first renderer in the given order that supports the matrix.
/// Skipped backends are logged; the order is the deterministic fallback
/// chain.
pub fn select_renderer<'a>(
    renderers: &'a [Box<dyn Renderer>],
    matrix: &PivotMatrix,
    options: &RenderOptions,
) -> Option<&'a dyn Renderer> {
    for renderer in renderers {
        if renderer.supports(matrix, options) {
            return Some(renderer.as_ref());
        }
        warn!(
            "renderer '{}' does not support a {:?} matrix, trying next",
            renderer.name(),
            matrix.shape()
        );
    }
    None
}

// ============================================================================
// TEXT GRID RENDERER
// ============================================================================

/// Plain aligned-text table. Accepts any dense matrix, which makes it the
/// natural last entry of a fallback chain.
#[derive(Debug, Default)]
pub struct TextGridRenderer;

impl TextGridRenderer {
    fn cell_text(value: Option<f64>) -> String {
        match value {
            Some(v) => format!("{}", v),
            None => "-".to_string(),
        }
    }
}

impl Renderer for TextGridRenderer {
    fn name(&self) -> &str {
        "text-grid"
    }

    fn supports(&self, _: &PivotMatrix, _: &RenderOptions) -> bool {
        true
    }

    fn render(&self, matrix: &PivotMatrix, options: &RenderOptions) -> Result<String, RenderError> {
        let (rows, cols) = matrix.shape();

        // Column widths: header vs. widest cell in each column.
        let mut widths: Vec<usize> = matrix.col_labels().iter().map(|l| l.len()).collect();
        let row_header_width = matrix
            .row_labels()
            .iter()
            .map(|l| l.len())
            .max()
            .unwrap_or(0);
        for r in 0..rows {
            for c in 0..cols {
                widths[c] = widths[c].max(Self::cell_text(matrix.value(r, c)).len());
            }
        }

        let mut out = String::new();
        if let Some(title) = &options.title {
            out.push_str(title);
            out.push('\n');
        }

        out.push_str(&" ".repeat(row_header_width));
        for (c, label) in matrix.col_labels().iter().enumerate() {
            out.push_str("  ");
            out.push_str(&format!("{:>width$}", label, width = widths[c]));
        }
        out.push('\n');

        for r in 0..rows {
            out.push_str(&format!(
                "{:<width$}",
                matrix.row_labels()[r],
                width = row_header_width
            ));
            for c in 0..cols {
                out.push_str("  ");
                out.push_str(&format!(
                    "{:>width$}",
                    Self::cell_text(matrix.value(r, c)),
                    width = widths[c]
                ));
            }
            out.push('\n');
        }

        Ok(out)
    }
}
