//! FILENAME: crosstab-engine/src/lib.rs
//! Cross-tabulation (pivot) computation core.
//!
//! This crate groups a dataset along one or two dimensions, discretizes
//! continuous dimensions into bins, applies the requested aggregation per
//! cell, and emits a dense, dimension-agnostic matrix for any rendering
//! backend. It knows nothing about pixels, HTML, or how the data source
//! executes its grouped scan.
//!
//! Layers:
//! - `definition`: Serializable request configuration (what the pivot IS)
//! - `binning`: Interval computation for continuous dimensions
//! - `aggregate`: Resolution of aggregation specs into concrete computations
//! - `source`: The abstract grouped-aggregation collaborator contract
//! - `memory`: In-memory columnar data source (single-scan aggregation)
//! - `engine`: Orchestration and dense-grid assembly (HOW we calculate)
//! - `matrix`: The output grid (WHAT a renderer consumes)
//! - `render`: Renderer capability interface and deterministic fallback

pub mod aggregate;
pub mod binning;
pub mod definition;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod memory;
pub mod render;
pub mod source;

pub use aggregate::{resolve, ResolvedAggregate};
pub use binning::{breakpoint_bins, equal_width_bins, sturges, Bin};
pub use definition::{
    AggregationSpec, BinRule, DimensionKind, DimensionSpec, OutOfRange, PivotRequest, Statistic,
};
pub use engine::compute_pivot;
pub use error::{PivotError, SourceError};
pub use matrix::PivotMatrix;
pub use memory::{Datum, MemoryTable};
pub use render::{select_renderer, RenderError, RenderOptions, Renderer, TextGridRenderer};
pub use source::{AxisExpr, ColumnKind, DataSource, GroupRequest, GroupedRow, NumericProfile};
