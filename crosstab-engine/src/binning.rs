//! FILENAME: crosstab-engine/src/binning.rs
//! Binner - discretizes a continuous value range into ordered intervals.
//!
//! Bins are half-open `[lower, upper)` except the final bin, which is
//! closed on its upper bound so the observed maximum is never dropped by
//! floating-point boundary equality. A bin sequence always partitions the
//! observed range: no gaps, no overlaps, ascending order.

use serde::{Deserialize, Serialize};

use crate::definition::OutOfRange;
use crate::error::PivotError;

/// Hard ceiling on automatically derived bin counts.
pub const MAX_AUTO_BINS: usize = 64;

/// One interval of a discretized continuous axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    /// True for the final bin, whose upper bound is inclusive.
    pub closed_upper: bool,
}

impl Bin {
    /// Whether a value falls inside this interval.
    pub fn contains(&self, value: f64) -> bool {
        if self.closed_upper {
            value >= self.lower && value <= self.upper
        } else {
            value >= self.lower && value < self.upper
        }
    }

    /// Human-readable interval label, e.g. `"[3.1; 4.7)"` or `"[7; 10]"`.
    pub fn label(&self) -> String {
        let close = if self.closed_upper { ']' } else { ')' };
        format!(
            "[{}; {}{}",
            fmt_bound(self.lower),
            fmt_bound(self.upper),
            close
        )
    }
}

/// Shortest decimal rendering of a bound (4.0 prints as "4").
fn fmt_bound(v: f64) -> String {
    format!("{}", v)
}

/// Cuts `[min, max]` into `count` equal-width bins.
///
/// The final bin's upper bound is exactly `max` and closed. A constant
/// column (`min == max`) produces a single degenerate closed bin.
pub fn equal_width_bins(min: f64, max: f64, count: usize) -> Vec<Bin> {
    if min == max {
        return vec![Bin {
            lower: min,
            upper: max,
            closed_upper: true,
        }];
    }

    let count = count.max(1);
    let width = (max - min) / count as f64;
    let mut bins = Vec::with_capacity(count);

    for i in 0..count {
        let last = i == count - 1;
        bins.push(Bin {
            lower: min + i as f64 * width,
            // Anchor the last bound to max exactly; intermediate bounds
            // may carry floating-point drift but stay gap-free because
            // each bin reuses the previous upper as its lower.
            upper: if last { max } else { min + (i + 1) as f64 * width },
            closed_upper: last,
        });
    }

    // Re-seal any drift between consecutive bounds.
    for i in 1..bins.len() {
        let prev_upper = bins[i - 1].upper;
        bins[i].lower = prev_upper;
    }

    bins
}

/// Builds bins from explicit breakpoints.
///
/// Requires at least two strictly increasing edges; bins are the intervals
/// between consecutive edges, the last one closed.
pub fn breakpoint_bins(edges: &[f64]) -> Result<Vec<Bin>, PivotError> {
    if edges.len() < 2 {
        return Err(PivotError::InvalidBreakpoints(format!(
            "need at least 2 edges, got {}",
            edges.len()
        )));
    }
    for pair in edges.windows(2) {
        if !(pair[0] < pair[1]) {
            return Err(PivotError::InvalidBreakpoints(format!(
                "edges must be strictly increasing ({} then {})",
                pair[0], pair[1]
            )));
        }
    }

    let last = edges.len() - 2;
    Ok(edges
        .windows(2)
        .enumerate()
        .map(|(i, pair)| Bin {
            lower: pair[0],
            upper: pair[1],
            closed_upper: i == last,
        })
        .collect())
}

/// Default bin-count heuristic: Sturges' rule, `ceil(log2 n) + 1`,
/// clamped to `[1, MAX_AUTO_BINS]`.
pub fn sturges(observations: usize) -> usize {
    if observations <= 1 {
        return 1;
    }
    let k = (observations as f64).log2().ceil() as usize + 1;
    k.clamp(1, MAX_AUTO_BINS)
}

/// Maps a value to its bin index, honoring the out-of-range policy.
///
/// Returns `None` when the value falls outside the covered range and the
/// policy is `Exclude`.
pub fn bin_index(bins: &[Bin], value: f64, out_of_range: OutOfRange) -> Option<usize> {
    if bins.is_empty() {
        return None;
    }
    if value < bins[0].lower {
        return match out_of_range {
            OutOfRange::Clamp => Some(0),
            OutOfRange::Exclude => None,
        };
    }
    let last = bins.len() - 1;
    if value > bins[last].upper {
        return match out_of_range {
            OutOfRange::Clamp => Some(last),
            OutOfRange::Exclude => None,
        };
    }
    bins.iter().position(|b| b.contains(value))
}
