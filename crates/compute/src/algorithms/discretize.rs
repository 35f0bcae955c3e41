//! Quartile binning of numeric metrics so they can take part in itemset
//! mining as categorical atoms.

use serde::{Deserialize, Serialize};
use tracing::debug;

use rulemine_core::Record;

/// Labels for the four quartile bins, lowest first.
pub const BIN_LABELS: [&str; 4] = ["low", "medium_low", "medium_high", "high"];

/// Fitted quartile cut points for one metric field.
///
/// Bins are (-inf, q1], (q1, q2], (q2, q3], (q3, inf).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBins {
    pub field: String,
    pub cuts: [f64; 3],
}

impl MetricBins {
    /// Fit cut points from the non-missing values of `field`.
    ///
    /// Returns `None` when fewer than two values are present.
    pub fn fit(records: &[Record], field: &str) -> Option<Self> {
        let mut values: Vec<f64> = records.iter().filter_map(|r| r.metric(field)).collect();
        if values.len() < 2 {
            debug!(field, observed = values.len(), "too few values to bin metric");
            return None;
        }
        values.sort_by(f64::total_cmp);

        let cuts = [
            quantile(&values, 0.25),
            quantile(&values, 0.5),
            quantile(&values, 0.75),
        ];
        Some(Self {
            field: field.to_owned(),
            cuts,
        })
    }

    pub fn label(&self, value: f64) -> &'static str {
        let idx = self.cuts.iter().position(|&c| value <= c).unwrap_or(3);
        BIN_LABELS[idx]
    }
}

/// Linear-interpolated quantile of pre-sorted, non-empty `sorted`.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
