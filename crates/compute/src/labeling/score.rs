use serde::{Deserialize, Serialize};

use rulemine_core::{RiskThresholds, ScoreWeights};

/// Scores are snapped to this many steps per unit so that sums of the
/// configured weights land exactly on tier boundaries.
const SCORE_RESOLUTION: f64 = 1e9;

/// Discrete risk tier derived from a record's anomaly score and match state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskCategory {
    /// No rule's antecedent matched the record.
    Unmatched,
    Compliant,
    LowRisk,
    MediumRisk,
    HighRisk,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 5] = [
        RiskCategory::Unmatched,
        RiskCategory::Compliant,
        RiskCategory::LowRisk,
        RiskCategory::MediumRisk,
        RiskCategory::HighRisk,
    ];

    /// Classify a final score.
    ///
    /// Tier upper bounds are inclusive: a score equal to `low_max` is low risk.
    pub fn classify(score: f64, matched_any: bool, thresholds: &RiskThresholds) -> Self {
        if !matched_any {
            RiskCategory::Unmatched
        } else if score <= 0.0 {
            RiskCategory::Compliant
        } else if score <= thresholds.low_max {
            RiskCategory::LowRisk
        } else if score <= thresholds.medium_max {
            RiskCategory::MediumRisk
        } else {
            RiskCategory::HighRisk
        }
    }

    /// Low, medium and high risk records count as anomalies.
    pub fn is_anomalous(self) -> bool {
        matches!(
            self,
            RiskCategory::LowRisk | RiskCategory::MediumRisk | RiskCategory::HighRisk
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskCategory::Unmatched => "unmatched",
            RiskCategory::Compliant => "compliant",
            RiskCategory::LowRisk => "low-risk",
            RiskCategory::MediumRisk => "medium-risk",
            RiskCategory::HighRisk => "high-risk",
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite anomaly score for one record, floored at zero.
pub fn anomaly_score(
    violations: usize,
    anomaly_flags: usize,
    satisfied: usize,
    weights: &ScoreWeights,
) -> f64 {
    let raw = violations as f64 * weights.violation + anomaly_flags as f64 * weights.anomaly_flag
        - satisfied as f64 * weights.satisfied_reward;
    snap(raw.max(0.0))
}

fn snap(score: f64) -> f64 {
    (score * SCORE_RESOLUTION).round() / SCORE_RESOLUTION
}
