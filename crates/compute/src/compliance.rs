//! Per-rule conformance over labeled records and dataset-level anomaly summary.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rulemine_core::ComplianceConfig;

use crate::algorithms::apriori::{format_atoms, Atom};
use crate::algorithms::rules::Rule;
use crate::labeling::{LabeledRecord, RiskCategory};

/// Violation patterns kept in the report.
const TOP_PATTERNS: usize = 10;
/// Values kept per field in the anomaly distribution.
const TOP_VALUES: usize = 5;

/// Classification of a rule by how well the data conforms to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleBucket {
    Effective,
    HighViolation,
    LowConfidence,
}

/// Observed conformance of one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCompliance {
    pub rule_id: String,
    pub rule: String,
    pub expected_confidence: f64,
    /// `complete_count / antecedent_match_count`. `None` when no record matched.
    pub actual_confidence: Option<f64>,
    /// `expected_confidence - actual_confidence`.
    pub confidence_gap: Option<f64>,
    pub support: f64,
    pub lift: f64,
    pub antecedent_match_count: usize,
    pub complete_count: usize,
    pub violation_count: usize,
    /// Zero when no record matched the antecedent.
    pub violation_rate: f64,
    pub buckets: Vec<RuleBucket>,
}

impl RuleCompliance {
    pub fn in_bucket(&self, bucket: RuleBucket) -> bool {
        self.buckets.contains(&bucket)
    }
}

/// Rule ids grouped by bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub effective_rules: Vec<String>,
    pub high_violation_rules: Vec<String>,
    pub low_confidence_rules: Vec<String>,
    /// Rules whose antecedent matched no record.
    pub unexercised_rules: Vec<String>,
}

/// How often one antecedent/consequent pair was violated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationPattern {
    pub rule_id: String,
    pub antecedent: Vec<Atom>,
    pub consequent: Vec<Atom>,
    pub pattern: String,
    pub count: usize,
    /// `count / anomaly_count`.
    pub rate: f64,
}

/// Share of anomalous records carrying one field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueShare {
    pub value: String,
    pub count: usize,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub total_rules: usize,
    pub total_records: usize,
    pub rule_details: Vec<RuleCompliance>,
    pub summary: ComplianceSummary,
    pub anomaly_count: usize,
    /// `anomaly_count / total_records`.
    pub anomaly_rate: f64,
    /// Records per risk category, every category present.
    pub category_counts: IndexMap<String, usize>,
    /// Most common values per dimension field among anomalous records.
    pub anomaly_distribution: IndexMap<String, Vec<ValueShare>>,
    pub common_violation_patterns: Vec<ViolationPattern>,
    pub high_risk_records: Vec<String>,
    pub data_quality_warnings: usize,
}

/// Builds a [`ComplianceReport`] from labeled records.
pub struct ComplianceReporter<'a> {
    config: &'a ComplianceConfig,
    fields: Vec<String>,
}

impl<'a> ComplianceReporter<'a> {
    pub fn new(config: &'a ComplianceConfig) -> Self {
        Self {
            config,
            fields: Vec::new(),
        }
    }

    /// Dimension fields summarized in the anomaly distribution.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = String>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }

    pub fn report(&self, labeled: &[LabeledRecord], rules: &[Rule]) -> ComplianceReport {
        let mut matches: HashMap<&str, (usize, usize)> = HashMap::new();
        for record in labeled {
            for id in &record.rule_labels {
                matches.entry(id.as_str()).or_default().0 += 1;
            }
            for id in &record.rule_violations {
                matches.entry(id.as_str()).or_default().1 += 1;
            }
        }

        let rule_details: Vec<RuleCompliance> = rules
            .iter()
            .map(|rule| {
                let (complete, violated) =
                    matches.get(rule.id.as_str()).copied().unwrap_or_default();
                self.rule_compliance(rule, complete, violated)
            })
            .collect();

        let mut summary = ComplianceSummary::default();
        for detail in &rule_details {
            if detail.antecedent_match_count == 0 {
                summary.unexercised_rules.push(detail.rule_id.clone());
            }
            for bucket in &detail.buckets {
                let ids = match bucket {
                    RuleBucket::Effective => &mut summary.effective_rules,
                    RuleBucket::HighViolation => &mut summary.high_violation_rules,
                    RuleBucket::LowConfidence => &mut summary.low_confidence_rules,
                };
                ids.push(detail.rule_id.clone());
            }
        }

        let total_records = labeled.len();
        let anomalous: Vec<&LabeledRecord> = labeled.iter().filter(|r| r.is_anomalous()).collect();
        let anomaly_count = anomalous.len();

        let mut category_counts: IndexMap<String, usize> = RiskCategory::ALL
            .iter()
            .map(|c| (c.as_str().to_string(), 0))
            .collect();
        for record in labeled {
            *category_counts
                .entry(record.risk_category.as_str().to_string())
                .or_default() += 1;
        }

        let report = ComplianceReport {
            total_rules: rules.len(),
            total_records,
            summary,
            anomaly_count,
            anomaly_rate: ratio(anomaly_count, total_records),
            category_counts,
            anomaly_distribution: self.anomaly_distribution(&anomalous),
            common_violation_patterns: violation_patterns(labeled, rules, anomaly_count),
            high_risk_records: labeled
                .iter()
                .filter(|r| r.risk_category == RiskCategory::HighRisk)
                .map(|r| r.record.id.clone())
                .collect(),
            data_quality_warnings: labeled.iter().map(|r| r.warnings.len()).sum(),
            rule_details,
        };

        debug!(
            rules = report.total_rules,
            effective = report.summary.effective_rules.len(),
            high_violation = report.summary.high_violation_rules.len(),
            low_confidence = report.summary.low_confidence_rules.len(),
            anomalies = report.anomaly_count,
            "compliance report built"
        );
        report
    }

    fn rule_compliance(&self, rule: &Rule, complete: usize, violated: usize) -> RuleCompliance {
        let matched = complete + violated;
        let actual_confidence = (matched > 0).then(|| ratio(complete, matched));
        let violation_rate = ratio(violated, matched);

        let buckets = match actual_confidence {
            None => Vec::new(),
            Some(actual) => self.classify(rule.confidence, actual, violation_rate),
        };

        RuleCompliance {
            rule_id: rule.id.clone(),
            rule: rule.describe(),
            expected_confidence: rule.confidence,
            actual_confidence,
            confidence_gap: actual_confidence.map(|actual| rule.confidence - actual),
            support: rule.support,
            lift: rule.lift,
            antecedent_match_count: matched,
            complete_count: complete,
            violation_count: violated,
            violation_rate,
            buckets,
        }
    }

    /// `effective` stands alone; the other two buckets may overlap.
    fn classify(&self, expected: f64, actual: f64, violation_rate: f64) -> Vec<RuleBucket> {
        let c = self.config;
        if violation_rate < c.effective_max_violation_rate
            && actual >= c.effective_min_confidence_ratio * expected
        {
            return vec![RuleBucket::Effective];
        }
        let mut buckets = Vec::new();
        if violation_rate > c.high_violation_rate {
            buckets.push(RuleBucket::HighViolation);
        }
        if actual < c.low_confidence_ratio * expected {
            buckets.push(RuleBucket::LowConfidence);
        }
        buckets
    }

    fn anomaly_distribution(
        &self,
        anomalous: &[&LabeledRecord],
    ) -> IndexMap<String, Vec<ValueShare>> {
        let total = anomalous.len();
        let mut distribution = IndexMap::new();
        if total == 0 {
            return distribution;
        }

        for field in &self.fields {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for record in anomalous {
                if let Some(value) = record.record.dimension(field) {
                    *counts.entry(value).or_default() += 1;
                }
            }
            let mut shares: Vec<ValueShare> = counts
                .into_iter()
                .map(|(value, count)| ValueShare {
                    value: value.to_string(),
                    count,
                    share: ratio(count, total),
                })
                .collect();
            shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
            shares.truncate(TOP_VALUES);
            distribution.insert(field.clone(), shares);
        }
        distribution
    }
}

/// Count violations per antecedent/consequent pair, most frequent first.
/// Ties keep rule order.
fn violation_patterns(
    labeled: &[LabeledRecord],
    rules: &[Rule],
    anomaly_count: usize,
) -> Vec<ViolationPattern> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in labeled {
        for flag in &record.anomaly_flags {
            *counts.entry(flag.rule_id.as_str()).or_default() += 1;
        }
    }

    let mut patterns: Vec<(usize, ViolationPattern)> = rules
        .iter()
        .enumerate()
        .filter_map(|(order, rule)| {
            let count = counts.get(rule.id.as_str()).copied()?;
            Some((
                order,
                ViolationPattern {
                    rule_id: rule.id.clone(),
                    antecedent: rule.antecedent.clone(),
                    consequent: rule.consequent.clone(),
                    pattern: format!(
                        "{} -> {}",
                        format_atoms(&rule.antecedent),
                        format_atoms(&rule.consequent)
                    ),
                    count,
                    rate: ratio(count, anomaly_count),
                },
            ))
        })
        .collect();

    patterns.sort_by(|(ao, a), (bo, b)| b.count.cmp(&a.count).then_with(|| ao.cmp(bo)));
    patterns
        .into_iter()
        .take(TOP_PATTERNS)
        .map(|(_, pattern)| pattern)
        .collect()
}

/// `num / den`, or 0.0 when `den` is zero.
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::apriori::CategoricalEncoder;
    use crate::labeling::RecordLabeler;
    use rulemine_core::{LabelingConfig, Record};

    fn rule(id: &str, antecedent: (&str, &str), consequent: (&str, &str), confidence: f64) -> Rule {
        Rule {
            id: id.to_string(),
            antecedent: vec![Atom::new(antecedent.0, antecedent.1)],
            consequent: vec![Atom::new(consequent.0, consequent.1)],
            support: 0.3,
            confidence,
            lift: 1.5,
            antecedent_support: 0.4,
            consequent_support: 0.5,
            leverage: 0.1,
            conviction: None,
            count: 6,
        }
    }

    /// `matched` records with region=X, `complete` of them with status=Y.
    fn records(matched: usize, complete: usize) -> Vec<Record> {
        (0..matched)
            .map(|i| {
                Record::new(format!("r{i}"))
                    .with_dimension("region", "X")
                    .with_dimension("status", if i < complete { "Y" } else { "Z" })
            })
            .collect()
    }

    fn run(records: &[Record], rules: &[Rule]) -> ComplianceReport {
        let encoder = CategoricalEncoder::new(["region", "status"]);
        let labeling = LabelingConfig::default();
        let labeled = RecordLabeler::new(&encoder, &labeling)
            .parallel(false)
            .label(records, rules);
        let config = ComplianceConfig::default();
        ComplianceReporter::new(&config)
            .with_fields(["region".to_string(), "status".to_string()])
            .report(&labeled, rules)
    }

    #[test]
    fn quarter_violation_rate_is_in_no_bucket() {
        let rules = vec![rule("Rule_1", ("region", "X"), ("status", "Y"), 0.75)];
        let report = run(&records(20, 15), &rules);

        let detail = &report.rule_details[0];
        assert_eq!(detail.antecedent_match_count, 20);
        assert_eq!(detail.complete_count, 15);
        assert_eq!(detail.violation_count, 5);
        assert!((detail.violation_rate - 0.25).abs() < 1e-12);
        assert_eq!(detail.actual_confidence, Some(0.75));
        assert!(detail.buckets.is_empty());
        assert!(report.summary.effective_rules.is_empty());
        assert!(report.summary.high_violation_rules.is_empty());
    }

    #[test]
    fn effective_rule() {
        let rules = vec![rule("Rule_1", ("region", "X"), ("status", "Y"), 0.9)];
        let report = run(&records(20, 19), &rules);
        assert_eq!(report.rule_details[0].buckets, vec![RuleBucket::Effective]);
        assert_eq!(report.summary.effective_rules, vec!["Rule_1"]);
    }

    #[test]
    fn high_violation_and_low_confidence_overlap() {
        let rules = vec![rule("Rule_1", ("region", "X"), ("status", "Y"), 0.9)];
        let report = run(&records(10, 5), &rules);
        let detail = &report.rule_details[0];
        assert!(detail.in_bucket(RuleBucket::HighViolation));
        assert!(detail.in_bucket(RuleBucket::LowConfidence));
        assert!(!detail.in_bucket(RuleBucket::Effective));
        assert!((detail.confidence_gap.unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn unmatched_rule_is_guarded() {
        let rules = vec![rule("Rule_1", ("region", "Q"), ("status", "Y"), 0.9)];
        let report = run(&records(5, 5), &rules);
        let detail = &report.rule_details[0];
        assert_eq!(detail.antecedent_match_count, 0);
        assert_eq!(detail.violation_rate, 0.0);
        assert_eq!(detail.actual_confidence, None);
        assert!(detail.buckets.is_empty());
        assert_eq!(report.summary.unexercised_rules, vec!["Rule_1"]);
        assert_eq!(report.anomaly_count, 0);
        assert_eq!(report.category_counts["unmatched"], 5);
    }

    #[test]
    fn anomaly_aggregates() {
        let rules = vec![
            rule("Rule_1", ("region", "X"), ("status", "Y"), 0.8),
            rule("Rule_2", ("status", "Z"), ("region", "W"), 0.8),
        ];
        // 6 records: 4 status=Y (satisfy Rule_1), 2 status=Z (violate both).
        let report = run(&records(6, 4), &rules);

        assert_eq!(report.total_records, 6);
        assert_eq!(report.anomaly_count, 2);
        assert!((report.anomaly_rate - 2.0 / 6.0).abs() < 1e-12);
        assert_eq!(report.category_counts["compliant"], 4);
        assert_eq!(report.category_counts["high-risk"], 2);
        assert_eq!(report.high_risk_records, vec!["r4", "r5"]);

        assert_eq!(report.common_violation_patterns.len(), 2);
        let first = &report.common_violation_patterns[0];
        assert_eq!(first.rule_id, "Rule_1");
        assert_eq!(first.pattern, "region=X -> status=Y");
        assert_eq!(first.count, 2);
        assert_eq!(first.rate, 1.0);

        let status = &report.anomaly_distribution["status"];
        assert_eq!(status[0].value, "Z");
        assert_eq!(status[0].share, 1.0);
    }

    #[test]
    fn patterns_sorted_by_count() {
        let rules = vec![
            rule("Rule_1", ("region", "X"), ("status", "Z"), 0.8),
            rule("Rule_2", ("region", "X"), ("status", "Y"), 0.8),
        ];
        // Rule_1 violated 4 times, Rule_2 violated twice.
        let report = run(&records(6, 4), &rules);
        let ids: Vec<&str> = report
            .common_violation_patterns
            .iter()
            .map(|p| p.rule_id.as_str())
            .collect();
        assert_eq!(ids, vec!["Rule_1", "Rule_2"]);
        assert_eq!(report.common_violation_patterns[0].count, 4);
    }

    #[test]
    fn empty_input() {
        let report = run(&[], &[]);
        assert_eq!(report.total_rules, 0);
        assert_eq!(report.anomaly_rate, 0.0);
        assert!(report.common_violation_patterns.is_empty());
        assert!(report.anomaly_distribution.is_empty());
    }
}
