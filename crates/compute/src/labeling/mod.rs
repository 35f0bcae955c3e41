//! Per-record rule evaluation.
//!
//! Every record is checked against the ordered rule set. A matched antecedent
//! yields exactly one label for that rule: satisfied when the consequent also
//! holds, violated otherwise. Violations double as anomaly flags and drive the
//! composite score.

pub mod score;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rulemine_core::{DataQualityWarning, LabelingConfig, Record};

use crate::algorithms::apriori::{format_atoms, Atom, CategoricalEncoder, Transaction};
use crate::algorithms::rules::Rule;

pub use score::{anomaly_score, RiskCategory};

/// Outcome of one rule against one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Label {
    AntecedentUnmatched,
    FullySatisfied,
    /// Antecedent held, consequent did not.
    Violated,
}

/// Evaluate `rule` against an encoded record.
pub fn evaluate(transaction: &Transaction, rule: &Rule) -> Label {
    if !transaction.matches_all(&rule.antecedent) {
        Label::AntecedentUnmatched
    } else if transaction.matches_all(&rule.consequent) {
        Label::FullySatisfied
    } else {
        Label::Violated
    }
}

/// A violated rule, with what the record carried instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFlag {
    pub rule_id: String,
    pub antecedent: Vec<Atom>,
    pub consequent: Vec<Atom>,
    pub description: String,
}

impl AnomalyFlag {
    fn new(rule: &Rule, transaction: &Transaction) -> Self {
        let observed = rule
            .consequent
            .iter()
            .map(|atom| {
                let value = transaction.value_of(&atom.field).unwrap_or("<missing>");
                format!("{}={}", atom.field, value)
            })
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            rule_id: rule.id.clone(),
            antecedent: rule.antecedent.clone(),
            consequent: rule.consequent.clone(),
            description: format!(
                "precondition met but conclusion failed ({} -> {}; observed {})",
                format_atoms(&rule.antecedent),
                format_atoms(&rule.consequent),
                observed
            ),
        }
    }
}

/// A record enriched with its rule outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub record: Record,
    /// Ids of rules the record fully satisfies, in rule order.
    pub rule_labels: Vec<String>,
    /// Ids of rules whose antecedent matched but consequent failed, in rule order.
    pub rule_violations: Vec<String>,
    pub anomaly_flags: Vec<AnomalyFlag>,
    pub anomaly_score: f64,
    pub risk_category: RiskCategory,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<DataQualityWarning>,
}

impl LabeledRecord {
    pub fn is_anomalous(&self) -> bool {
        self.risk_category.is_anomalous()
    }
}

/// Applies a finished rule set to records.
pub struct RecordLabeler<'a> {
    encoder: &'a CategoricalEncoder,
    config: &'a LabelingConfig,
    parallel: bool,
}

impl<'a> RecordLabeler<'a> {
    pub fn new(encoder: &'a CategoricalEncoder, config: &'a LabelingConfig) -> Self {
        Self {
            encoder,
            config,
            parallel: true,
        }
    }

    /// Label records on the rayon pool (default) or the calling thread.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Rules strong enough to be applied to records.
    pub fn applicable<'r>(&self, rules: &'r [Rule]) -> Vec<&'r Rule> {
        rules
            .iter()
            .filter(|r| r.confidence >= self.config.min_rule_confidence)
            .collect()
    }

    /// Label every record against `rules`. Output order matches `records`.
    pub fn label(&self, records: &[Record], rules: &[Rule]) -> Vec<LabeledRecord> {
        let active = self.applicable(rules);
        let labeled: Vec<LabeledRecord> = if self.parallel {
            records
                .par_iter()
                .map(|record| self.label_one(record, &active))
                .collect()
        } else {
            records
                .iter()
                .map(|record| self.label_one(record, &active))
                .collect()
        };

        debug!(
            records = labeled.len(),
            rules = active.len(),
            anomalous = labeled.iter().filter(|r| r.is_anomalous()).count(),
            "labeling complete"
        );
        labeled
    }

    /// Label one record. A record with no dimension value is not evaluated:
    /// it comes out `unmatched` with an `AllDimensionsMissing` warning.
    pub fn label_one(&self, record: &Record, rules: &[&Rule]) -> LabeledRecord {
        if !self.encoder.has_dimensions(record) {
            return LabeledRecord {
                record: record.clone(),
                rule_labels: Vec::new(),
                rule_violations: Vec::new(),
                anomaly_flags: Vec::new(),
                anomaly_score: 0.0,
                risk_category: RiskCategory::Unmatched,
                warnings: vec![DataQualityWarning::AllDimensionsMissing {
                    record_id: record.id.clone(),
                }],
            };
        }

        let transaction = self.encoder.encode(record);
        let mut rule_labels = Vec::new();
        let mut rule_violations = Vec::new();
        let mut anomaly_flags = Vec::new();

        for rule in rules {
            match evaluate(&transaction, rule) {
                Label::AntecedentUnmatched => {}
                Label::FullySatisfied => rule_labels.push(rule.id.clone()),
                Label::Violated => {
                    rule_violations.push(rule.id.clone());
                    anomaly_flags.push(AnomalyFlag::new(rule, &transaction));
                }
            }
        }

        let matched_any = !rule_labels.is_empty() || !rule_violations.is_empty();
        let score = if matched_any {
            anomaly_score(
                rule_violations.len(),
                anomaly_flags.len(),
                rule_labels.len(),
                &self.config.weights,
            )
        } else {
            0.0
        };
        let risk_category =
            RiskCategory::classify(score, matched_any, &self.config.risk_thresholds);

        LabeledRecord {
            record: record.clone(),
            rule_labels,
            rule_violations,
            anomaly_flags,
            anomaly_score: score,
            risk_category,
            warnings: Vec::new(),
        }
    }
}
