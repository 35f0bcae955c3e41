//! Association rules derived from frequent itemsets.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use rulemine_core::{MiningConfig, MiningError, Result};

use super::apriori::{format_atoms, Atom, FrequentItemsets};

/// Subset enumeration uses a u64 mask.
const MAX_SPLIT_ITEMS: usize = 63;

/// An implication `antecedent -> consequent` with its mined statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// `Rule_1`, `Rule_2`, ... in output order.
    pub id: String,
    pub antecedent: Vec<Atom>,
    pub consequent: Vec<Atom>,
    /// Fraction of transactions containing both sides.
    pub support: f64,
    /// `support / antecedent_support`.
    pub confidence: f64,
    /// `confidence / consequent_support`. Zero when the consequent was never seen.
    pub lift: f64,
    pub antecedent_support: f64,
    pub consequent_support: f64,
    /// `support - antecedent_support * consequent_support`.
    pub leverage: f64,
    /// `(1 - consequent_support) / (1 - confidence)`. `None` when confidence is 1.
    pub conviction: Option<f64>,
    /// Transactions containing both sides.
    pub count: usize,
}

impl Rule {
    /// `a=1 & b=2 -> c=3`
    pub fn describe(&self) -> String {
        format!(
            "{} -> {}",
            format_atoms(&self.antecedent),
            format_atoms(&self.consequent)
        )
    }
}

/// Thresholds applied while generating rules.
#[derive(Debug, Clone)]
pub struct RuleConfig {
    pub min_confidence: f64,
    pub min_lift: f64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            min_lift: 1.2,
        }
    }
}

impl From<&MiningConfig> for RuleConfig {
    fn from(config: &MiningConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            min_lift: config.min_lift,
        }
    }
}

/// Statistics for one antecedent/consequent split, before thresholds.
struct Split {
    antecedent: Vec<Atom>,
    consequent: Vec<Atom>,
    count: usize,
    antecedent_count: usize,
    consequent_count: usize,
}

/// Enumerate every antecedent/consequent split of every itemset of size >= 2
/// and keep the rules meeting both thresholds.
///
/// Rules are ordered by lift, confidence and support (all descending), then
/// by antecedent size and atoms so the numbering is stable across runs.
pub fn generate_rules(frequent: &FrequentItemsets, config: &RuleConfig) -> Result<Vec<Rule>> {
    if !(0.0..=1.0).contains(&config.min_confidence) {
        return Err(MiningError::Configuration(format!(
            "min_confidence must be in [0, 1], got {}",
            config.min_confidence
        )));
    }
    if !(config.min_lift.is_finite() && config.min_lift >= 0.0) {
        return Err(MiningError::Configuration(format!(
            "min_lift must be a non-negative number, got {}",
            config.min_lift
        )));
    }

    let total = frequent.total_transactions;
    if total == 0 {
        return Ok(Vec::new());
    }
    let counts = frequent.count_index();
    let mut rules = Vec::new();
    let mut considered = 0usize;

    for itemset in frequent.itemsets.iter().filter(|s| s.len() >= 2) {
        let n = itemset.len();
        if n > MAX_SPLIT_ITEMS {
            warn!(size = n, "itemset too large to split into rules, skipping");
            continue;
        }

        for mask in 1..(1u64 << n) - 1 {
            let (antecedent, consequent): (Vec<_>, Vec<_>) = itemset
                .items
                .iter()
                .enumerate()
                .partition(|(i, _)| mask & (1u64 << *i) != 0);
            let antecedent: Vec<Atom> = antecedent.into_iter().map(|(_, a)| a.clone()).collect();
            let consequent: Vec<Atom> = consequent.into_iter().map(|(_, a)| a.clone()).collect();
            considered += 1;

            let antecedent_count = counts.get(antecedent.as_slice()).copied().unwrap_or(0);
            if antecedent_count == 0 {
                debug!(
                    antecedent = %format_atoms(&antecedent),
                    "antecedent has no support, skipping split"
                );
                continue;
            }
            let consequent_count = counts.get(consequent.as_slice()).copied().unwrap_or(0);

            let split = Split {
                antecedent,
                consequent,
                count: itemset.count,
                antecedent_count,
                consequent_count,
            };
            if let Some(rule) = score_split(split, total, config)? {
                rules.push(rule);
            }
        }
    }

    rules.sort_by(compare_rules);
    for (i, rule) in rules.iter_mut().enumerate() {
        rule.id = format!("Rule_{}", i + 1);
    }

    debug!(
        considered,
        retained = rules.len(),
        min_confidence = config.min_confidence,
        min_lift = config.min_lift,
        "rule generation complete"
    );
    Ok(rules)
}

/// Compute ratios for a split and apply thresholds. Comparisons use the
/// unrounded values.
fn score_split(split: Split, total: usize, config: &RuleConfig) -> Result<Option<Rule>> {
    check_disjoint(&split.antecedent, &split.consequent)?;

    let total_f = total as f64;
    let support = split.count as f64 / total_f;
    let antecedent_support = split.antecedent_count as f64 / total_f;
    let consequent_support = split.consequent_count as f64 / total_f;
    let confidence = split.count as f64 / split.antecedent_count as f64;
    let lift = if split.consequent_count == 0 {
        0.0
    } else {
        (split.count as f64 * total_f)
            / (split.antecedent_count as f64 * split.consequent_count as f64)
    };

    if confidence < config.min_confidence || lift < config.min_lift {
        return Ok(None);
    }

    let conviction = if confidence >= 1.0 {
        None
    } else {
        Some((1.0 - consequent_support) / (1.0 - confidence))
    };

    Ok(Some(Rule {
        id: String::new(),
        antecedent: split.antecedent,
        consequent: split.consequent,
        support,
        confidence,
        lift,
        antecedent_support,
        consequent_support,
        leverage: support - antecedent_support * consequent_support,
        conviction,
        count: split.count,
    }))
}

fn check_disjoint(antecedent: &[Atom], consequent: &[Atom]) -> Result<()> {
    if antecedent.iter().any(|a| consequent.contains(a)) {
        return Err(MiningError::Configuration(format!(
            "antecedent and consequent overlap: {} -> {}",
            format_atoms(antecedent),
            format_atoms(consequent)
        )));
    }
    Ok(())
}

/// Check a rule list produced elsewhere (e.g. loaded from disk) against the
/// shape `generate_rules` guarantees: non-empty disjoint sides and ids
/// numbered `Rule_1..Rule_N` in list order.
pub fn check_rules(rules: &[Rule]) -> Result<()> {
    for (i, rule) in rules.iter().enumerate() {
        let expected = format!("Rule_{}", i + 1);
        if rule.id != expected {
            return Err(MiningError::Configuration(format!(
                "rule at position {} has id {}, expected {expected}",
                i + 1,
                rule.id
            )));
        }
        if rule.antecedent.is_empty() || rule.consequent.is_empty() {
            return Err(MiningError::Configuration(format!(
                "{} has an empty side",
                rule.id
            )));
        }
        check_disjoint(&rule.antecedent, &rule.consequent)?;
    }
    Ok(())
}

fn compare_rules(a: &Rule, b: &Rule) -> Ordering {
    b.lift
        .total_cmp(&a.lift)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| b.support.total_cmp(&a.support))
        .then_with(|| a.antecedent.len().cmp(&b.antecedent.len()))
        .then_with(|| a.antecedent.cmp(&b.antecedent))
        .then_with(|| a.consequent.cmp(&b.consequent))
}
