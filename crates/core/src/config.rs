//! Analysis configuration: field roles, mining thresholds, labeling weights
//! and compliance cut points.
//!
//! Loaded from YAML, optionally overridden from the environment, then
//! validated once before any mining work starts. Every component receives the
//! part it needs by reference; nothing here is global.

use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{MiningError, Result};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_parse<T: FromStr>(profile: &str, key: &str) -> Option<T> {
    profiled_env_opt(profile, key).and_then(|v| v.trim().parse().ok())
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Canonical name of the field holding the record identifier.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Categorical fields encoded into `field=value` atoms.
    pub dimension_fields: Vec<String>,
    /// Numeric fields carried on each record.
    #[serde(default)]
    pub metric_fields: Vec<String>,
    /// External field name → canonical field name.
    #[serde(default)]
    pub field_mapping: IndexMap<String, String>,
    /// Metric fields binned into quartile labels and mined like dimensions.
    #[serde(default)]
    pub discretize_metrics: Vec<String>,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub labeling: LabelingConfig,
    #[serde(default)]
    pub compliance: ComplianceConfig,
}

fn default_id_field() -> String {
    "id".to_string()
}

/// Apriori and rule generation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MiningConfig {
    /// Minimum fraction of transactions containing an itemset, in (0, 1].
    #[serde(default = "default_min_support")]
    pub min_support: f64,
    /// Minimum rule confidence, in [0, 1].
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Minimum rule lift, at least 1.0.
    #[serde(default = "default_min_lift")]
    pub min_lift: f64,
    /// Largest itemset the run may produce. Unset means unbounded.
    #[serde(default)]
    pub max_itemset_size: Option<usize>,
    /// Most candidates a single Apriori level may generate.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Count support and label records on the rayon pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_min_support() -> f64 { 0.05 }
fn default_min_confidence() -> f64 { 0.6 }
fn default_min_lift() -> f64 { 1.2 }
fn default_max_candidates() -> usize { 100_000 }
fn default_parallel() -> bool { true }

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            min_support: default_min_support(),
            min_confidence: default_min_confidence(),
            min_lift: default_min_lift(),
            max_itemset_size: None,
            max_candidates: default_max_candidates(),
            parallel: default_parallel(),
        }
    }
}

/// Per-label contributions to a record's anomaly score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoreWeights {
    /// Added for each violated rule.
    #[serde(default = "default_violation_weight")]
    pub violation: f64,
    /// Added for each anomaly flag (precondition met, conclusion failed).
    #[serde(default = "default_anomaly_flag_weight")]
    pub anomaly_flag: f64,
    /// Subtracted for each fully satisfied rule.
    #[serde(default = "default_satisfied_reward")]
    pub satisfied_reward: f64,
}

fn default_violation_weight() -> f64 { 0.3 }
fn default_anomaly_flag_weight() -> f64 { 0.5 }
fn default_satisfied_reward() -> f64 { 0.1 }

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            violation: default_violation_weight(),
            anomaly_flag: default_anomaly_flag_weight(),
            satisfied_reward: default_satisfied_reward(),
        }
    }
}

/// Upper bounds (inclusive) of the low and medium risk tiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RiskThresholds {
    #[serde(default = "default_low_max")]
    pub low_max: f64,
    #[serde(default = "default_medium_max")]
    pub medium_max: f64,
}

fn default_low_max() -> f64 { 0.5 }
fn default_medium_max() -> f64 { 1.0 }

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low_max: default_low_max(),
            medium_max: default_medium_max(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LabelingConfig {
    #[serde(default)]
    pub weights: ScoreWeights,
    #[serde(default)]
    pub risk_thresholds: RiskThresholds,
    /// Rules below this confidence are not applied to records.
    #[serde(default)]
    pub min_rule_confidence: f64,
}

/// Cut points for the per-rule compliance buckets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ComplianceConfig {
    #[serde(default = "default_effective_max_violation_rate")]
    pub effective_max_violation_rate: f64,
    #[serde(default = "default_effective_min_confidence_ratio")]
    pub effective_min_confidence_ratio: f64,
    #[serde(default = "default_high_violation_rate")]
    pub high_violation_rate: f64,
    #[serde(default = "default_low_confidence_ratio")]
    pub low_confidence_ratio: f64,
}

fn default_effective_max_violation_rate() -> f64 { 0.10 }
fn default_effective_min_confidence_ratio() -> f64 { 0.9 }
fn default_high_violation_rate() -> f64 { 0.30 }
fn default_low_confidence_ratio() -> f64 { 0.8 }

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            effective_max_violation_rate: default_effective_max_violation_rate(),
            effective_min_confidence_ratio: default_effective_min_confidence_ratio(),
            high_violation_rate: default_high_violation_rate(),
            low_confidence_ratio: default_low_confidence_ratio(),
        }
    }
}

impl AnalysisConfig {
    /// Config with the given dimension fields and defaults everywhere else.
    pub fn new<S: Into<String>>(dimension_fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            id_field: default_id_field(),
            dimension_fields: dimension_fields.into_iter().map(Into::into).collect(),
            metric_fields: Vec::new(),
            field_mapping: IndexMap::new(),
            discretize_metrics: Vec::new(),
            mining: MiningConfig::default(),
            labeling: LabelingConfig::default(),
            compliance: ComplianceConfig::default(),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Fields that become atoms: dimensions first, then binned metrics.
    pub fn analysis_fields(&self) -> Vec<String> {
        self.dimension_fields
            .iter()
            .chain(self.discretize_metrics.iter())
            .cloned()
            .collect()
    }

    /// Apply mining threshold overrides from the environment.
    ///
    /// Profile is read from `RULEMINE_PROFILE`. When set (e.g. `STRICT`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        let profile = env_opt("RULEMINE_PROFILE").unwrap_or_default().to_uppercase();
        let p = profile.as_str();
        if let Some(v) = profiled_env_parse(p, "RULEMINE_MIN_SUPPORT") {
            self.mining.min_support = v;
        }
        if let Some(v) = profiled_env_parse(p, "RULEMINE_MIN_CONFIDENCE") {
            self.mining.min_confidence = v;
        }
        if let Some(v) = profiled_env_parse(p, "RULEMINE_MIN_LIFT") {
            self.mining.min_lift = v;
        }
        if let Some(v) = profiled_env_parse(p, "RULEMINE_MAX_ITEMSET_SIZE") {
            self.mining.max_itemset_size = Some(v);
        }
        if let Some(v) = profiled_env_parse(p, "RULEMINE_MAX_CANDIDATES") {
            self.mining.max_candidates = v;
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!(
            dimensions = self.dimension_fields.len(),
            metrics = self.metric_fields.len(),
            discretized = self.discretize_metrics.len(),
            min_support = self.mining.min_support,
            min_confidence = self.mining.min_confidence,
            min_lift = self.mining.min_lift,
            "analysis config loaded"
        );
    }

    /// Check every threshold and field list, reporting all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut issues = ConfigIssues::default();

        if self.id_field.trim().is_empty() {
            issues.error("id_field", "must not be empty");
        }
        if self.dimension_fields.is_empty() {
            issues.error("dimension_fields", "at least one dimension field is required");
        }
        check_field_names(&mut issues, "dimension_fields", &self.dimension_fields);
        check_field_names(&mut issues, "metric_fields", &self.metric_fields);

        let dims: HashSet<&str> = self.dimension_fields.iter().map(String::as_str).collect();
        let metrics: HashSet<&str> = self.metric_fields.iter().map(String::as_str).collect();
        for field in &self.metric_fields {
            if dims.contains(field.as_str()) {
                issues.error("metric_fields", format!("'{field}' is also a dimension field"));
            }
        }
        for field in &self.discretize_metrics {
            if !metrics.contains(field.as_str()) {
                issues.error(
                    "discretize_metrics",
                    format!("'{field}' is not listed in metric_fields"),
                );
            }
        }

        let m = &self.mining;
        if !(m.min_support > 0.0 && m.min_support <= 1.0) {
            issues.error("mining.min_support", format!("must be in (0, 1], got {}", m.min_support));
        }
        if !(0.0..=1.0).contains(&m.min_confidence) {
            issues.error(
                "mining.min_confidence",
                format!("must be in [0, 1], got {}", m.min_confidence),
            );
        }
        if !(m.min_lift.is_finite() && m.min_lift >= 1.0) {
            issues.error("mining.min_lift", format!("must be >= 1.0, got {}", m.min_lift));
        }
        if m.max_itemset_size == Some(0) {
            issues.error("mining.max_itemset_size", "must be at least 1 when set");
        }
        if m.max_candidates == 0 {
            issues.error("mining.max_candidates", "must be at least 1");
        }

        let w = &self.labeling.weights;
        for (name, value) in [
            ("violation", w.violation),
            ("anomaly_flag", w.anomaly_flag),
            ("satisfied_reward", w.satisfied_reward),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                issues.error(
                    format!("labeling.weights.{name}"),
                    format!("must be a non-negative number, got {value}"),
                );
            }
        }
        let t = &self.labeling.risk_thresholds;
        if !(t.low_max.is_finite() && t.low_max >= 0.0) {
            issues.error(
                "labeling.risk_thresholds.low_max",
                format!("must be a non-negative number, got {}", t.low_max),
            );
        }
        if !(t.medium_max.is_finite() && t.medium_max >= t.low_max) {
            issues.error(
                "labeling.risk_thresholds.medium_max",
                format!("must be >= low_max ({}), got {}", t.low_max, t.medium_max),
            );
        }
        if !(0.0..=1.0).contains(&self.labeling.min_rule_confidence) {
            issues.error(
                "labeling.min_rule_confidence",
                format!("must be in [0, 1], got {}", self.labeling.min_rule_confidence),
            );
        }

        let c = &self.compliance;
        for (name, value) in [
            ("effective_max_violation_rate", c.effective_max_violation_rate),
            ("high_violation_rate", c.high_violation_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                issues.error(
                    format!("compliance.{name}"),
                    format!("must be in [0, 1], got {value}"),
                );
            }
        }
        for (name, value) in [
            ("effective_min_confidence_ratio", c.effective_min_confidence_ratio),
            ("low_confidence_ratio", c.low_confidence_ratio),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                issues.error(
                    format!("compliance.{name}"),
                    format!("must be a non-negative number, got {value}"),
                );
            }
        }

        issues.into_result()
    }
}

fn check_field_names(issues: &mut ConfigIssues, path: &str, fields: &[String]) {
    let mut seen = HashSet::new();
    for field in fields {
        if field.trim().is_empty() {
            issues.error(path, "field names must not be blank");
        } else if field.contains('=') {
            issues.error(path, format!("'{field}' must not contain '='"));
        } else if !seen.insert(field.as_str()) {
            issues.error(path, format!("'{field}' is listed twice"));
        }
    }
}

/// Accumulates validation problems so callers see all of them in one error.
#[derive(Debug, Default)]
struct ConfigIssues {
    errors: Vec<String>,
}

impl ConfigIssues {
    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(format!("{}: {}", path.into(), message.into()));
    }

    fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(MiningError::Configuration(self.errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AnalysisConfig {
        AnalysisConfig::new(["project_type", "project_level"])
    }

    #[test]
    fn defaults_are_valid() {
        let config = base();
        assert!(config.validate().is_ok());
        assert_eq!(config.mining.min_support, 0.05);
        assert_eq!(config.mining.min_lift, 1.2);
        assert_eq!(config.labeling.weights.anomaly_flag, 0.5);
        assert_eq!(config.labeling.risk_thresholds.medium_max, 1.0);
    }

    #[test]
    fn parse_yaml_with_partial_sections() {
        let yaml = r#"
id_field: project_id
dimension_fields: [project_type, project_level, product_line]
metric_fields: [effort_hours]
discretize_metrics: [effort_hours]
field_mapping:
  "Project Type": project_type
mining:
  min_support: 0.1
  max_itemset_size: 3
labeling:
  risk_thresholds:
    low_max: 0.4
"#;
        let config = AnalysisConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.id_field, "project_id");
        assert_eq!(config.mining.min_support, 0.1);
        assert_eq!(config.mining.min_confidence, 0.6);
        assert_eq!(config.mining.max_itemset_size, Some(3));
        assert_eq!(config.labeling.risk_thresholds.low_max, 0.4);
        assert_eq!(config.labeling.risk_thresholds.medium_max, 1.0);
        assert_eq!(config.field_mapping["Project Type"], "project_type");
        assert_eq!(
            config.analysis_fields(),
            vec!["project_type", "project_level", "product_line", "effort_hours"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let yaml = "dimension_fields: [a]\nmin_suport: 0.1\n";
        assert!(matches!(
            AnalysisConfig::from_yaml_str(yaml),
            Err(MiningError::Yaml(_))
        ));
    }

    #[test]
    fn out_of_range_thresholds_are_all_reported() {
        let mut config = base();
        config.mining.min_support = 0.0;
        config.mining.min_confidence = 1.5;
        config.mining.min_lift = 0.9;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("mining.min_support"), "{err}");
        assert!(err.contains("mining.min_confidence"), "{err}");
        assert!(err.contains("mining.min_lift"), "{err}");
    }

    #[test]
    fn min_support_of_one_is_accepted() {
        let mut config = base();
        config.mining.min_support = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_dimension_list_is_rejected() {
        let config = AnalysisConfig::new(Vec::<String>::new());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MiningError::Configuration(ref m) if m.contains("dimension_fields")));
    }

    #[test]
    fn discretized_metric_must_be_a_metric() {
        let mut config = base();
        config.discretize_metrics = vec!["effort_hours".into()];
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("discretize_metrics"));

        config.metric_fields = vec!["effort_hours".into()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn inverted_risk_thresholds_are_rejected() {
        let mut config = base();
        config.labeling.risk_thresholds = RiskThresholds { low_max: 1.0, medium_max: 0.5 };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("medium_max"));
    }

    #[test]
    fn duplicate_and_overlapping_fields_are_rejected() {
        let mut config = AnalysisConfig::new(["a", "a"]);
        config.metric_fields = vec!["a".into()];
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("listed twice"));
        assert!(err.contains("also a dimension field"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.yml");
        std::fs::write(&path, "dimension_fields: [region, status]\n").unwrap();

        let config = AnalysisConfig::from_path(&path).unwrap();
        assert_eq!(config.dimension_fields, vec!["region", "status"]);
        assert_eq!(config, AnalysisConfig::new(["region", "status"]));
    }
}
