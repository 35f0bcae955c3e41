//! Analysis run orchestrator.
//!
//! Wires the stages together in their required order:
//!
//! - **Encode**: records to transactions (dimension atoms plus metric bins).
//! - **Mine**: level-wise Apriori, cancellable between levels.
//! - **Rules**: split, score and number rules. Skipped when a cached
//!   [`RuleSet`] is fresh and passes [`check_rules`].
//! - **Label**: apply the finished rule set to every record.
//! - **Report**: per-rule compliance and anomaly aggregates.

pub mod cache;
pub mod metrics;

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use rulemine_core::{AnalysisConfig, CancellationToken, DataQualityWarning, Record, Result};

use crate::algorithms::apriori::{apriori, AprioriConfig, CategoricalEncoder, TransactionDb};
use crate::algorithms::discretize::MetricBins;
use crate::algorithms::rules::{check_rules, generate_rules, Rule, RuleConfig};
use crate::compliance::{ComplianceReport, ComplianceReporter};
use crate::labeling::{LabeledRecord, RecordLabeler};
use crate::overview::DatasetOverview;

pub use self::cache::{fingerprint, RuleSet};
use self::metrics::{PipelineMetrics, Stage};

/// Per-record problems absorbed into the output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQualitySummary {
    /// Records with no analysis value, kept and labeled `unmatched`.
    pub records_without_dimensions: usize,
    pub warnings: Vec<DataQualityWarning>,
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Fingerprint of the mining inputs, as stored in a [`RuleSet`].
    pub fingerprint: String,
    pub overview: DatasetOverview,
    pub bins: Vec<MetricBins>,
    pub rules: Vec<Rule>,
    pub labeled: Vec<LabeledRecord>,
    pub report: ComplianceReport,
    pub data_quality: DataQualitySummary,
    pub metrics: PipelineMetrics,
}

impl AnalysisOutput {
    /// The mined rules packaged for reuse by a later run.
    pub fn rule_set(&self) -> RuleSet {
        RuleSet::new(self.fingerprint.clone(), self.rules.clone())
    }
}

/// Runs the full mining and labeling flow under one validated configuration.
pub struct Pipeline {
    config: AnalysisConfig,
}

impl Pipeline {
    /// Validate `config` and build a pipeline around it.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn run(&self, records: &[Record], cancel: &CancellationToken) -> Result<AnalysisOutput> {
        self.run_with_cache(records, None, cancel)
    }

    /// Run every stage, reusing `cached` rules when its fingerprint matches.
    pub fn run_with_cache(
        &self,
        records: &[Record],
        cached: Option<&RuleSet>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutput> {
        let run_start = Instant::now();
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let config = &self.config;
        let mut metrics = PipelineMetrics {
            records: records.len(),
            ..PipelineMetrics::default()
        };

        info!(%run_id, records = records.len(), "analysis run started");

        let overview = DatasetOverview::build(config, records);

        // Encode
        let timer = metrics.timer(Stage::Encode);
        let encoder = CategoricalEncoder::fit(config, records);
        let transactions = encoder.encode_all(records);
        let fingerprint = fingerprint(&config.mining, &transactions);
        timer.finish(&mut metrics);

        // Mine + rules, unless a fresh and well-formed cache is supplied
        let reusable = match cached {
            Some(set) if set.is_fresh(&fingerprint) => match check_rules(&set.rules) {
                Ok(()) => Some(set),
                Err(e) => {
                    warn!(error = %e, "cached rule set is malformed, mining again");
                    None
                }
            },
            Some(set) => {
                warn!(
                    cached = %set.fingerprint,
                    current = %fingerprint,
                    "cached rule set is stale, mining again"
                );
                None
            }
            None => None,
        };

        let rules = match reusable {
            Some(set) => {
                info!(rules = set.rules.len(), "reusing cached rule set");
                metrics.rules_from_cache = true;
                metrics.transactions = transactions.iter().filter(|t| !t.is_empty()).count();
                metrics.empty_transactions = records.len() - metrics.transactions;
                set.rules.clone()
            }
            None => {
                let timer = metrics.timer(Stage::Mine);
                let db = TransactionDb::build(&transactions);
                let frequent = apriori(&db, &AprioriConfig::from(&config.mining), cancel)?;
                timer.finish(&mut metrics);
                metrics.transactions = db.total();
                metrics.empty_transactions = db.empty_count();
                metrics.itemsets = frequent.len();
                metrics.levels = frequent.levels;

                let timer = metrics.timer(Stage::Rules);
                let rules = generate_rules(&frequent, &RuleConfig::from(&config.mining))?;
                timer.finish(&mut metrics);
                rules
            }
        };
        metrics.rules = rules.len();

        // Label
        let timer = metrics.timer(Stage::Label);
        let labeler =
            RecordLabeler::new(&encoder, &config.labeling).parallel(config.mining.parallel);
        let labeled = labeler.label(records, &rules);
        timer.finish(&mut metrics);

        // Report
        let timer = metrics.timer(Stage::Report);
        let applied: Vec<Rule> = labeler.applicable(&rules).into_iter().cloned().collect();
        let report = ComplianceReporter::new(&config.compliance)
            .with_fields(config.dimension_fields.iter().cloned())
            .report(&labeled, &applied);
        timer.finish(&mut metrics);
        metrics.anomalies = report.anomaly_count;

        let warnings: Vec<DataQualityWarning> =
            labeled.iter().flat_map(|r| r.warnings.iter().cloned()).collect();
        if !warnings.is_empty() {
            warn!(
                records = warnings.len(),
                "records without any dimension value were labeled unmatched"
            );
            for w in &warnings {
                debug!(record = w.record_id(), "{w}");
            }
        }
        let data_quality = DataQualitySummary {
            records_without_dimensions: warnings.len(),
            warnings,
        };

        metrics.record_run(run_start.elapsed());
        info!(
            %run_id,
            records = metrics.records,
            rules = metrics.rules,
            anomalies = metrics.anomalies,
            cached = metrics.rules_from_cache,
            total_ms = metrics.total_ms,
            "analysis run complete"
        );

        Ok(AnalysisOutput {
            run_id,
            started_at,
            fingerprint,
            overview,
            bins: encoder.bins().to_vec(),
            rules,
            labeled,
            report,
            data_quality,
            metrics,
        })
    }
}
