pub mod algorithms;
pub mod compliance;
pub mod labeling;
pub mod overview;
pub mod pipeline;

pub use algorithms::apriori::{
    apriori, mine, AprioriConfig, Atom, CategoricalEncoder, FrequentItemsets, Itemset,
    Transaction, TransactionDb,
};
pub use algorithms::discretize::MetricBins;
pub use algorithms::rules::{check_rules, generate_rules, Rule, RuleConfig};
pub use compliance::{
    ComplianceReport, ComplianceReporter, ComplianceSummary, RuleBucket, RuleCompliance,
    ViolationPattern,
};
pub use labeling::{evaluate, AnomalyFlag, Label, LabeledRecord, RecordLabeler, RiskCategory};
pub use overview::{DatasetOverview, FieldSummary};
pub use pipeline::metrics::PipelineMetrics;
pub use pipeline::{AnalysisOutput, DataQualitySummary, Pipeline, RuleSet};
