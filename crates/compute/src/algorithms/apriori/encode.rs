use tracing::debug;

use rulemine_core::{AnalysisConfig, Record};

use super::types::{Atom, Transaction};
use crate::algorithms::discretize::MetricBins;

/// Encodes records into transactions of `field=value` atoms.
///
/// Dimension fields contribute their categorical value; binned metric fields
/// contribute their quartile label. Missing values contribute nothing, and a
/// record with every dimension missing encodes to an empty transaction even
/// when it carries metric values.
#[derive(Debug, Clone, Default)]
pub struct CategoricalEncoder {
    fields: Vec<String>,
    bins: Vec<MetricBins>,
}

impl CategoricalEncoder {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            bins: Vec::new(),
        }
    }

    pub fn with_bins(mut self, bins: Vec<MetricBins>) -> Self {
        self.bins = bins;
        self
    }

    /// Build the encoder for a run: configured dimensions plus metric bins
    /// fitted on `records`.
    pub fn fit(config: &AnalysisConfig, records: &[Record]) -> Self {
        let bins: Vec<MetricBins> = config
            .discretize_metrics
            .iter()
            .filter_map(|field| MetricBins::fit(records, field))
            .collect();
        debug!(
            dimensions = config.dimension_fields.len(),
            binned_metrics = bins.len(),
            "categorical encoder fitted"
        );
        Self::new(config.dimension_fields.iter().cloned()).with_bins(bins)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn bins(&self) -> &[MetricBins] {
        &self.bins
    }

    /// True when at least one dimension field carries a value.
    pub fn has_dimensions(&self, record: &Record) -> bool {
        self.fields.iter().any(|field| record.dimension(field).is_some())
    }

    pub fn encode(&self, record: &Record) -> Transaction {
        if !self.has_dimensions(record) {
            return Transaction::default();
        }
        let dimension_atoms = self
            .fields
            .iter()
            .filter_map(|field| record.dimension(field).map(|v| Atom::new(field.as_str(), v)));
        let metric_atoms = self.bins.iter().filter_map(|bins| {
            record
                .metric(&bins.field)
                .map(|v| Atom::new(bins.field.as_str(), bins.label(v)))
        });
        Transaction::new(dimension_atoms.chain(metric_atoms))
    }

    pub fn encode_all(&self, records: &[Record]) -> Vec<Transaction> {
        records.iter().map(|r| self.encode(r)).collect()
    }
}
