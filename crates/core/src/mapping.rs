//! Field-name translation from source columns to canonical names, and
//! conversion of raw rows into [`Record`]s.
//!
//! The mapping is resolved once per run into a plain lookup table so the
//! labeling hot path never touches it.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::record::{FieldValue, RawRow, Record};

/// Resolved external → canonical field name table.
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    canonical: HashMap<String, String>,
}

impl FieldMapping {
    pub fn new(mapping: &IndexMap<String, String>) -> Self {
        let canonical = mapping
            .iter()
            .map(|(external, canonical)| (external.trim().to_owned(), canonical.trim().to_owned()))
            .collect();
        Self { canonical }
    }

    /// Canonical name for `external`; unmapped names pass through unchanged.
    pub fn resolve<'a>(&'a self, external: &'a str) -> &'a str {
        self.canonical
            .get(external.trim())
            .map(String::as_str)
            .unwrap_or_else(|| external.trim())
    }
}

/// Turns raw rows into records according to an [`AnalysisConfig`].
///
/// Only the configured id, dimension and metric fields are kept. When two
/// source columns resolve to the same canonical name, the first one wins.
#[derive(Debug, Clone)]
pub struct RowTranslator {
    mapping: FieldMapping,
    id_field: String,
    dimensions: Vec<String>,
    metrics: Vec<String>,
    dimension_set: HashSet<String>,
    metric_set: HashSet<String>,
}

impl RowTranslator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            mapping: FieldMapping::new(&config.field_mapping),
            id_field: config.id_field.clone(),
            dimensions: config.dimension_fields.clone(),
            metrics: config.metric_fields.clone(),
            dimension_set: config.dimension_fields.iter().cloned().collect(),
            metric_set: config.metric_fields.iter().cloned().collect(),
        }
    }

    /// Convert one row. `index` is used as the id when the id field is absent.
    pub fn translate(&self, index: usize, row: &RawRow) -> Record {
        let mut resolved: IndexMap<&str, &FieldValue> = IndexMap::with_capacity(row.len());
        for (name, value) in row {
            resolved.entry(self.mapping.resolve(name)).or_insert(value);
        }

        let id = resolved
            .get(self.id_field.as_str())
            .and_then(|v| v.to_category())
            .unwrap_or_else(|| format!("row-{}", index + 1));

        let mut record = Record::new(id);
        for field in &self.dimensions {
            let value = resolved.get(field.as_str()).and_then(|v| v.to_category());
            record.dimensions.insert(field.clone(), value);
        }
        for field in &self.metrics {
            let value = resolved.get(field.as_str()).and_then(|v| v.as_f64());
            record.metrics.insert(field.clone(), value);
        }
        record
    }

    /// Convert a whole table, preserving row order.
    pub fn translate_all(&self, rows: &[RawRow]) -> Vec<Record> {
        let records: Vec<Record> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| self.translate(i, row))
            .collect();

        let unmapped = rows
            .first()
            .map(|row| {
                row.keys()
                    .map(|k| self.mapping.resolve(k))
                    .filter(|k| {
                        *k != self.id_field
                            && !self.dimension_set.contains(*k)
                            && !self.metric_set.contains(*k)
                    })
                    .count()
            })
            .unwrap_or(0);
        debug!(rows = records.len(), unmapped_columns = unmapped, "rows translated to records");

        records
    }
}
