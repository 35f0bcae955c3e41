//! Dataset overview: per-field value and distribution summaries.
//!
//! Computed once per run from the translated records, before mining. Each
//! field yields one [`FieldSummary`] variant so reporting code can walk a
//! single list.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use rulemine_core::{AnalysisConfig, Record};

/// Distinct values listed per dimension field.
const TOP_VALUES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSummary {
    Dimension {
        field: String,
        unique: usize,
        top_values: Vec<ValueCount>,
        missing_rate: f64,
    },
    Metric {
        field: String,
        count: usize,
        mean: Option<f64>,
        /// Sample standard deviation; `None` below two values.
        std_dev: Option<f64>,
        min: Option<f64>,
        max: Option<f64>,
        median: Option<f64>,
        missing_rate: f64,
    },
}

impl FieldSummary {
    pub fn field(&self) -> &str {
        match self {
            FieldSummary::Dimension { field, .. } | FieldSummary::Metric { field, .. } => field,
        }
    }

    pub fn missing_rate(&self) -> f64 {
        match self {
            FieldSummary::Dimension { missing_rate, .. }
            | FieldSummary::Metric { missing_rate, .. } => *missing_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetOverview {
    pub total_records: usize,
    pub fields: Vec<FieldSummary>,
}

impl DatasetOverview {
    pub fn build(config: &AnalysisConfig, records: &[Record]) -> Self {
        let dimensions = config
            .dimension_fields
            .iter()
            .map(|field| summarize_dimension(field, records));
        let metrics = config
            .metric_fields
            .iter()
            .map(|field| summarize_metric(field, records));

        Self {
            total_records: records.len(),
            fields: dimensions.chain(metrics).collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSummary> {
        self.fields.iter().find(|f| f.field() == name)
    }
}

fn missing_rate(present: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (total - present) as f64 / total as f64
    }
}

fn summarize_dimension(field: &str, records: &[Record]) -> FieldSummary {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut present = 0usize;
    for value in records.iter().filter_map(|r| r.dimension(field)) {
        *counts.entry(value).or_default() += 1;
        present += 1;
    }

    let unique = counts.len();
    let mut top_values: Vec<ValueCount> = counts
        .into_iter()
        .map(|(value, count)| ValueCount {
            value: value.to_string(),
            count,
        })
        .collect();
    top_values.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    top_values.truncate(TOP_VALUES);

    FieldSummary::Dimension {
        field: field.to_string(),
        unique,
        top_values,
        missing_rate: missing_rate(present, records.len()),
    }
}

fn summarize_metric(field: &str, records: &[Record]) -> FieldSummary {
    let mut values: Vec<f64> = records.iter().filter_map(|r| r.metric(field)).collect();
    values.sort_by(f64::total_cmp);
    let n = values.len();

    let mean = (n > 0).then(|| values.iter().sum::<f64>() / n as f64);
    let std_dev = match mean {
        Some(mean) if n > 1 => {
            let variance =
                values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64;
            Some(variance.sqrt())
        }
        _ => None,
    };
    let median = match n {
        0 => None,
        _ if n % 2 == 1 => Some(values[n / 2]),
        _ => Some((values[n / 2 - 1] + values[n / 2]) / 2.0),
    };

    FieldSummary::Metric {
        field: field.to_string(),
        count: n,
        mean,
        std_dev,
        min: values.first().copied(),
        max: values.last().copied(),
        median,
        missing_rate: missing_rate(n, records.len()),
    }
}
