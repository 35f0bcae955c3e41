use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which ceiling tripped during mining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// Too many candidate itemsets generated at one level.
    Candidates,
    /// Frequent itemsets kept growing past the configured maximum size.
    ItemsetSize,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitKind::Candidates => write!(f, "candidate count"),
            LimitKind::ItemsetSize => write!(f, "itemset size"),
        }
    }
}

#[derive(Error, Debug)]
pub enum MiningError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(
        "Resource limit exceeded at level {level}: {kind} limit {limit} tripped \
         with {count} candidates (raise min_support)"
    )]
    ResourceLimitExceeded {
        level: usize,
        kind: LimitKind,
        count: usize,
        limit: usize,
    },

    #[error("Mining cancelled after level {level}")]
    Cancelled { level: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Non-fatal per-record problem. Recorded on the output, never returned as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// No analysis field carried a value, so no rule can apply.
    AllDimensionsMissing { record_id: String },
}

impl DataQualityWarning {
    pub fn record_id(&self) -> &str {
        match self {
            DataQualityWarning::AllDimensionsMissing { record_id } => record_id,
        }
    }
}

impl std::fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataQualityWarning::AllDimensionsMissing { record_id } => {
                write!(f, "record {record_id}: all dimension fields missing")
            }
        }
    }
}

/// Result alias for mining and labeling operations.
pub type Result<T> = std::result::Result<T, MiningError>;
