pub mod cancel;
pub mod config;
pub mod error;
pub mod mapping;
pub mod record;

pub use cancel::CancellationToken;
pub use config::{
    AnalysisConfig, ComplianceConfig, LabelingConfig, MiningConfig, RiskThresholds, ScoreWeights,
};
pub use error::*;
pub use mapping::{FieldMapping, RowTranslator};
pub use record::*;
