use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stages of one analysis run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Encode,
    Mine,
    Rules,
    Label,
    Report,
}

/// Per-run counters and stage timings, filled in as each stage finishes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineMetrics {
    /// When the run finished.
    pub completed_at: Option<DateTime<Utc>>,

    // Volumes
    pub records: usize,
    /// Transactions used as the support denominator.
    pub transactions: usize,
    /// Records that encoded to no atoms.
    pub empty_transactions: usize,
    pub itemsets: usize,
    /// Deepest Apriori level reached.
    pub levels: usize,
    pub rules: usize,
    pub anomalies: usize,
    /// Mining and rule generation were skipped in favour of a cached rule set.
    pub rules_from_cache: bool,

    // Timings
    pub encode_ms: f64,
    pub mining_ms: f64,
    pub rules_ms: f64,
    pub labeling_ms: f64,
    pub report_ms: f64,
    pub total_ms: f64,
    /// Labeling throughput.
    pub records_per_second: f64,
}

impl PipelineMetrics {
    /// Record how long a stage took.
    pub fn record_stage(&mut self, stage: Stage, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        match stage {
            Stage::Encode => self.encode_ms = ms,
            Stage::Mine => self.mining_ms = ms,
            Stage::Rules => self.rules_ms = ms,
            Stage::Label => {
                self.labeling_ms = ms;
                let secs = elapsed.as_secs_f64();
                if secs > 0.0 {
                    self.records_per_second = self.records as f64 / secs;
                }
            }
            Stage::Report => self.report_ms = ms,
        }
    }

    /// Record completion of the whole run.
    pub fn record_run(&mut self, elapsed: Duration) {
        self.completed_at = Some(Utc::now());
        self.total_ms = elapsed.as_secs_f64() * 1000.0;
    }

    /// Start a scoped timer for `stage`.
    pub fn timer(&self, stage: Stage) -> StageTimer {
        StageTimer {
            stage,
            start: Instant::now(),
        }
    }
}

/// A scoped timer for one pipeline stage.
pub struct StageTimer {
    stage: Stage,
    start: Instant,
}

impl StageTimer {
    /// Finalize the timer and record the stage duration.
    pub fn finish(self, metrics: &mut PipelineMetrics) {
        metrics.record_stage(self.stage, self.start.elapsed());
    }
}
