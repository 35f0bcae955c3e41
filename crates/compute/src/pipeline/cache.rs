use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use rulemine_core::{MiningConfig, Result};

use crate::algorithms::apriori::{format_atoms, Transaction};
use crate::algorithms::rules::Rule;

/// A persisted rule set, reusable while the mining inputs are unchanged.
///
/// The `fingerprint` is a SHA-256 hex digest of the mining thresholds and the
/// sorted, newline-joined encoded transactions. Record order does not affect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub fingerprint: String,
    /// RFC 3339 timestamp of when the rules were mined.
    pub created_at: String,
    /// Schema version for forward compatibility.
    pub version: u32,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(fingerprint: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            created_at: Utc::now().to_rfc3339(),
            version: 1,
            rules,
        }
    }

    pub fn is_fresh(&self, fingerprint: &str) -> bool {
        self.fingerprint == fingerprint
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let set: RuleSet = serde_json::from_str(&json)?;
        debug!(path = %path.display(), rules = set.rules.len(), "rule set loaded");
        Ok(set)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), rules = self.rules.len(), "rule set saved");
        Ok(())
    }
}

/// Fingerprint of everything rule mining depends on.
pub fn fingerprint(mining: &MiningConfig, transactions: &[Transaction]) -> String {
    let mut lines: Vec<String> = transactions
        .iter()
        .map(|t| format_atoms(&t.atoms().cloned().collect::<Vec<_>>()))
        .collect();
    lines.sort();

    let header = format!(
        "min_support={:?}\nmin_confidence={:?}\nmin_lift={:?}\n\
         max_itemset_size={:?}\nmax_candidates={}",
        mining.min_support,
        mining.min_confidence,
        mining.min_lift,
        mining.max_itemset_size,
        mining.max_candidates,
    );
    let joined = std::iter::once(header).chain(lines).collect::<Vec<_>>().join("\n");
    let digest = Sha256::digest(joined.as_bytes());
    format!("{digest:x}")
}
