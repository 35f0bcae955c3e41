//! rulemine: mine association rules from a JSON dataset and label every record.
//!
//! Reads an array of row objects, translates them through the configured field
//! mapping, runs the analysis pipeline and writes the full output as JSON.
//! Logs go to stderr so stdout stays machine-readable.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::{info, warn};

use rulemine_compute::{Pipeline, RuleSet};
use rulemine_core::config::load_dotenv;
use rulemine_core::{AnalysisConfig, CancellationToken, FieldValue, RawRow, RowTranslator};

// ── CLI ─────────────────────────────────────────────────────────────

/// Association rule mining and anomaly labeling over tabular records.
#[derive(Parser, Debug)]
#[command(name = "rulemine", version, about)]
struct Cli {
    /// JSON file holding an array of row objects.
    #[arg(long, env = "RULEMINE_RECORDS")]
    records: PathBuf,

    /// Analysis config (YAML).
    #[arg(long, env = "RULEMINE_CONFIG", default_value = "config/rulemine.yaml")]
    config: PathBuf,

    /// Write the analysis output here instead of stdout.
    #[arg(long, env = "RULEMINE_OUTPUT")]
    output: Option<PathBuf>,

    /// Rule set cache. Reused when its fingerprint matches, rewritten after mining.
    #[arg(long, env = "RULEMINE_RULES_CACHE")]
    rules_cache: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AnalysisConfig::from_path(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    config.apply_env_overrides();
    config.log_summary();
    let pipeline = Pipeline::new(config).context("invalid analysis config")?;

    let rows = read_rows(&cli.records)?;
    let records = RowTranslator::new(pipeline.config()).translate_all(&rows);
    info!(path = %cli.records.display(), records = records.len(), "records loaded");

    let cached = cli.rules_cache.as_deref().and_then(load_cached_rules);
    let output = pipeline.run_with_cache(&records, cached.as_ref(), &CancellationToken::new())?;

    if let Some(path) = &cli.rules_cache {
        if !output.metrics.rules_from_cache {
            output
                .rule_set()
                .save(path)
                .with_context(|| format!("failed to write rule cache {}", path.display()))?;
            info!(path = %path.display(), rules = output.rules.len(), "rule cache written");
        }
    }

    let json = serde_json::to_string_pretty(&output).context("failed to serialize output")?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write output {}", path.display()))?;
            info!(path = %path.display(), "output written");
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// A missing or unreadable cache is not fatal; mining simply runs.
fn load_cached_rules(path: &Path) -> Option<RuleSet> {
    if !path.exists() {
        return None;
    }
    match RuleSet::load(path) {
        Ok(set) => Some(set),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "ignoring unreadable rule cache");
            None
        }
    }
}

fn read_rows(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read records {}", path.display()))?;
    parse_rows(&text)
}

fn parse_rows(text: &str) -> anyhow::Result<Vec<RawRow>> {
    let value: serde_json::Value =
        serde_json::from_str(text).context("records file is not valid JSON")?;
    let rows = value
        .as_array()
        .ok_or_else(|| anyhow!("records file must hold a JSON array of objects"))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let object = row
                .as_object()
                .ok_or_else(|| anyhow!("row {} is not a JSON object", i + 1))?;
            Ok(object
                .iter()
                .map(|(key, value)| (key.clone(), FieldValue::from(value)))
                .collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_of_objects() {
        let json = r#"[{"Project Type": "Web", "Hours": 12}, {"Status": null}]"#;
        let rows = parse_rows(json).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Project Type"], FieldValue::Text("Web".into()));
        assert_eq!(rows[1]["Status"], FieldValue::Null);
    }

    #[test]
    fn rejects_non_array_input() {
        let err = parse_rows(r#"{"Project Type": "Web"}"#).unwrap_err();
        assert!(err.to_string().contains("JSON array"), "{err}");
    }

    #[test]
    fn rejects_non_object_row() {
        let err = parse_rows(r#"[{"a": 1}, 42]"#).unwrap_err();
        assert!(err.to_string().contains("row 2"), "{err}");
    }

    #[test]
    fn rejects_invalid_json() {
        let err = parse_rows("[{").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"), "{err}");
    }

    #[test]
    fn reads_rows_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, r#"[{"Team": "internal"}]"#).unwrap();
        assert_eq!(read_rows(&path).unwrap().len(), 1);
        assert!(read_rows(&dir.path().join("absent.json")).is_err());
    }
}
