//! End-to-end runs of the analysis pipeline over small, hand-checked datasets.

use rulemine_compute::{
    generate_rules, mine, AprioriConfig, Atom, CategoricalEncoder, Pipeline, RecordLabeler,
    RiskCategory, Rule, RuleConfig, Transaction,
};
use rulemine_core::{
    AnalysisConfig, CancellationToken, FieldValue, LabelingConfig, RawRow, Record, RowTranslator,
};

/// Resolve the sample config relative to the workspace root.
fn sample_config_path() -> std::path::PathBuf {
    let manifest = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../config/rulemine.yaml")
}

fn atoms(pairs: &[(&str, &str)]) -> Vec<Atom> {
    pairs.iter().map(|(f, v)| Atom::new(*f, *v)).collect()
}

fn base_config(fields: &[&str]) -> AnalysisConfig {
    let mut config = AnalysisConfig::new(fields.iter().copied());
    config.mining.min_support = 0.1;
    config.mining.min_confidence = 0.5;
    config.mining.min_lift = 1.0;
    config
}

fn rule(id: &str, antecedent: &[(&str, &str)], consequent: &[(&str, &str)]) -> Rule {
    Rule {
        id: id.to_string(),
        antecedent: atoms(antecedent),
        consequent: atoms(consequent),
        support: 0.4,
        confidence: 0.8,
        lift: 1.6,
        antecedent_support: 0.5,
        consequent_support: 0.5,
        leverage: 0.15,
        conviction: Some(2.5),
        count: 4,
    }
}

// ── Scenario A: support and confidence of a dominant pair ───────────

#[test]
fn web_p0_support_and_confidence() {
    let mut transactions = vec![Transaction::new(atoms(&[("type", "Web"), ("level", "P0")])); 8];
    transactions.extend(vec![
        Transaction::new(atoms(&[("type", "Web"), ("level", "P1")]));
        2
    ]);

    let frequent = mine(
        &transactions,
        &AprioriConfig {
            min_support: 0.1,
            ..AprioriConfig::default()
        },
    )
    .unwrap();
    let pair = frequent
        .itemsets
        .iter()
        .find(|s| s.items == atoms(&[("level", "P0"), ("type", "Web")]))
        .expect("{type=Web, level=P0} is frequent");
    assert!((pair.support - 0.8).abs() < 1e-9);

    let rules = generate_rules(
        &frequent,
        &RuleConfig {
            min_confidence: 0.5,
            min_lift: 1.0,
        },
    )
    .unwrap();
    let rule = rules
        .iter()
        .find(|r| {
            r.antecedent == atoms(&[("type", "Web")]) && r.consequent == atoms(&[("level", "P0")])
        })
        .expect("type=Web -> level=P0");
    assert!((rule.confidence - 0.8).abs() < 1e-9);
}

// ── Scenario B: a rule at its expected confidence lands in no bucket ─

#[test]
fn quarter_violations_land_in_no_bucket() {
    let mut records = Vec::new();
    for i in 0..20 {
        records.push(
            Record::new(format!("x{i}"))
                .with_dimension("region", "X")
                .with_dimension("status", if i < 15 { "Y" } else { "Z" }),
        );
    }
    for i in 0..20 {
        records.push(
            Record::new(format!("w{i}"))
                .with_dimension("region", "W")
                .with_dimension("status", "Z"),
        );
    }

    let pipeline = Pipeline::new(base_config(&["region", "status"])).unwrap();
    let output = pipeline.run(&records, &CancellationToken::new()).unwrap();

    let rule = output
        .rules
        .iter()
        .find(|r| {
            r.antecedent == atoms(&[("region", "X")]) && r.consequent == atoms(&[("status", "Y")])
        })
        .expect("region=X -> status=Y");
    assert!((rule.confidence - 0.75).abs() < 1e-9);

    let detail = output
        .report
        .rule_details
        .iter()
        .find(|d| d.rule_id == rule.id)
        .unwrap();
    assert_eq!(detail.antecedent_match_count, 20);
    assert_eq!(detail.violation_count, 5);
    assert!((detail.violation_rate - 0.25).abs() < 1e-9);
    assert!(detail.buckets.is_empty());
    assert!(!output.report.summary.effective_rules.contains(&rule.id));
    assert!(!output.report.summary.high_violation_rules.contains(&rule.id));
}

// ── Scenario C: unmatched record ────────────────────────────────────

#[test]
fn record_outside_every_rule_is_unmatched() {
    let mut records: Vec<Record> = (0..10)
        .map(|i| {
            Record::new(format!("p{i}"))
                .with_dimension("type", "Web")
                .with_dimension("level", if i < 8 { "P0" } else { "P1" })
        })
        .collect();
    records.push(
        Record::new("odd")
            .with_dimension("type", "Mainframe")
            .with_dimension("level", "P9"),
    );

    let mut config = base_config(&["type", "level"]);
    config.mining.min_support = 0.5;
    let output = Pipeline::new(config)
        .unwrap()
        .run(&records, &CancellationToken::new())
        .unwrap();

    let odd = output.labeled.iter().find(|r| r.record.id == "odd").unwrap();
    assert_eq!(odd.risk_category, RiskCategory::Unmatched);
    assert_eq!(odd.anomaly_score, 0.0);
    assert!(odd.rule_labels.is_empty());
    assert!(odd.rule_violations.is_empty());
    assert!(odd.warnings.is_empty());
}

// ── Scenario D: three satisfied, one violated ───────────────────────

#[test]
fn three_satisfied_one_violated_is_low_risk() {
    let rules = vec![
        rule("Rule_1", &[("region", "X")], &[("status", "open")]),
        rule("Rule_2", &[("team", "red")], &[("tier", "gold")]),
        rule("Rule_3", &[("status", "open")], &[("team", "red")]),
        rule("Rule_4", &[("tier", "gold")], &[("region", "Y")]),
    ];
    let record = Record::new("p1")
        .with_dimension("region", "X")
        .with_dimension("status", "open")
        .with_dimension("team", "red")
        .with_dimension("tier", "gold");

    let encoder = CategoricalEncoder::new(["region", "status", "team", "tier"]);
    let config = LabelingConfig::default();
    let labeled = RecordLabeler::new(&encoder, &config).label(&[record], &rules);

    let r = &labeled[0];
    assert_eq!(r.rule_labels.len(), 3);
    assert_eq!(r.rule_violations, vec!["Rule_4"]);
    assert_eq!(r.anomaly_score, 0.5);
    assert_eq!(r.risk_category, RiskCategory::LowRisk);
}

// ── Properties over a mixed dataset ─────────────────────────────────

fn portfolio() -> Vec<Record> {
    (0..60)
        .map(|i| {
            let project_type = ["Web", "Mobile", "API"][i % 3];
            let level = if i % 3 == 0 && i % 4 != 0 { "P0" } else { "P1" };
            let department = if i % 3 == 0 { "QA-A" } else { "QA-B" };
            let team = if i % 5 == 0 { "outsourced" } else { "internal" };
            Record::new(format!("proj-{i:03}"))
                .with_dimension("project_type", project_type)
                .with_dimension("project_level", level)
                .with_dimension("quality_department", department)
                .with_dimension("team", team)
                .with_metric("test_hours", (i % 17) as f64 * 3.5)
        })
        .collect()
}

fn portfolio_config() -> AnalysisConfig {
    let mut config = base_config(&["project_type", "project_level", "quality_department", "team"]);
    config.metric_fields = vec!["test_hours".to_string()];
    config.discretize_metrics = vec!["test_hours".to_string()];
    config.mining.min_confidence = 0.6;
    config.mining.min_lift = 1.2;
    config
}

#[test]
fn labels_are_exhaustive_and_scores_non_negative() {
    let records = portfolio();
    let output = Pipeline::new(portfolio_config())
        .unwrap()
        .run(&records, &CancellationToken::new())
        .unwrap();
    assert!(!output.rules.is_empty());
    assert_eq!(output.bins.len(), 1);

    for rule in &output.rules {
        assert!(rule.confidence >= 0.6);
        assert!(rule.lift >= 1.2);
        assert!(rule.antecedent.iter().all(|a| !rule.consequent.contains(a)));
    }

    for labeled in &output.labeled {
        assert!(labeled.anomaly_score >= 0.0);
        for rule in &output.rules {
            let satisfied = labeled.rule_labels.contains(&rule.id);
            let violated = labeled.rule_violations.contains(&rule.id);
            assert!(!(satisfied && violated), "{} on {}", rule.id, labeled.record.id);
        }
        assert_eq!(labeled.rule_violations.len(), labeled.anomaly_flags.len());
    }

    let matched: usize = output
        .report
        .rule_details
        .iter()
        .map(|d| d.antecedent_match_count)
        .sum();
    let labels: usize = output
        .labeled
        .iter()
        .map(|r| r.rule_labels.len() + r.rule_violations.len())
        .sum();
    assert_eq!(matched, labels);
}

#[test]
fn repeated_runs_agree() {
    let records = portfolio();
    let pipeline = Pipeline::new(portfolio_config()).unwrap();
    let first = pipeline.run(&records, &CancellationToken::new()).unwrap();
    let second = pipeline.run(&records, &CancellationToken::new()).unwrap();

    assert_eq!(first.rules, second.rules);
    assert_eq!(first.labeled, second.labeled);
    assert_eq!(first.report, second.report);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_ne!(first.run_id, second.run_id);
}

#[test]
fn records_without_values_are_kept_and_counted() {
    let mut records = portfolio();
    records.push(Record::new("blank").with_missing_dimension("project_type"));

    let output = Pipeline::new(portfolio_config())
        .unwrap()
        .run(&records, &CancellationToken::new())
        .unwrap();

    assert_eq!(output.labeled.len(), 61);
    assert_eq!(output.data_quality.records_without_dimensions, 1);
    assert_eq!(output.metrics.empty_transactions, 1);
    assert_eq!(output.metrics.transactions, 60);
    assert_eq!(output.report.data_quality_warnings, 1);

    let blank = output.labeled.iter().find(|r| r.record.id == "blank").unwrap();
    assert_eq!(blank.risk_category, RiskCategory::Unmatched);
}

#[test]
fn metric_only_record_is_unmatched_and_counted() {
    let mut records: Vec<Record> = (0..40)
        .map(|i| {
            let (team, hours) = if i % 2 == 0 {
                ("red", 100.0 + i as f64)
            } else {
                ("blue", i as f64)
            };
            Record::new(format!("p{i}"))
                .with_dimension("team", team)
                .with_metric("hours", hours)
        })
        .collect();
    records.push(
        Record::new("nodims")
            .with_missing_dimension("team")
            .with_metric("hours", 500.0),
    );

    let mut config = base_config(&["team"]);
    config.metric_fields = vec!["hours".to_string()];
    config.discretize_metrics = vec!["hours".to_string()];
    let output = Pipeline::new(config)
        .unwrap()
        .run(&records, &CancellationToken::new())
        .unwrap();

    // Binned hours still drive rules for the staffed records.
    assert!(output
        .rules
        .iter()
        .any(|r| r.antecedent.iter().any(|a| a.field == "hours")));
    assert_eq!(output.metrics.transactions, 40);
    assert_eq!(output.data_quality.records_without_dimensions, 1);

    let nodims = output.labeled.iter().find(|r| r.record.id == "nodims").unwrap();
    assert_eq!(nodims.risk_category, RiskCategory::Unmatched);
    assert_eq!(nodims.anomaly_score, 0.0);
    assert!(nodims.rule_labels.is_empty());
    assert!(nodims.rule_violations.is_empty());
    assert!(nodims.anomaly_flags.is_empty());
    assert_eq!(nodims.warnings.len(), 1);
}

#[test]
fn rule_cache_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.json");
    let records = portfolio();
    let pipeline = Pipeline::new(portfolio_config()).unwrap();

    let first = pipeline.run(&records, &CancellationToken::new()).unwrap();
    first.rule_set().save(&path).unwrap();

    let cached = rulemine_compute::RuleSet::load(&path).unwrap();
    let second = pipeline
        .run_with_cache(&records, Some(&cached), &CancellationToken::new())
        .unwrap();
    assert!(second.metrics.rules_from_cache);
    assert_eq!(second.labeled, first.labeled);
}

// ── Raw rows through the field mapping ──────────────────────────────

#[test]
fn sample_config_drives_raw_rows() {
    let config = AnalysisConfig::from_path(sample_config_path()).unwrap();
    config.validate().unwrap();

    let rows: Vec<RawRow> = (0..40)
        .map(|i| {
            let mut row = RawRow::new();
            row.insert("Project ID".into(), FieldValue::Text(format!("PRJ-{i}")));
            row.insert(
                "Project Type".into(),
                FieldValue::Text(if i % 2 == 0 { "Web" } else { "Mobile" }.into()),
            );
            row.insert(
                "Project Level".into(),
                FieldValue::Text(if i % 2 == 0 { "P0" } else { "P1" }.into()),
            );
            row.insert(
                "Quality Dept".into(),
                FieldValue::Text(if i % 2 == 0 { "QA-A" } else { "QA-B" }.into()),
            );
            row.insert("Team".into(), FieldValue::Text("internal".into()));
            row.insert("Status".into(), FieldValue::Null);
            row.insert("Test Hours".into(), FieldValue::Integer(10 + i));
            row.insert("Defects".into(), FieldValue::Text(format!("{}", i % 4)));
            row
        })
        .collect();

    let records = RowTranslator::new(&config).translate_all(&rows);
    assert_eq!(records[3].id, "PRJ-3");
    assert_eq!(records[3].dimension("project_type"), Some("Mobile"));
    assert_eq!(records[3].dimension("status"), None);
    assert_eq!(records[3].metric("defect_count"), Some(3.0));

    let output = Pipeline::new(config)
        .unwrap()
        .run(&records, &CancellationToken::new())
        .unwrap();
    assert!(output
        .rules
        .iter()
        .any(|r| r.antecedent == atoms(&[("project_type", "Web")])
            && r.consequent == atoms(&[("project_level", "P0")])));
    assert_eq!(output.report.anomaly_count, 0);
}
