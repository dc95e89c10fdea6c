//! Integration tests over the rule documents shipped in `data/rules/`.

use std::path::{Path, PathBuf};

use triage_rules::detection_config::DetectionConfigRule;
use triage_rules::feature_config::FeatureConfigRule;
use triage_rules::schema::{RuleDocument, RuleKind};
use triage_rules::scoring_config::{FinalAlertSource, ScoringConfigRule};
use triage_rules::RuleLoader;

/// Integration tests run from the crate directory, so go up two levels.
fn rules_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/rules")
}

fn load(relative: &str) -> RuleDocument {
    let loader = RuleLoader::new(rules_dir());
    loader
        .load_file(&rules_dir().join(relative))
        .unwrap_or_else(|e| panic!("{relative}: {e}"))
}

#[test]
fn every_shipped_file_loads() {
    let mut loader = RuleLoader::new(rules_dir());
    loader.load_all().unwrap();

    let mut kinds: Vec<RuleKind> = loader.documents().values().map(|d| d.kind()).collect();
    kinds.sort_by_key(|k| k.to_string());
    assert_eq!(
        kinds,
        vec![RuleKind::DetectionConfig, RuleKind::FeatureConfig, RuleKind::ScoringConfig]
    );
}

#[test]
fn feature_document_matches_builtin() {
    let RuleDocument::FeatureConfig(rule) = load("features/feature-config.yml") else {
        panic!("expected FeatureConfig");
    };
    assert_eq!(rule.metadata.id, "features-default");
    assert_eq!(rule.spec, FeatureConfigRule::builtin().spec);
}

#[test]
fn detection_document_matches_builtin() {
    let RuleDocument::DetectionConfig(rule) = load("detection/detection-config.yml") else {
        panic!("expected DetectionConfig");
    };
    assert_eq!(rule.spec, DetectionConfigRule::builtin().spec);
    assert_eq!(rule.spec.alert_gate.smoothing_window, 10);
}

#[test]
fn scoring_document_matches_builtin() {
    let RuleDocument::ScoringConfig(rule) = load("scoring/scoring-config.yml") else {
        panic!("expected ScoringConfig");
    };
    assert_eq!(rule.spec, ScoringConfigRule::builtin().spec);
    assert_eq!(rule.spec.anomaly.feature_columns.len(), 9);
    assert_eq!(rule.spec.risk.final_alert_source, FinalAlertSource::HybridAnomaly);
}
