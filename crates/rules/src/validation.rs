//! Rule validation with structured errors and suggestions.
//!
//! Checks the header of every document and the numeric sanity of each kind's
//! spec. Returns a [`ValidationResult`] with errors (document rejected) and
//! warnings (advisory).

use serde::{Deserialize, Serialize};

use crate::detection_config::DetectionConfigRule;
use crate::feature_config::FeatureConfigRule;
use crate::schema::{CommonMetadata, RuleDocument};
use crate::scoring_config::ScoringConfigRule;

// ── Valid domain values ─────────────────────────────────────────────

/// Numeric columns produced by the feature extractor.
pub const KNOWN_FEATURE_COLUMNS: &[&str] = &[
    "hr_mean_30s",
    "hr_std_30s",
    "hr_slope_30s",
    "spo2_mean_30s",
    "spo2_delta_from_baseline",
    "spo2_seconds_below_94",
    "spo2_slope_60s",
    "sys_bp_mean_60s",
    "sys_bp_slope_60s",
    "motion_mean_10s",
];

// ── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// A blocking validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// Dotted location, e.g. `"spec.alert_gate.high_risk"`.
    pub path: String,
    pub message: String,
    /// Optional "Did you mean …?" suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        });
    }

    fn error_with_suggestion(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
            suggestion: Some(suggestion.into()),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            path: path.into(),
            message: message.into(),
        });
    }

    /// All error messages joined into one line, for logs and error values.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| match &e.suggestion {
                Some(s) => format!("{}: {} (did you mean '{}'?)", e.path, e.message, s),
                None => format!("{}: {}", e.path, e.message),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ── Public API ──────────────────────────────────────────────────────

pub fn validate_document(doc: &RuleDocument) -> ValidationResult {
    let mut result = ValidationResult::new();
    match doc {
        RuleDocument::FeatureConfig(rule) => {
            validate_header(&rule.api_version, &rule.kind, "FeatureConfig", &rule.metadata, &mut result);
            validate_features(rule, &mut result);
        }
        RuleDocument::DetectionConfig(rule) => {
            validate_header(&rule.api_version, &rule.kind, "DetectionConfig", &rule.metadata, &mut result);
            validate_detection(rule, &mut result);
        }
        RuleDocument::ScoringConfig(rule) => {
            validate_header(&rule.api_version, &rule.kind, "ScoringConfig", &rule.metadata, &mut result);
            validate_scoring(rule, &mut result);
        }
    }
    result
}

// ── Header ──────────────────────────────────────────────────────────

fn validate_header(
    api_version: &str,
    kind: &str,
    expected_kind: &str,
    metadata: &CommonMetadata,
    result: &mut ValidationResult,
) {
    if api_version != "v1" {
        result.error(
            "apiVersion",
            format!("apiVersion must be 'v1', got '{}'", api_version),
        );
    }
    if kind != expected_kind {
        result.error(
            "kind",
            format!("kind must be '{}', got '{}'", expected_kind, kind),
        );
    }
    if !is_kebab_case(&metadata.id) {
        result.error(
            "metadata.id",
            format!(
                "id must be kebab-case (lowercase alphanumeric + hyphens), got '{}'",
                metadata.id
            ),
        );
    }
}

// ── FeatureConfig ───────────────────────────────────────────────────

fn validate_features(rule: &FeatureConfigRule, result: &mut ValidationResult) {
    let spec = &rule.spec;
    let w = &spec.windows;
    for (name, len, min) in [
        ("heart_rate", w.heart_rate, 2),
        ("spo2_mean", w.spo2_mean, 1),
        ("spo2_persistence", w.spo2_persistence, 2),
        ("bp_systolic", w.bp_systolic, 2),
        ("motion", w.motion, 1),
    ] {
        if len < min {
            result.error(
                format!("spec.windows.{name}"),
                format!("window must hold at least {min} samples, got {len}"),
            );
        }
    }

    if spec.spo2_baseline_samples == 0 {
        result.error("spec.spo2_baseline_samples", "must be greater than 0");
    }
    if !(0.0..=100.0).contains(&spec.spo2_threshold) {
        result.error(
            "spec.spo2_threshold",
            format!("SpO2 threshold must be a percentage, got {}", spec.spo2_threshold),
        );
    }
    if !(0.0..=1.0).contains(&spec.high_motion_threshold) {
        result.warn(
            "spec.high_motion_threshold",
            "motion is normally reported in [0, 1]",
        );
    }

    let af = &spec.artifact_filter;
    if af.median_window == 0 || af.median_window % 2 == 0 {
        result.error(
            "spec.artifact_filter.median_window",
            format!("centred median needs an odd width, got {}", af.median_window),
        );
    }
    if af.hr_spike_threshold <= 0.0 || af.spo2_drop_threshold <= 0.0 {
        result.error(
            "spec.artifact_filter",
            "spike and drop thresholds must be positive",
        );
    }
}

// ── DetectionConfig ─────────────────────────────────────────────────

fn validate_detection(rule: &DetectionConfigRule, result: &mut ValidationResult) {
    let spec = &rule.spec;
    if spec.heart_rate.persist_rows == 0 {
        result.error("spec.heart_rate.persist_rows", "must be greater than 0");
    }
    if spec.bp_systolic.persist_rows == 0 {
        result.error("spec.bp_systolic.persist_rows", "must be greater than 0");
    }
    if spec.spo2.delta_threshold >= 0.0 {
        result.warn(
            "spec.spo2.delta_threshold",
            "a non-negative delta fires on every reading at or above baseline",
        );
    }
    if spec.spo2.fast_persist_seconds > spec.spo2.slow_persist_seconds {
        result.error(
            "spec.spo2",
            "fast_persist_seconds must not exceed slow_persist_seconds",
        );
    }

    let gate = &spec.alert_gate;
    if gate.smoothing_window == 0 {
        result.error("spec.alert_gate.smoothing_window", "must be greater than 0");
    }
    if gate.high_risk > gate.critical_risk {
        result.error(
            "spec.alert_gate",
            format!(
                "high_risk ({}) must not exceed critical_risk ({})",
                gate.high_risk, gate.critical_risk
            ),
        );
    }
    if gate.critical_min_level > 3 || gate.high_min_level > 3 {
        result.error("spec.alert_gate", "rule levels range from 0 to 3");
    }
    if gate.high_min_level > gate.critical_min_level {
        result.error(
            "spec.alert_gate",
            "high_min_level must not exceed critical_min_level",
        );
    }
}

// ── ScoringConfig ───────────────────────────────────────────────────

fn validate_scoring(rule: &ScoringConfigRule, result: &mut ValidationResult) {
    let spec = &rule.spec;
    let anomaly = &spec.anomaly;

    if anomaly.feature_columns.is_empty() {
        result.error("spec.anomaly.feature_columns", "at least one column is required");
    }
    for (i, col) in anomaly.feature_columns.iter().enumerate() {
        check_column(col, &format!("spec.anomaly.feature_columns[{i}]"), result);
    }
    if anomaly.normal_segment_minutes <= 0.0 {
        result.error("spec.anomaly.normal_segment_minutes", "must be positive");
    }
    if anomaly.isolation_forest.n_estimators == 0 {
        result.error("spec.anomaly.isolation_forest.n_estimators", "must be greater than 0");
    }
    if anomaly.isolation_forest.max_samples < 2 {
        result.error(
            "spec.anomaly.isolation_forest.max_samples",
            "must be at least 2",
        );
    }
    let v = anomaly.pca.variance_retained;
    if !(v > 0.0 && v <= 1.0) {
        result.error(
            "spec.anomaly.pca.variance_retained",
            format!("must be in (0, 1], got {v}"),
        );
    }
    check_weights(
        "spec.anomaly.weights",
        &[anomaly.weights.isolation_forest, anomaly.weights.pca],
        result,
    );
    if !(0.0..=1.0).contains(&anomaly.hybrid_threshold) {
        result.error(
            "spec.anomaly.hybrid_threshold",
            "hybrid scores lie in [0, 1]",
        );
    }

    let risk = &spec.risk;
    check_weights(
        "spec.risk.weights",
        &[risk.weights.anomaly, risk.weights.trend, risk.weights.confidence],
        result,
    );
    check_weights(
        "spec.risk.confidence_weights",
        &[risk.confidence_weights.anomaly, risk.confidence_weights.trend],
        result,
    );
    if risk.amber_threshold > risk.red_threshold {
        result.error("spec.risk", "amber_threshold must not exceed red_threshold");
    }
    if risk.normalization_epsilon <= 0.0 {
        result.error("spec.risk.normalization_epsilon", "must be positive");
    }
    if risk.trend_features.is_empty() {
        result.warn("spec.risk.trend_features", "trend severity will always be 0");
    }
    for (i, col) in risk.trend_features.iter().enumerate() {
        check_column(col, &format!("spec.risk.trend_features[{i}]"), result);
    }

    if spec.drift.z_threshold <= 0.0 {
        result.error("spec.drift.z_threshold", "must be positive");
    }

    let rt = &spec.realtime;
    if rt.amber_threshold > rt.red_threshold {
        result.error("spec.realtime", "amber_threshold must not exceed red_threshold");
    }
    if rt.max_risk <= 0.0 {
        result.error("spec.realtime.max_risk", "must be positive");
    }
    if rt.confidence.divisor <= 0.0 {
        result.error("spec.realtime.confidence.divisor", "must be positive");
    }
    if rt.confidence.max > 1.0 {
        result.error("spec.realtime.confidence.max", "confidence is capped at 1.0");
    }
}

fn check_column(col: &str, path: &str, result: &mut ValidationResult) {
    if KNOWN_FEATURE_COLUMNS.contains(&col) {
        return;
    }
    let message = format!("unknown feature column '{col}'");
    match fuzzy_match(col, KNOWN_FEATURE_COLUMNS) {
        Some(s) => result.error_with_suggestion(path, message, s),
        None => result.error(path, message),
    }
}

fn check_weights(path: &str, weights: &[f64], result: &mut ValidationResult) {
    if weights.iter().any(|w| *w < 0.0) {
        result.error(path, "weights must be non-negative");
        return;
    }
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        result.error(path, "at least one weight must be positive");
    } else if (sum - 1.0).abs() > 1e-6 {
        result.warn(path, format!("weights sum to {sum}, scores leave their usual range"));
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn is_kebab_case(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    let mut prev_was_hyphen = true;
    for ch in s.chars() {
        if ch == '-' {
            if prev_was_hyphen {
                return false;
            }
            prev_was_hyphen = true;
        } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            prev_was_hyphen = false;
        } else {
            return false;
        }
    }
    !prev_was_hyphen
}

fn fuzzy_match<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let input_lower = input.to_lowercase();
    let mut best: Option<(&str, usize)> = None;

    for &candidate in candidates {
        let dist = levenshtein(&input_lower, &candidate.to_lowercase());
        match best {
            None => best = Some((candidate, dist)),
            Some((_, best_dist)) if dist < best_dist => best = Some((candidate, dist)),
            _ => {}
        }
    }

    // Only suggest within half the longer string's length.
    best.and_then(|(name, dist)| {
        let max_len = input.len().max(name.len());
        (dist <= max_len / 2).then_some(name)
    })
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let n = b.len();

    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection_config::DetectionConfigRule;
    use crate::scoring_config::ScoringConfigRule;

    #[test]
    fn builtin_documents_are_valid() {
        for doc in [
            RuleDocument::FeatureConfig(FeatureConfigRule::builtin()),
            RuleDocument::DetectionConfig(DetectionConfigRule::builtin()),
            RuleDocument::ScoringConfig(ScoringConfigRule::builtin()),
        ] {
            let result = validate_document(&doc);
            assert!(result.valid, "{:?}: {}", doc.kind(), result.summary());
            assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        }
    }

    #[test]
    fn wrong_kind_and_bad_id_rejected() {
        let mut rule = DetectionConfigRule::builtin();
        rule.kind = "ScoringConfig".to_string();
        rule.metadata.id = "Detection_Default".to_string();
        let result = validate_document(&RuleDocument::DetectionConfig(rule));
        assert!(!result.valid);
        let paths: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"kind"));
        assert!(paths.contains(&"metadata.id"));
    }

    #[test]
    fn inverted_gate_thresholds_rejected() {
        let mut rule = DetectionConfigRule::builtin();
        rule.spec.alert_gate.high_risk = 0.9;
        let result = validate_document(&RuleDocument::DetectionConfig(rule));
        assert!(!result.valid);
        assert!(result.errors[0].message.contains("critical_risk"));
    }

    #[test]
    fn misspelled_column_gets_suggestion() {
        let mut rule = ScoringConfigRule::builtin();
        rule.spec.anomaly.feature_columns[0] = "hr_mean_30".to_string();
        let result = validate_document(&RuleDocument::ScoringConfig(rule));
        assert!(!result.valid);
        assert_eq!(result.errors[0].suggestion.as_deref(), Some("hr_mean_30s"));
        assert!(result.summary().contains("did you mean 'hr_mean_30s'"));
    }

    #[test]
    fn unbalanced_weights_warn_only() {
        let mut rule = ScoringConfigRule::builtin();
        rule.spec.anomaly.weights.pca = 0.6;
        let result = validate_document(&RuleDocument::ScoringConfig(rule));
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].path, "spec.anomaly.weights");
    }

    #[test]
    fn even_median_window_rejected() {
        let mut rule = FeatureConfigRule::builtin();
        rule.spec.artifact_filter.median_window = 4;
        let result = validate_document(&RuleDocument::FeatureConfig(rule));
        assert!(!result.valid);
    }

    #[test]
    fn kebab_case() {
        assert!(is_kebab_case("scoring-default"));
        assert!(is_kebab_case("icu-2"));
        assert!(!is_kebab_case("-leading"));
        assert!(!is_kebab_case("double--hyphen"));
        assert!(!is_kebab_case("Upper"));
    }

    #[test]
    fn levenshtein_basic() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
    }

    #[test]
    fn fuzzy_match_rejects_distant() {
        assert_eq!(fuzzy_match("zzzzzzzzzzzzzzz", KNOWN_FEATURE_COLUMNS), None);
    }
}
