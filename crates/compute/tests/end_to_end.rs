use std::path::PathBuf;

use triage_compute::io;
use triage_compute::pipeline::features::to_frame;
use triage_compute::{
    detect_drift, inject_drift, BaselineStats, DecisionRow, FeatureVector, Pipeline, PipelineReport, RiskLevel, SyntheticRun,
};
use triage_core::VitalsSample;
use triage_rules::TriageRules;

fn synthetic() -> Vec<VitalsSample> {
    SyntheticRun::default().generate().unwrap()
}

fn run(samples: &[VitalsSample]) -> PipelineReport {
    Pipeline::new(TriageRules::default()).run(samples).unwrap()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    sum / n as f64
}

#[test]
fn rows_align_with_emitted_features() {
    let samples = synthetic();
    let report = run(&samples);

    assert_eq!(report.rows.len(), report.features.len());
    assert!(!report.rows.is_empty());
    assert!(report.rows.len() < samples.len());
    assert!(report.rows[0].time_sec >= 59);
    assert!(report.rows.windows(2).all(|w| w[0].time_sec < w[1].time_sec));

    let stages: Vec<&str> = report.metrics.stage_ms.keys().map(String::as_str).collect();
    assert_eq!(stages, vec!["features", "severity", "anomaly", "alert_gate", "risk"]);
    assert_eq!(report.metrics.samples_in, samples.len());
    assert_eq!(report.metrics.rows_out, report.rows.len());
}

#[test]
fn run_shorter_than_longest_window_yields_empty_report() {
    let samples: Vec<VitalsSample> = (0..50)
        .map(|t| VitalsSample::complete(t, 80.0, 97.0, 120.0, 80.0, 0.2))
        .collect();
    let report = run(&samples);

    assert!(report.features.is_empty());
    assert!(report.rows.is_empty());
    assert_eq!(report.final_alerts(), 0);
    assert_eq!(report.metrics.samples_in, 50);
    assert_eq!(report.metrics.rows_out, 0);
    let stages: Vec<&str> = report.metrics.stage_ms.keys().map(String::as_str).collect();
    assert_eq!(stages, vec!["features"]);
}

#[test]
fn same_input_same_decisions() {
    let samples = synthetic();
    let a = run(&samples);
    let b = run(&samples);
    assert_ne!(a.run_id, b.run_id);
    assert_eq!(a.rows, b.rows);
}

#[test]
fn distress_phase_scores_higher_than_normal_phase() {
    let report = run(&synthetic());
    let normal = mean(report.rows.iter().filter(|r| r.time_sec < 600).map(|r| r.risk_score));
    let distress = mean(
        report
            .rows
            .iter()
            .filter(|r| (900..1200).contains(&r.time_sec))
            .map(|r| r.risk_score),
    );
    assert!(distress > normal, "distress {distress} vs normal {normal}");

    let normal_hybrid = mean(report.rows.iter().filter(|r| r.time_sec < 600).map(|r| r.hybrid_risk_score));
    let distress_hybrid = mean(
        report
            .rows
            .iter()
            .filter(|r| (900..1200).contains(&r.time_sec))
            .map(|r| r.hybrid_risk_score),
    );
    assert!(distress_hybrid > normal_hybrid);
}

#[test]
fn raw_scores_normalize_to_unit_interval() {
    let report = run(&synthetic());
    let columns: [fn(&DecisionRow) -> f64; 2] = [|r| r.if_score_norm, |r| r.pca_score_norm];
    for column in columns {
        let min = report.rows.iter().map(column).fold(f64::INFINITY, f64::min);
        let max = report.rows.iter().map(column).fold(f64::NEG_INFINITY, f64::max);
        assert!(min.abs() < 1e-9);
        assert!((max - 1.0).abs() < 1e-9);
    }
}

#[test]
fn gate_and_final_flag_follow_precedence() {
    let report = run(&synthetic());
    for r in &report.rows {
        let expected = if r.avg_risk >= 0.8 && r.anomaly_level >= 2 {
            "CRITICAL"
        } else if r.avg_risk >= 0.6 && r.anomaly_level >= 1 {
            "HIGH"
        } else if r.avg_risk >= 0.6 {
            "SUPPRESSED"
        } else {
            "normal"
        };
        assert_eq!(r.alert_level, expected, "t={}", r.time_sec);
        assert_eq!(r.final_alert == 1, matches!(expected, "CRITICAL" | "HIGH"));

        if r.final_alert_flag == 1 {
            assert_eq!(r.risk_level, RiskLevel::Red.as_str());
            assert_eq!(r.hybrid_anomaly, 1);
        }
        if r.hybrid_anomaly == 1 && r.risk_level == "RED" {
            assert_eq!(r.final_alert_flag, 1);
        }
        assert!(r.anomaly_level <= 3);
    }
}

#[test]
fn decision_csv_has_one_line_per_row() {
    let report = run(&synthetic());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("final_decision.csv");
    io::write_decisions_path(&path, &report.rows).unwrap();

    let frame = io::read_frame_path(&path).unwrap();
    assert_eq!(frame.len(), report.rows.len());
    for column in ["time_sec", "hybrid_risk_score", "risk_score", "final_alert_flag", "if_score"] {
        assert!(frame.contains(column), "missing {column}");
    }
    // Text columns are present in the file but skipped as numbers.
    assert!(!frame.contains("risk_level"));
}

#[test]
fn baseline_from_normal_phase_flags_injected_drift() {
    let report = run(&synthetic());
    let normal: Vec<FeatureVector> = report.features.iter().filter(|f| f.time_sec < 600).cloned().collect();
    let frame = to_frame(&normal).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("training_stats.json");
    BaselineStats::fit(&frame).save(&path).unwrap();
    let stats = BaselineStats::load(&path).unwrap();

    let clean = detect_drift(&frame, &stats, 2.5);
    assert!(!clean.has_drift());
    assert_eq!(clean, detect_drift(&frame, &stats, 2.5));

    let shifted = inject_drift(&frame, "hr_mean_30s", 3.0).unwrap();
    let drift = detect_drift(&shifted, &stats, 2.5);
    assert_eq!(drift.drifted, vec!["hr_mean_30s".to_string()]);

    // The distress phase moves the whole run away from the normal baseline.
    let whole_run = detect_drift(&report.feature_frame().unwrap(), &stats, 2.5);
    assert!(whole_run.drifted.contains(&"hr_mean_30s".to_string()));
}

#[test]
fn artifact_filter_runs_first_and_reports() {
    let samples = synthetic();
    let report = Pipeline::new(TriageRules::default())
        .with_artifact_filter()
        .run(&samples)
        .unwrap();
    let artifacts = report.artifacts.unwrap();
    assert!(artifacts.interpolated > 0);
    assert_eq!(
        report.metrics.stage_ms.keys().next().map(String::as_str),
        Some("artifact_filter")
    );
    // Interpolated dropouts no longer blank whole windows.
    assert!(report.rows.len() > run(&samples).rows.len());
}

#[test]
fn shipped_rules_match_builtin_defaults() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/rules");
    let rules = TriageRules::load(&dir).unwrap();
    assert_eq!(rules, TriageRules::default());
}

#[test]
fn vitals_csv_round_trip_feeds_the_pipeline() {
    let samples = synthetic();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vitals.csv");
    io::write_vitals_path(&path, &samples).unwrap();
    let read = io::read_vitals_path(&path).unwrap();
    assert_eq!(read, samples);
    assert_eq!(run(&read).rows, run(&samples).rows);
}
