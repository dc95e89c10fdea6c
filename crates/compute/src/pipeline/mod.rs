//! Batch triage pipeline orchestrator.
//!
//! Stages run strictly in sequence over one vitals run:
//!
//! - **Artifact filter** (optional): interpolation and motion-spike suppression.
//! - **Features**: trailing-window features, one row per complete index.
//! - **Severity**: persistence rules fused into a level 0..=3.
//! - **Anomaly**: isolation forest and PCA fitted on the normal segment.
//! - **Gate**: smoothed hybrid risk confirmed by rule severity.
//! - **Risk**: final score, triage level and terminal alert flag.

pub mod anomaly;
pub mod artifact;
pub mod features;
pub mod gate;
pub mod metrics;
pub mod risk;
pub mod severity;
pub mod types;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use triage_core::{FeatureFrame, Result, VitalsSample};
use triage_rules::TriageRules;

use self::anomaly::AnomalyScorer;
use self::artifact::{ArtifactFilter, ArtifactReport};
use self::features::FeatureExtractor;
use self::gate::AlertGate;
use self::metrics::PipelineMetrics;
use self::risk::RiskScorer;
use self::severity::SeverityDetector;
use self::types::{DecisionRow, FeatureVector, RiskLevel};

/// Output of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    /// Present when the artifact filter ran.
    pub artifacts: Option<ArtifactReport>,
    pub features: Vec<FeatureVector>,
    /// One audit row per emitted feature index.
    pub rows: Vec<DecisionRow>,
    pub metrics: PipelineMetrics,
}

impl PipelineReport {
    pub fn feature_frame(&self) -> Result<FeatureFrame> {
        features::to_frame(&self.features)
    }

    pub fn count_level(&self, level: RiskLevel) -> usize {
        self.rows.iter().filter(|r| r.risk_level == level.as_str()).count()
    }

    pub fn final_alerts(&self) -> usize {
        self.rows.iter().filter(|r| r.final_alert_flag == 1).count()
    }
}

/// Main pipeline orchestrator combining all batch stages.
pub struct Pipeline {
    rules: TriageRules,
    artifact_filter: Option<ArtifactFilter>,
}

impl Pipeline {
    pub fn new(rules: TriageRules) -> Self {
        Self {
            rules,
            artifact_filter: None,
        }
    }

    /// Clean raw vitals with the configured artifact filter before extraction.
    pub fn with_artifact_filter(mut self) -> Self {
        self.artifact_filter = Some(ArtifactFilter::new(self.rules.features.artifact_filter.clone()));
        self
    }

    pub fn rules(&self) -> &TriageRules {
        &self.rules
    }

    /// Run every stage over one vitals run, in time order.
    pub fn run(&self, samples: &[VitalsSample]) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4();
        let mut metrics = PipelineMetrics::start(samples.len());
        info!(%run_id, samples = samples.len(), "pipeline run started");

        let (cleaned, artifacts) = match &self.artifact_filter {
            Some(filter) => {
                let timer = metrics.stage_timer("artifact_filter");
                let (cleaned, report) = filter.clean(samples);
                timer.finish(&mut metrics, cleaned.len());
                (cleaned, Some(report))
            }
            None => (samples.to_vec(), None),
        };

        let timer = metrics.stage_timer("features");
        let features = FeatureExtractor::extract(&self.rules.features, &cleaned)?;
        timer.finish(&mut metrics, features.len());
        info!(
            %run_id,
            emitted = features.len(),
            dropped = cleaned.len() - features.len(),
            "features extracted"
        );

        if features.is_empty() {
            debug!(%run_id, samples = cleaned.len(), "no complete windows, nothing to score");
            metrics.finish(0);
            return Ok(PipelineReport {
                run_id,
                artifacts,
                features,
                rows: Vec::new(),
                metrics,
            });
        }

        let timer = metrics.stage_timer("severity");
        let severity = SeverityDetector::detect(&self.rules.detection, &features);
        timer.finish(&mut metrics, severity.len());

        let timer = metrics.stage_timer("anomaly");
        let scores = AnomalyScorer::new(&self.rules.scoring.anomaly).score_batch(&features)?;
        timer.finish(&mut metrics, scores.len());

        let timer = metrics.stage_timer("alert_gate");
        let gates = AlertGate::evaluate(&self.rules.detection.alert_gate, &scores, &severity)?;
        timer.finish(&mut metrics, gates.len());

        let timer = metrics.stage_timer("risk");
        let decisions = RiskScorer::new(&self.rules.scoring.risk).score_batch(&features, &scores, &gates)?;
        timer.finish(&mut metrics, decisions.len());

        let rows: Vec<DecisionRow> = features
            .iter()
            .zip(&severity)
            .zip(&scores)
            .zip(&gates)
            .zip(&decisions)
            .map(|((((f, s), a), g), d)| DecisionRow::assemble(f, s, a, g, d))
            .collect();
        metrics.finish(rows.len());

        let report = PipelineReport {
            run_id,
            artifacts,
            features,
            rows,
            metrics,
        };
        info!(
            %run_id,
            rows = report.rows.len(),
            red = report.count_level(RiskLevel::Red),
            amber = report.count_level(RiskLevel::Amber),
            final_alerts = report.final_alerts(),
            total_ms = report.metrics.total_ms(),
            "pipeline run complete"
        );
        Ok(report)
    }
}
