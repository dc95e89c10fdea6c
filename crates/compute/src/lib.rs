pub mod baseline;
pub mod drift;
pub mod io;
pub mod pipeline;
pub mod realtime;
pub mod simulate;
pub mod window;

pub use baseline::BaselineStats;
pub use drift::{detect_drift, inject_drift, DriftReport};
pub use pipeline::types::{
    AlertLevel, AlertState, AnomalyScore, DecisionRecord, DecisionRow, FeatureVector, RiskLevel,
    SeverityReason, SeverityRecord,
};
pub use pipeline::{Pipeline, PipelineReport};
pub use realtime::{RealtimeAssessment, RealtimeScorer, RealtimeVitals};
pub use simulate::SyntheticRun;
