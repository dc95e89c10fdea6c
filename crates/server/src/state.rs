use chrono::{DateTime, Utc};

use triage_compute::RealtimeScorer;

pub struct AppState {
    pub scorer: RealtimeScorer,
    /// Profile the server was configured with, for `/health`.
    pub profile: String,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(scorer: RealtimeScorer, profile: impl Into<String>) -> Self {
        Self {
            scorer,
            profile: profile.into(),
            started_at: Utc::now(),
        }
    }
}
