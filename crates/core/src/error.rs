use thiserror::Error;

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    /// A prior stage's output is absent; the current stage cannot run.
    #[error("Missing upstream artifact: {0}")]
    MissingUpstreamArtifact(String),

    /// An input batch lacks a column the stage needs.
    #[error("Schema mismatch: expected column '{column}' is absent")]
    SchemaMismatch { column: String },

    /// Two stage outputs that must align row-for-row have different lengths.
    #[error("Stage mismatch in {stage}: expected {expected} rows, got {actual}")]
    StageMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for TriageError {
    fn from(e: serde_json::Error) -> Self {
        TriageError::Serialize(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TriageError>;
