use crate::schema::Violation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackboneError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("malformed task line {line}: {reason}")]
    MalformedTask { line: usize, reason: String },

    #[error("invalid {field} for task '{task_id}': {reason}")]
    InvalidField {
        task_id: String,
        field: String,
        reason: String,
    },

    #[error("invalid transition for task '{task_id}' from {from} to {to}")]
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
    },

    #[error(
        "verification gate failed for task '{task_id}': failed suites [{}], missing evidence [{}]",
        .failed_suites.join(", "),
        .missing_evidence.join(", ")
    )]
    GateFailure {
        task_id: String,
        failed_suites: Vec<String>,
        missing_evidence: Vec<String>,
    },

    #[error("task '{task_id}' requires a fresh passing verify: {reason}")]
    VerificationRequired { task_id: String, reason: String },

    #[error("stage '{stage}' failed: {message}")]
    StageFailure { stage: String, message: String },

    #[error(
        "schema validation failed for {profile}: {}",
        .violations.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; ")
    )]
    SchemaViolation {
        profile: String,
        violations: Vec<Violation>,
    },

    #[error("unsupported profile '{0}'")]
    UnsupportedProfile(String),

    #[error("source file does not exist or is a directory: {0}")]
    SourceInvalid(String),

    #[error("artifact already exists: {0}")]
    ArtifactExists(String),

    #[error("invalid artifact: {0}")]
    ArtifactInvalid(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("event log corrupt at line {line}: {reason}")]
    EventLogCorrupt { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BackboneError>;
