use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaudeAgentError {
    #[error("claude command not found: {0}")]
    NotFound(String),

    #[error("claude call timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("claude exited with {}: {stderr}", .code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    Exit { code: Option<i32>, stderr: String },

    #[error("claude produced no output")]
    EmptyOutput,

    #[error("failed to parse claude output: {source}\n  output: {output}")]
    Parse {
        output: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("claude reported an error: {0}")]
    ResultError(String),

    #[error("claude output has no structured JSON payload")]
    NoPayload,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
