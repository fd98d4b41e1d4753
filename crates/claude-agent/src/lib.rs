//! `claude-agent`: synchronous driver for the Claude CLI in
//! `-p --output-format json` mode.
//!
//! ```text
//! QueryOptions
//!     │
//!     ▼
//! process::run   ← spawns `claude -p --output-format json … <prompt>`
//!     │             through process::run_captured, which drains
//!     │             stdout/stderr and enforces the timeout
//!     ▼
//! ClaudeOutput   ← the one JSON document on stdout
//!     │
//!     ▼
//! StructuredResponse { payload, model }
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use claude_agent::{query, QueryOptions};
//!
//! let opts = QueryOptions {
//!     model: Some("opus".into()),
//!     json_schema: Some(serde_json::json!({"type": "object"})),
//!     ..Default::default()
//! };
//! let response = query("Summarize this transcript: …", &opts)?;
//! println!("{}", serde_json::Value::Object(response.payload));
//! ```

pub mod error;
pub mod process;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::ClaudeAgentError;
pub use types::{ClaudeOutput, Effort, QueryOptions, StructuredResponse};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClaudeAgentError>;

const STDERR_TAIL_CHARS: usize = 1500;

/// Run one query and return its structured JSON payload.
///
/// A non-zero exit, empty stdout, unparseable stdout, `is_error: true` or a
/// missing payload are all errors; callers decide whether to retry.
pub fn query(prompt: &str, opts: &QueryOptions) -> Result<StructuredResponse> {
    tracing::debug!(command = ?opts.command, model = ?opts.model, "claude query");
    let completed = process::run(prompt, opts)?;

    if !completed.status.success() {
        let detail = if completed.stderr.trim().is_empty() {
            completed.stdout.trim()
        } else {
            completed.stderr.trim()
        };
        return Err(ClaudeAgentError::Exit {
            code: completed.status.code(),
            stderr: tail_chars(detail, STDERR_TAIL_CHARS),
        });
    }

    let output = ClaudeOutput::parse(&completed.stdout)?;
    let payload = output.payload()?;
    let model = output
        .dominant_model()
        .map(str::to_string)
        .or_else(|| opts.model.clone());

    Ok(StructuredResponse {
        payload,
        model,
        total_cost_usd: output.total_cost_usd,
    })
}

fn tail_chars(s: &str, max: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(max)).collect()
}
