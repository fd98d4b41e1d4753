use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{ClaudeAgentError, Result};

// ─── ClaudeOutput ─────────────────────────────────────────────────────────

/// The single JSON document printed by `claude -p --output-format json`.
///
/// Only the fields this crate reads are typed; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaudeOutput {
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub structured_output: Option<Value>,
    #[serde(default, alias = "modelUsage")]
    pub model_usage: BTreeMap<String, Value>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
}

impl ClaudeOutput {
    pub fn parse(stdout: &str) -> Result<Self> {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Err(ClaudeAgentError::EmptyOutput);
        }
        serde_json::from_str(trimmed).map_err(|source| ClaudeAgentError::Parse {
            output: truncate(trimmed, 500),
            source,
        })
    }

    /// The structured payload: `structured_output` when it is an object,
    /// else `result` parsed as a JSON object.
    pub fn payload(&self) -> Result<Map<String, Value>> {
        if self.is_error {
            let detail = self
                .result
                .as_ref()
                .and_then(Value::as_str)
                .unwrap_or("is_error=true");
            return Err(ClaudeAgentError::ResultError(detail.to_string()));
        }

        if let Some(Value::Object(map)) = &self.structured_output {
            return Ok(map.clone());
        }

        match self.result.as_ref().and_then(Value::as_str).map(str::trim) {
            Some(text) if !text.is_empty() => {
                match serde_json::from_str::<Value>(text).map_err(|source| {
                    ClaudeAgentError::Parse {
                        output: truncate(text, 500),
                        source,
                    }
                })? {
                    Value::Object(map) => Ok(map),
                    _ => Err(ClaudeAgentError::NoPayload),
                }
            }
            _ => Err(ClaudeAgentError::NoPayload),
        }
    }

    /// The model that accounted for the highest `costUSD`, if any entry
    /// reports one.
    pub fn dominant_model(&self) -> Option<&str> {
        self.model_usage
            .iter()
            .filter_map(|(name, usage)| {
                usage
                    .get("costUSD")
                    .and_then(Value::as_f64)
                    .map(|cost| (name.as_str(), cost))
            })
            .fold(None, |best: Option<(&str, f64)>, (name, cost)| match best {
                Some((_, best_cost)) if best_cost >= cost => best,
                _ => Some((name, cost)),
            })
            .map(|(name, _)| name)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}…")
    }
}

// ─── StructuredResponse ───────────────────────────────────────────────────

/// A successful structured query.
#[derive(Debug, Clone)]
pub struct StructuredResponse {
    pub payload: Map<String, Value>,
    /// Dominant model from `modelUsage`, else the requested model.
    pub model: Option<String>,
    pub total_cost_usd: Option<f64>,
}

// ─── QueryOptions ─────────────────────────────────────────────────────────

/// Options for one `claude -p --output-format json` invocation.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Program and leading arguments, e.g. `["claude"]` or `["python3", "fake.py"]`.
    pub command: Vec<String>,
    pub model: Option<String>,
    pub effort: Option<Effort>,
    /// Passed as `--json-schema`.
    pub json_schema: Option<Value>,
    /// Passed as `--tools`; `Some("")` disables every tool.
    pub tools: Option<String>,
    pub no_session_persistence: bool,
    /// Kill the process after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            command: vec!["claude".to_string()],
            model: None,
            effort: None,
            json_schema: None,
            tools: Some(String::new()),
            no_session_persistence: true,
            timeout: None,
            cwd: None,
            env: HashMap::new(),
        }
    }
}

impl QueryOptions {
    /// Arguments after the program name, with `prompt` last.
    pub fn args(&self, prompt: &str) -> Vec<String> {
        let mut args: Vec<String> = self.command.iter().skip(1).cloned().collect();
        args.extend(["-p", "--output-format", "json"].map(String::from));
        if let Some(schema) = &self.json_schema {
            args.push("--json-schema".into());
            args.push(schema.to_string());
        }
        if let Some(model) = &self.model {
            args.push("--model".into());
            args.push(model.clone());
        }
        if let Some(effort) = self.effort {
            args.push("--effort".into());
            args.push(effort.as_str().into());
        }
        if let Some(tools) = &self.tools {
            args.push("--tools".into());
            args.push(tools.clone());
        }
        if self.no_session_persistence {
            args.push("--no-session-persistence".into());
        }
        args.push(prompt.to_string());
        args
    }
}

/// Effort level for Claude reasoning depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effort {
    Low,
    Medium,
    High,
    Max,
}

impl Effort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effort::Low => "low",
            Effort::Medium => "medium",
            Effort::High => "high",
            Effort::Max => "max",
        }
    }
}

impl std::str::FromStr for Effort {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(Effort::Low),
            "medium" => Ok(Effort::Medium),
            "high" => Ok(Effort::High),
            "max" => Ok(Effort::Max),
            other => Err(format!(
                "invalid effort '{other}' (expected low, medium, high or max)"
            )),
        }
    }
}
