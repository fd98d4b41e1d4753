//! Binds the pipeline's `Analyzer` seam to the `claude` CLI.

use backbone_core::config::ClaudeConfig;
use backbone_core::pipeline::{Analysis, AnalysisRequest, Analyzer, AnalyzerError};
use claude_agent::{Effort, QueryOptions};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

pub const PROVIDER_CLAUDE: &str = "claude_code";

pub struct ClaudeAnalyzer {
    opts: QueryOptions,
}

impl ClaudeAnalyzer {
    pub fn from_config(cfg: &ClaudeConfig, cwd: &Path) -> anyhow::Result<Self> {
        let effort: Effort = cfg.effort.parse().map_err(anyhow::Error::msg)?;
        Ok(Self {
            opts: QueryOptions {
                command: cfg.argv()?,
                model: Some(cfg.model.clone()),
                effort: Some(effort),
                timeout: (cfg.timeout_sec > 0).then(|| Duration::from_secs(cfg.timeout_sec)),
                cwd: Some(cwd.to_path_buf()),
                ..QueryOptions::default()
            },
        })
    }
}

impl Analyzer for ClaudeAnalyzer {
    fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, AnalyzerError> {
        let opts = QueryOptions {
            json_schema: Some(request.json_schema.clone()),
            ..self.opts.clone()
        };
        let response = claude_agent::query(&request.prompt, &opts)?;
        tracing::debug!(model = ?response.model, cost_usd = ?response.total_cost_usd, "claude analysis returned");
        Ok(Analysis {
            payload: Value::Object(response.payload),
            provider: PROVIDER_CLAUDE.to_string(),
            model: response.model,
        })
    }
}
