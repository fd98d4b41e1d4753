use crate::error::{BackboneError, Result};
use crate::paths;
use crate::pipeline::{ChunkStrategy, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ClaudeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaudeConfig {
    #[serde(default = "default_claude_command")]
    pub command: String,
    #[serde(default = "default_claude_model")]
    pub model: String,
    #[serde(default = "default_claude_effort")]
    pub effort: String,
    #[serde(default = "default_claude_timeout")]
    pub timeout_sec: u64,
    #[serde(default = "default_claude_retries")]
    pub retries: u32,
}

fn default_claude_command() -> String {
    "claude".to_string()
}

fn default_claude_model() -> String {
    "opus".to_string()
}

fn default_claude_effort() -> String {
    "medium".to_string()
}

fn default_claude_timeout() -> u64 {
    180
}

fn default_claude_retries() -> u32 {
    2
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            command: default_claude_command(),
            model: default_claude_model(),
            effort: default_claude_effort(),
            timeout_sec: default_claude_timeout(),
            retries: default_claude_retries(),
        }
    }
}

impl ClaudeConfig {
    /// The command split into program and leading arguments.
    pub fn argv(&self) -> Result<Vec<String>> {
        let argv: Vec<String> = self.command.split_whitespace().map(str::to_string).collect();
        if argv.is_empty() {
            return Err(BackboneError::InvalidConfig(
                "claude.command is empty".to_string(),
            ));
        }
        Ok(argv)
    }
}

// ---------------------------------------------------------------------------
// SuitesConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuitesConfig {
    /// Shell command template; `{suite}` is replaced with the suite name.
    #[serde(default = "default_suite_command")]
    pub command: String,
    /// Per-suite timeout. 0 disables it.
    #[serde(default = "default_suite_timeout")]
    pub timeout_sec: u64,
}

fn default_suite_command() -> String {
    "pytest -m {suite}".to_string()
}

fn default_suite_timeout() -> u64 {
    600
}

impl Default for SuitesConfig {
    fn default() -> Self {
        Self {
            command: default_suite_command(),
            timeout_sec: default_suite_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChunkingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkMode {
    Window,
    Lines,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_mode")]
    pub mode: ChunkMode,
    #[serde(default = "default_chunk_size")]
    pub size: usize,
}

fn default_chunk_mode() -> ChunkMode {
    ChunkMode::Window
}

fn default_chunk_size() -> usize {
    1000
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            mode: default_chunk_mode(),
            size: default_chunk_size(),
        }
    }
}

impl ChunkingConfig {
    pub fn strategy(&self) -> ChunkStrategy {
        match self.mode {
            ChunkMode::Window => ChunkStrategy::Window(self.size),
            ChunkMode::Lines => ChunkStrategy::Lines,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub claude: ClaudeConfig,
    #[serde(default)]
    pub suites: SuitesConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

impl Config {
    /// Load `.backbone/config.yaml` if present, then apply `BACKBONE_*`
    /// overrides from the process environment.
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_with_env(root, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(root: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = paths::config_path(root);
        let mut cfg = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            if data.trim().is_empty() {
                Config::default()
            } else {
                serde_yaml::from_str(&data)
                    .map_err(|e| BackboneError::InvalidConfig(format!("{}: {e}", path.display())))?
            }
        } else {
            Config::default()
        };
        cfg.apply_env(lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BACKBONE_CLAUDE_CMD") {
            self.claude.command = v;
        }
        if let Some(v) = lookup("BACKBONE_CLAUDE_MODEL") {
            self.claude.model = v;
        }
        if let Some(v) = lookup("BACKBONE_CLAUDE_EFFORT") {
            self.claude.effort = v;
        }
        if let Some(v) = lookup("BACKBONE_CLAUDE_TIMEOUT_SEC") {
            self.claude.timeout_sec = parse_number("BACKBONE_CLAUDE_TIMEOUT_SEC", &v)?;
        }
        if let Some(v) = lookup("BACKBONE_CLAUDE_RETRIES") {
            self.claude.retries = parse_number("BACKBONE_CLAUDE_RETRIES", &v)?;
        }
        if let Some(v) = lookup("BACKBONE_SUITE_CMD") {
            self.suites.command = v;
        }
        if let Some(v) = lookup("BACKBONE_SUITE_TIMEOUT_SEC") {
            self.suites.timeout_sec = parse_number("BACKBONE_SUITE_TIMEOUT_SEC", &v)?;
        }
        if let Some(v) = lookup("BACKBONE_CHUNK_SIZE") {
            self.chunking.size = parse_number("BACKBONE_CHUNK_SIZE", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.claude.argv()?;
        if self.suites.command.trim().is_empty() {
            return Err(BackboneError::InvalidConfig(
                "suites.command is empty".to_string(),
            ));
        }
        if self.chunking.size == 0 {
            return Err(BackboneError::InvalidConfig(
                "chunking.size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            chunk: self.chunking.strategy(),
            retries: self.claude.retries,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BackboneError::InvalidConfig(format!("{key} must be a non-negative integer, got '{value}'")))
}
