//! The verification gate: required suites + evidence files, all or nothing.

use crate::shell::{self, run_shell};
use crate::task::TaskRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Per-suite output kept in the ledger.
const OUTPUT_TAIL: usize = 2000;

// ---------------------------------------------------------------------------
// SuiteRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteOutcome {
    pub suite: String,
    pub passed: bool,
    pub output: String,
    pub duration_ms: u64,
}

/// Runs one named test suite and reports pass/fail.
pub trait SuiteRunner {
    fn run_suite(&self, suite: &str) -> SuiteOutcome;
}

/// Runs suites through `sh -c`, substituting `{suite}` in a command template.
#[derive(Debug, Clone)]
pub struct ShellSuiteRunner {
    pub command_template: String,
    pub cwd: PathBuf,
    /// `None` means no timeout.
    pub timeout: Option<Duration>,
}

impl ShellSuiteRunner {
    pub fn new(command_template: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command_template: command_template.into(),
            cwd: cwd.into(),
            timeout: None,
        }
    }

    pub fn with_timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    pub fn command_for(&self, suite: &str) -> String {
        self.command_template.replace("{suite}", suite)
    }
}

impl SuiteRunner for ShellSuiteRunner {
    fn run_suite(&self, suite: &str) -> SuiteOutcome {
        let command = self.command_for(suite);
        let start = Instant::now();
        let out = run_shell(&command, &self.cwd, self.timeout);
        SuiteOutcome {
            suite: suite.to_string(),
            passed: out.success,
            output: shell::tail(&out.output, OUTPUT_TAIL).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

// ---------------------------------------------------------------------------
// VerificationResult
// ---------------------------------------------------------------------------

/// One gate evaluation. Immutable once appended to the ledger.
///
/// `required_tests` and `evidence` snapshot the task at verify time; `done`
/// compares them against the live record to detect a stale verify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub task_id: String,
    pub passed: bool,
    pub suites_run: Vec<SuiteOutcome>,
    pub missing_evidence: Vec<String>,
    pub required_tests: Vec<String>,
    pub evidence: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl VerificationResult {
    pub fn failed_suites(&self) -> Vec<String> {
        self.suites_run
            .iter()
            .filter(|s| !s.passed)
            .map(|s| s.suite.clone())
            .collect()
    }

    /// True when the snapshot still matches the task's gate inputs.
    pub fn matches(&self, task: &TaskRecord) -> bool {
        self.task_id == task.id
            && self.required_tests == task.required_tests
            && self.evidence == task.evidence
    }
}

/// Evaluate the gate for `task`. Every suite runs even after a failure so the
/// result names all failing suites. Evidence paths are resolved against `root`.
pub fn evaluate(task: &TaskRecord, runner: &dyn SuiteRunner, root: &Path) -> VerificationResult {
    let missing_evidence: Vec<String> = task
        .evidence
        .iter()
        .filter(|p| !root.join(p).exists())
        .cloned()
        .collect();

    let mut suites_run = Vec::with_capacity(task.required_tests.len());
    for suite in &task.required_tests {
        let outcome = runner.run_suite(suite);
        tracing::debug!(
            task = %task.id,
            suite = %suite,
            passed = outcome.passed,
            duration_ms = outcome.duration_ms,
            "suite finished"
        );
        suites_run.push(outcome);
    }

    let passed = missing_evidence.is_empty() && suites_run.iter().all(|s| s.passed);
    VerificationResult {
        task_id: task.id.clone(),
        passed,
        suites_run,
        missing_evidence,
        required_tests: task.required_tests.clone(),
        evidence: task.evidence.clone(),
        timestamp: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
