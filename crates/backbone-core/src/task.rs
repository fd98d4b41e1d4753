//! The task registry: a Markdown checklist where every task is one line.
//!
//! ```text
//! - [ ] T001 | status=backlog | title=Demo | required_tests=unit,integration | evidence=reports/T001.md | dod=Done
//! ```
//!
//! Lines that are not task lines (headings, prose) are kept verbatim, and task
//! lines that were never modified are written back exactly as they were read.

use crate::error::{BackboneError, Result};
use crate::types::TaskStatus;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

static TASK_RE: OnceLock<Regex> = OnceLock::new();

fn task_re() -> &'static Regex {
    TASK_RE.get_or_init(|| Regex::new(r"^- \[(?P<check>[ xX])\] (?P<body>.+)$").unwrap())
}

const MIN_SEGMENTS: usize = 6;

// ---------------------------------------------------------------------------
// TaskRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub checked: bool,
    pub status: TaskStatus,
    pub title: String,
    pub required_tests: Vec<String>,
    pub evidence: Vec<String>,
    pub dod: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocker: Option<String>,
    /// `key=value` segments this tool does not interpret, kept in order so a
    /// rewrite of the line does not drop them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<(String, String)>,
    pub line_no: usize,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            checked: false,
            status: TaskStatus::Backlog,
            title: title.into(),
            required_tests: Vec::new(),
            evidence: Vec::new(),
            dod: String::new(),
            blocker: None,
            extra: Vec::new(),
            line_no: 0,
        }
    }

    /// Reject values that would not survive being written to a registry
    /// line and parsed back.
    pub fn check_fields(&self) -> Result<()> {
        let invalid = |field: &str, reason: String| BackboneError::InvalidField {
            task_id: self.id.clone(),
            field: field.to_string(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id", "must not be empty".to_string()));
        }
        if self.id != self.id.trim() {
            return Err(invalid("id", "must not start or end with whitespace".to_string()));
        }

        let mut text = vec![
            ("id", self.id.as_str()),
            ("title", self.title.as_str()),
            ("dod", self.dod.as_str()),
        ];
        if let Some(blocker) = &self.blocker {
            text.push(("blocker", blocker.as_str()));
        }
        for (field, value) in text {
            if let Some(c) = value.chars().find(|c| matches!(c, '|' | '\n' | '\r')) {
                return Err(invalid(field, format!("must not contain {c:?}")));
            }
        }

        for (field, items) in [
            ("required_tests", &self.required_tests),
            ("evidence", &self.evidence),
        ] {
            for item in items {
                if item.trim().is_empty() {
                    return Err(invalid(field, "list items must not be empty".to_string()));
                }
                if let Some(c) = item.chars().find(|c| matches!(c, '|' | ',' | '\n' | '\r')) {
                    return Err(invalid(field, format!("item '{item}' must not contain {c:?}")));
                }
            }
        }
        Ok(())
    }

    /// Parse one registry line. Returns `Ok(None)` for lines that are not tasks.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Option<Self>> {
        let Some(caps) = task_re().captures(line.trim()) else {
            return Ok(None);
        };
        let malformed = |reason: String| BackboneError::MalformedTask {
            line: line_no,
            reason,
        };

        let parts: Vec<&str> = caps["body"].split(" | ").map(str::trim).collect();
        if parts.len() < MIN_SEGMENTS {
            return Err(malformed(format!(
                "expected at least {MIN_SEGMENTS} ' | ' segments, got {}",
                parts.len()
            )));
        }

        let id = parts[0].to_string();
        if id.is_empty() {
            return Err(malformed("empty task id".to_string()));
        }

        let mut status = None;
        let mut title = String::new();
        let mut required_tests = Vec::new();
        let mut evidence = Vec::new();
        let mut dod = String::new();
        let mut blocker = None;
        let mut extra = Vec::new();
        for segment in &parts[1..] {
            let Some((key, value)) = segment.split_once('=') else {
                return Err(malformed(format!("segment '{segment}' is not key=value")));
            };
            let value = value.trim();
            match key.trim() {
                "status" => status = Some(value.parse::<TaskStatus>().map_err(malformed)?),
                "title" => title = value.to_string(),
                "required_tests" => required_tests = split_list(value),
                "evidence" => evidence = split_list(value),
                "dod" => dod = value.to_string(),
                "blocker" if !value.is_empty() => blocker = Some(value.to_string()),
                "blocker" => {}
                other => extra.push((other.to_string(), value.to_string())),
            }
        }
        let status = status.ok_or_else(|| malformed("missing status".to_string()))?;

        Ok(Some(Self {
            id,
            checked: caps["check"].eq_ignore_ascii_case("x"),
            status,
            title,
            required_tests,
            evidence,
            dod,
            blocker,
            extra,
            line_no,
        }))
    }

    /// Serialize back to the canonical registry line. `blocker` is only
    /// written while the task carries one.
    pub fn to_line(&self) -> String {
        let mark = if self.checked { "x" } else { " " };
        let mut line = format!(
            "- [{mark}] {} | status={} | title={} | required_tests={} | evidence={} | dod={}",
            self.id,
            self.status,
            self.title,
            self.required_tests.join(","),
            self.evidence.join(","),
            self.dod
        );
        if let Some(blocker) = &self.blocker {
            line.push_str(" | blocker=");
            line.push_str(blocker);
        }
        for (key, value) in &self.extra {
            line.push_str(&format!(" | {key}={value}"));
        }
        line
    }
}

/// Split a comma list, dropping blanks.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// TaskRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum RegistryLine {
    Task { record: TaskRecord, raw: String },
    Other(String),
}

/// The parsed registry document. Owns every TaskRecord.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskRegistry {
    lines: Vec<RegistryLine>,
}

impl TaskRegistry {
    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = Vec::new();
        let mut seen = HashSet::new();
        for (i, line) in content.lines().enumerate() {
            let line_no = i + 1;
            match TaskRecord::parse_line(line, line_no)? {
                Some(record) => {
                    if !seen.insert(record.id.clone()) {
                        return Err(BackboneError::MalformedTask {
                            line: line_no,
                            reason: format!("duplicate task id '{}'", record.id),
                        });
                    }
                    lines.push(RegistryLine::Task {
                        record,
                        raw: line.to_string(),
                    });
                }
                None => lines.push(RegistryLine::Other(line.to_string())),
            }
        }
        Ok(Self { lines })
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                RegistryLine::Task { raw, .. } | RegistryLine::Other(raw) => out.push_str(raw),
            }
            out.push('\n');
        }
        out
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskRecord> {
        self.lines.iter().filter_map(|l| match l {
            RegistryLine::Task { record, .. } => Some(record),
            RegistryLine::Other(_) => None,
        })
    }

    pub fn get(&self, id: &str) -> Result<&TaskRecord> {
        self.tasks()
            .find(|t| t.id == id)
            .ok_or_else(|| BackboneError::TaskNotFound(id.to_string()))
    }

    /// Append a new task line at the end of the document.
    pub fn push(&mut self, mut record: TaskRecord) -> Result<()> {
        record.check_fields()?;
        if self.tasks().any(|t| t.id == record.id) {
            return Err(BackboneError::MalformedTask {
                line: self.lines.len() + 1,
                reason: format!("duplicate task id '{}'", record.id),
            });
        }
        record.line_no = self.lines.len() + 1;
        let raw = record.to_line();
        self.lines.push(RegistryLine::Task { record, raw });
        Ok(())
    }

    /// Apply `f` to the task and re-render its line. If the edited record
    /// fails `check_fields` the registry is left unchanged.
    pub fn update<F>(&mut self, id: &str, f: F) -> Result<&TaskRecord>
    where
        F: FnOnce(&mut TaskRecord),
    {
        for line in &mut self.lines {
            if let RegistryLine::Task { record, raw } = line {
                if record.id == id {
                    let mut edited = record.clone();
                    f(&mut edited);
                    edited.check_fields()?;
                    *raw = edited.to_line();
                    *record = edited;
                    return Ok(record);
                }
            }
        }
        Err(BackboneError::TaskNotFound(id.to_string()))
    }
}

/// Human-readable summary: "1/4 done, 2 in progress, 1 blocked, 0 backlog"
pub fn summarize<'a>(tasks: impl IntoIterator<Item = &'a TaskRecord>) -> String {
    let mut counts = [0usize; 4];
    let mut total = 0;
    for t in tasks {
        total += 1;
        let slot = match t.status {
            TaskStatus::Done => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Blocked => 2,
            TaskStatus::Backlog => 3,
        };
        counts[slot] += 1;
    }
    format!(
        "{}/{total} done, {} in progress, {} blocked, {} backlog",
        counts[0], counts[1], counts[2], counts[3]
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
