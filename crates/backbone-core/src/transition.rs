//! The task state machine and its verification gate.
//!
//! ```text
//!   backlog ──start──▶ in_progress ──done──▶ done
//!      │                 ▲     │
//!      └──block──▶ blocked ◀─block
//!                    │ ▲
//!                    └─┘ start
//! ```
//!
//! `verify` never moves a task. It records a [`VerificationResult`] that
//! `done` requires: the latest result for the task must have passed and its
//! snapshot of `required_tests`/`evidence` must match the live record.

use crate::error::{BackboneError, Result};
use crate::events::{self, TransitionEvent};
use crate::gate::{self, SuiteRunner, VerificationResult};
use crate::store::{Ledger, TaskStore};
use crate::task::{TaskRecord, TaskRegistry};
use crate::types::TaskStatus;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Field edits for `TaskEngine::edit`. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub required_tests: Option<Vec<String>>,
    pub evidence: Option<Vec<String>>,
    pub dod: Option<String>,
}

pub struct TaskEngine<S> {
    store: S,
    runner: Box<dyn SuiteRunner>,
    evidence_root: PathBuf,
}

impl<S: TaskStore + Ledger> TaskEngine<S> {
    pub fn new(store: S, runner: Box<dyn SuiteRunner>, evidence_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            runner,
            evidence_root: evidence_root.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn list(&self) -> Result<Vec<TaskRecord>> {
        Ok(self.store.load()?.tasks().cloned().collect())
    }

    pub fn get(&self, id: &str) -> Result<TaskRecord> {
        self.store.load()?.get(id).cloned()
    }

    // ---------------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------------

    pub fn start(&mut self, id: &str) -> Result<TaskRecord> {
        self.transition(id, TaskStatus::InProgress, |t| {
            t.checked = false;
            t.blocker = None;
        })
    }

    pub fn block(&mut self, id: &str, reason: &str) -> Result<TaskRecord> {
        let reason = reason.trim().to_string();
        self.transition(id, TaskStatus::Blocked, move |t| {
            t.checked = false;
            t.blocker = (!reason.is_empty()).then_some(reason);
        })
    }

    /// Run the gate and record its result, pass or fail. A failed gate is
    /// still recorded so that it supersedes any earlier passing result.
    pub fn verify(&mut self, id: &str) -> Result<VerificationResult> {
        let task = self.get(id)?;
        if task.status != TaskStatus::InProgress {
            return Err(BackboneError::InvalidTransition {
                task_id: id.to_string(),
                from: task.status.to_string(),
                to: "verify".to_string(),
            });
        }

        let result = gate::evaluate(&task, self.runner.as_ref(), &self.evidence_root);
        self.store.append_verification(&result)?;

        if !result.passed {
            let failed_suites = result.failed_suites();
            tracing::warn!(
                task = %id,
                failed = ?failed_suites,
                missing = ?result.missing_evidence,
                "verification gate failed"
            );
            return Err(BackboneError::GateFailure {
                task_id: id.to_string(),
                failed_suites,
                missing_evidence: result.missing_evidence,
            });
        }

        tracing::info!(task = %id, suites = result.suites_run.len(), "verification passed");
        Ok(result)
    }

    pub fn done(&mut self, id: &str) -> Result<TaskRecord> {
        let task = self.get(id)?;
        if task.status != TaskStatus::InProgress {
            return Err(BackboneError::InvalidTransition {
                task_id: id.to_string(),
                from: task.status.to_string(),
                to: TaskStatus::Done.to_string(),
            });
        }

        let required = |reason: &str| BackboneError::VerificationRequired {
            task_id: id.to_string(),
            reason: reason.to_string(),
        };
        match self.store.latest_verification(id)? {
            None => return Err(required("no verification recorded")),
            Some(v) if !v.passed => return Err(required("most recent verify failed")),
            Some(v) if !v.matches(&task) => {
                return Err(required(
                    "required_tests or evidence changed since the last verify",
                ))
            }
            Some(_) => {}
        }

        self.transition(id, TaskStatus::Done, |t| t.checked = true)
    }

    /// Append a new task to the registry. Creation is not a transition and
    /// logs no event.
    pub fn add(&mut self, record: TaskRecord) -> Result<TaskRecord> {
        let mut registry = self.store.load()?;
        let id = record.id.clone();
        registry.push(record)?;
        self.store.save(&registry)?;
        tracing::info!(task = %id, "task added");
        registry.get(&id).cloned()
    }

    /// Edit task fields. Not a status transition: nothing is logged, but
    /// changing `required_tests` or `evidence` makes any earlier verify stale.
    pub fn edit(&mut self, id: &str, edit: TaskEdit) -> Result<TaskRecord> {
        let mut registry = self.store.load()?;
        let updated = registry
            .update(id, |t| {
                if let Some(title) = edit.title {
                    t.title = title;
                }
                if let Some(tests) = edit.required_tests {
                    t.required_tests = tests;
                }
                if let Some(evidence) = edit.evidence {
                    t.evidence = evidence;
                }
                if let Some(dod) = edit.dod {
                    t.dod = dod;
                }
            })?
            .clone();
        self.store.save(&registry)?;
        Ok(updated)
    }

    /// Replay the event log and return the status each logged task reached.
    pub fn replay(&self) -> Result<BTreeMap<String, TaskStatus>> {
        events::replay(&self.store.events()?)
    }

    fn transition<F>(&mut self, id: &str, to: TaskStatus, apply: F) -> Result<TaskRecord>
    where
        F: FnOnce(&mut TaskRecord),
    {
        let mut registry: TaskRegistry = self.store.load()?;
        let from = registry.get(id)?.status;
        if !from.can_move_to(to) {
            return Err(BackboneError::InvalidTransition {
                task_id: id.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let updated = registry
            .update(id, |t| {
                t.status = to;
                apply(t);
            })?
            .clone();
        self.store.save(&registry)?;
        self.store
            .append_event(&TransitionEvent::new(id, from, to))?;

        tracing::info!(task = %id, %from, %to, "task transitioned");
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
