//! Storage seams for the task registry, the verification/event ledger and
//! run artifacts. `FsStore` binds them to a project root; `MemoryStore` keeps
//! everything in memory for tests.

use crate::artifact::RunArtifact;
use crate::error::{BackboneError, Result};
use crate::events::TransitionEvent;
use crate::gate::VerificationResult;
use crate::io;
use crate::paths;
use crate::task::TaskRegistry;
use std::collections::BTreeMap;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

pub trait TaskStore {
    fn load(&self) -> Result<TaskRegistry>;
    fn save(&mut self, registry: &TaskRegistry) -> Result<()>;
}

/// Append-only records consumed by the transition engine.
pub trait Ledger {
    fn append_verification(&mut self, result: &VerificationResult) -> Result<()>;
    fn latest_verification(&self, task_id: &str) -> Result<Option<VerificationResult>>;
    fn append_event(&mut self, event: &TransitionEvent) -> Result<()>;
    fn events(&self) -> Result<Vec<TransitionEvent>>;
}

/// Write-once artifact persistence. `write` returns where the artifact landed.
pub trait ArtifactStore {
    fn write(&mut self, artifact: &RunArtifact) -> Result<String>;
    fn read(&self, artifact_id: &str) -> Result<RunArtifact>;
}

// ---------------------------------------------------------------------------
// FsStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Raw event log lines, for byte-level replay checks.
    pub fn event_lines(&self) -> Result<Vec<String>> {
        io::read_lines(&paths::events_path(&self.root))
    }
}

impl TaskStore for FsStore {
    fn load(&self) -> Result<TaskRegistry> {
        let path = paths::tasks_path(&self.root);
        if !path.exists() {
            return Ok(TaskRegistry::default());
        }
        let data = std::fs::read_to_string(&path)?;
        TaskRegistry::parse(&data)
    }

    fn save(&mut self, registry: &TaskRegistry) -> Result<()> {
        let path = paths::tasks_path(&self.root);
        io::atomic_write(&path, registry.to_markdown().as_bytes())
    }
}

impl Ledger for FsStore {
    fn append_verification(&mut self, result: &VerificationResult) -> Result<()> {
        let line = serde_json::to_string(result)?;
        io::append_line(&paths::verifications_path(&self.root), &line)
    }

    fn latest_verification(&self, task_id: &str) -> Result<Option<VerificationResult>> {
        let lines = io::read_lines(&paths::verifications_path(&self.root))?;
        for line in lines.iter().rev() {
            let result: VerificationResult = serde_json::from_str(line)?;
            if result.task_id == task_id {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    fn append_event(&mut self, event: &TransitionEvent) -> Result<()> {
        io::append_line(&paths::events_path(&self.root), &event.to_line()?)
    }

    fn events(&self) -> Result<Vec<TransitionEvent>> {
        self.event_lines()?
            .iter()
            .map(|l| TransitionEvent::from_line(l))
            .collect()
    }
}

impl ArtifactStore for FsStore {
    fn write(&mut self, artifact: &RunArtifact) -> Result<String> {
        let path = paths::artifact_path(&self.root, &artifact.id);
        io::write_new(&path, artifact.to_json()?.as_bytes())?;

        let event = serde_json::json!({
            "ts": chrono::Utc::now(),
            "event": "analysis_run_completed",
            "artifact_id": artifact.id,
            "profile": artifact.profile,
            "status": artifact.status,
            "source": artifact.source,
            "analysis_provider": artifact.analysis_provider,
            "analysis_model": artifact.analysis_model,
            "quality": artifact.quality,
        });
        io::append_line(&paths::run_events_path(&self.root), &event.to_string())?;

        tracing::info!(artifact = %artifact.id, path = %path.display(), "artifact written");
        Ok(path.display().to_string())
    }

    fn read(&self, artifact_id: &str) -> Result<RunArtifact> {
        let path = paths::artifact_path(&self.root, artifact_id);
        if !path.is_file() {
            return Err(BackboneError::ArtifactInvalid(format!(
                "artifact '{artifact_id}' not found"
            )));
        }
        RunArtifact::from_json(&std::fs::read_to_string(&path)?)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub registry: TaskRegistry,
    pub verifications: Vec<VerificationResult>,
    pub events: Vec<TransitionEvent>,
    pub artifacts: BTreeMap<String, RunArtifact>,
}

impl MemoryStore {
    pub fn with_registry(registry: TaskRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }
}

impl TaskStore for MemoryStore {
    fn load(&self) -> Result<TaskRegistry> {
        Ok(self.registry.clone())
    }

    fn save(&mut self, registry: &TaskRegistry) -> Result<()> {
        self.registry = registry.clone();
        Ok(())
    }
}

impl Ledger for MemoryStore {
    fn append_verification(&mut self, result: &VerificationResult) -> Result<()> {
        self.verifications.push(result.clone());
        Ok(())
    }

    fn latest_verification(&self, task_id: &str) -> Result<Option<VerificationResult>> {
        Ok(self
            .verifications
            .iter()
            .rev()
            .find(|v| v.task_id == task_id)
            .cloned())
    }

    fn append_event(&mut self, event: &TransitionEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }

    fn events(&self) -> Result<Vec<TransitionEvent>> {
        Ok(self.events.clone())
    }
}

impl ArtifactStore for MemoryStore {
    fn write(&mut self, artifact: &RunArtifact) -> Result<String> {
        if self.artifacts.contains_key(&artifact.id) {
            return Err(BackboneError::ArtifactExists(artifact.id.clone()));
        }
        self.artifacts.insert(artifact.id.clone(), artifact.clone());
        Ok(format!("memory://{}", artifact.id))
    }

    fn read(&self, artifact_id: &str) -> Result<RunArtifact> {
        self.artifacts
            .get(artifact_id)
            .cloned()
            .ok_or_else(|| BackboneError::ArtifactInvalid(format!("artifact '{artifact_id}' not found")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
