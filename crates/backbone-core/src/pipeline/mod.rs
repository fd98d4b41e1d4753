//! The analysis pipeline: `ingest → chunk → dedupe → analyze → validate`.
//!
//! Input errors (unknown profile, missing source, empty transcript) are
//! returned as errors and produce no artifact. Once ingest succeeds the run
//! always ends in a written artifact; analyze exhaustion and schema rejection
//! are recorded as `status: failure` rather than returned as errors.

pub mod deterministic;
pub mod stages;

pub use stages::ChunkStrategy;

use crate::artifact::{Quality, RunArtifact, RunError, StageTimings};
use crate::error::{BackboneError, Result};
use crate::schema;
use crate::store::ArtifactStore;
use crate::types::{Profile, RunStatus};
use serde_json::Value;
use std::path::Path;
use std::time::Instant;

pub const PROVIDER_DETERMINISTIC: &str = "deterministic";

pub type AnalyzerError = Box<dyn std::error::Error + Send + Sync>;

/// One call to the external analysis collaborator.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub profile: Profile,
    pub prompt: String,
    pub json_schema: Value,
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub payload: Value,
    pub provider: String,
    pub model: Option<String>,
}

/// External analysis collaborator. Retry policy lives in the pipeline.
pub trait Analyzer {
    fn analyze(&self, request: &AnalysisRequest) -> std::result::Result<Analysis, AnalyzerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub chunk: ChunkStrategy,
    pub retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk: ChunkStrategy::default(),
            retries: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub artifact: RunArtifact,
    pub path: String,
}

pub fn lesson_prompt(transcript: &str) -> String {
    format!(
        "You are analyzing a lesson transcript. Return ONLY a JSON object that matches the provided schema.\n\
         Rules:\n\
         1) No markdown, only a valid JSON object.\n\
         2) Fill every required field.\n\
         3) Do not add fields.\n\
         4) If data is scarce use null or short lists, but keep the types.\n\
         5) theory_practice_balance percents are 0..100 and sum to exactly 100.\n\
         6) Answer in the language of the transcript.\n\
         7) practical_activities and homework must be concrete and tied to the transcript.\n\
         \n\
         LESSON TRANSCRIPT:\n\
         {transcript}"
    )
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

pub struct Pipeline<'a> {
    config: PipelineConfig,
    analyzer: &'a dyn Analyzer,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: PipelineConfig, analyzer: &'a dyn Analyzer) -> Self {
        Self { config, analyzer }
    }

    pub fn run(
        &self,
        profile: &str,
        source: &Path,
        store: &mut dyn ArtifactStore,
    ) -> Result<RunOutcome> {
        let profile: Profile = profile.parse()?;
        if !source.is_file() {
            return Err(BackboneError::SourceInvalid(source.display().to_string()));
        }

        let mut timings = StageTimings::new();

        // ingest
        let started = Instant::now();
        let raw = std::fs::read_to_string(source)?;
        let text = stages::normalize(&raw);
        timings.record("ingest", elapsed_ms(started));
        if text.is_empty() {
            return Err(BackboneError::StageFailure {
                stage: "ingest".to_string(),
                message: format!("source '{}' is empty", source.display()),
            });
        }

        // chunk
        let started = Instant::now();
        let chunks = stages::chunk(&text, self.config.chunk);
        timings.record("chunk", elapsed_ms(started));

        // dedupe
        let started = Instant::now();
        let chunk_count = chunks.len();
        let (kept, removed) = stages::dedupe(chunks);
        let deduped = kept.join(self.config.chunk.separator());
        timings.record("dedupe", elapsed_ms(started));

        let quality = Quality {
            source_length: text.chars().count() as u64,
            chunk_count: chunk_count as u64,
            dedupe_count: removed as u64,
            word_count: text.split_whitespace().count() as u64,
        };

        let mut artifact = RunArtifact {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: uuid::Uuid::new_v4().to_string(),
            profile,
            status: RunStatus::Failure,
            created_at: chrono::Utc::now(),
            source: source.display().to_string(),
            analysis_provider: None,
            analysis_model: None,
            quality,
            timings_ms: StageTimings::new(),
            result: None,
            error: None,
        };

        // analyze
        let started = Instant::now();
        let analysis = self.analyze(profile, &deduped, &quality);
        timings.record("analyze", elapsed_ms(started));

        match analysis {
            Err(message) => {
                artifact.error = Some(RunError {
                    stage: "analyze".to_string(),
                    message,
                    violations: Vec::new(),
                });
            }
            Ok(analysis) => {
                artifact.analysis_provider = Some(analysis.provider);
                artifact.analysis_model = analysis.model;

                // validate
                let started = Instant::now();
                let validated = schema::validate(profile, analysis.payload);
                timings.record("validate", elapsed_ms(started));

                match validated {
                    Ok(payload) => {
                        artifact.status = RunStatus::Success;
                        artifact.result = Some(payload);
                    }
                    Err(err) => {
                        let message = err.to_string();
                        let violations = match err {
                            BackboneError::SchemaViolation { violations, .. } => violations,
                            _ => Vec::new(),
                        };
                        artifact.error = Some(RunError {
                            stage: "validate".to_string(),
                            message,
                            violations,
                        });
                    }
                }
            }
        }

        for stage in timings.stages() {
            tracing::debug!(stage, ms = timings.get(stage).unwrap_or_default(), "stage timing");
        }
        artifact.timings_ms = timings;

        if let Some(err) = &artifact.error {
            tracing::warn!(
                artifact = %artifact.id,
                stage = %err.stage,
                error = %err.message,
                "pipeline run failed"
            );
        }

        let path = store.write(&artifact)?;
        Ok(RunOutcome { artifact, path })
    }

    /// Produce the raw payload for `profile`. The error string describes the
    /// last failed attempt.
    fn analyze(
        &self,
        profile: Profile,
        text: &str,
        quality: &Quality,
    ) -> std::result::Result<Analysis, String> {
        let payload = match profile {
            Profile::LessonAnalysis => return self.analyze_external(profile, text),
            Profile::DigestTopics => deterministic::digest_topics(text, quality),
            Profile::MentorSession => deterministic::mentor_session(text, quality),
        };
        Ok(Analysis {
            payload,
            provider: PROVIDER_DETERMINISTIC.to_string(),
            model: None,
        })
    }

    fn analyze_external(
        &self,
        profile: Profile,
        text: &str,
    ) -> std::result::Result<Analysis, String> {
        let request = AnalysisRequest {
            profile,
            prompt: lesson_prompt(text),
            json_schema: schema::json_schema(profile),
        };
        let attempts = self.config.retries + 1;
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=attempts {
            match self.analyzer.analyze(&request) {
                Ok(analysis) if analysis.payload.is_object() => return Ok(analysis),
                Ok(_) => last_error = "analysis payload is not a JSON object".to_string(),
                Err(e) => last_error = e.to_string(),
            }
            tracing::warn!(attempt, attempts, error = %last_error, "analysis attempt failed");
        }

        Err(format!(
            "analysis failed after {attempts} attempt(s): {last_error}"
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::lesson;
    use crate::store::{FsStore, MemoryStore};
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Replays scripted responses; repeats the last one when the script runs out.
    struct FakeAnalyzer {
        script: RefCell<VecDeque<std::result::Result<Value, String>>>,
        last: std::result::Result<Value, String>,
        calls: Cell<u32>,
        prompts: RefCell<Vec<String>>,
    }

    impl FakeAnalyzer {
        fn new(script: Vec<std::result::Result<Value, String>>) -> Self {
            let last = script
                .last()
                .cloned()
                .unwrap_or_else(|| Err("no script".to_string()));
            Self {
                script: RefCell::new(script.into()),
                last,
                calls: Cell::new(0),
                prompts: RefCell::new(Vec::new()),
            }
        }

        fn always(response: std::result::Result<Value, String>) -> Self {
            Self::new(vec![response])
        }
    }

    impl Analyzer for FakeAnalyzer {
        fn analyze(&self, request: &AnalysisRequest) -> std::result::Result<Analysis, AnalyzerError> {
            assert!(request.prompt.contains("LESSON TRANSCRIPT"));
            self.calls.set(self.calls.get() + 1);
            self.prompts.borrow_mut().push(request.prompt.clone());
            let next = self
                .script
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| self.last.clone());
            next.map(|payload| Analysis {
                payload,
                provider: "fake".to_string(),
                model: Some("fake-model".to_string()),
            })
            .map_err(AnalyzerError::from)
        }
    }

    fn source(dir: &TempDir, text: &str) -> PathBuf {
        let path = dir.path().join("source.txt");
        std::fs::write(&path, text).unwrap();
        path
    }

    fn lines_config(retries: u32) -> PipelineConfig {
        PipelineConfig {
            chunk: ChunkStrategy::Lines,
            retries,
        }
    }

    #[test]
    fn line_chunking_counts_duplicates() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "line1\nline1\nline2");
        let analyzer = FakeAnalyzer::always(Err("unused".into()));
        let mut store = MemoryStore::default();
        let outcome = Pipeline::new(lines_config(0), &analyzer)
            .run("digest_topics", &src, &mut store)
            .unwrap();
        let q = outcome.artifact.quality;
        assert_eq!(q.chunk_count, 3);
        assert_eq!(q.dedupe_count, 1);
        assert_eq!(q.word_count, 3);
        assert_eq!(q.source_length, 17);
        assert_eq!(analyzer.calls.get(), 0);
    }

    #[test]
    fn analyzer_sees_deduplicated_chunks() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "Intro to stages\nRepeat me\nRepeat me\nWrap up");
        let analyzer = FakeAnalyzer::always(Ok(lesson()));
        let mut store = MemoryStore::default();
        let outcome = Pipeline::new(lines_config(0), &analyzer)
            .run("lesson_analysis", &src, &mut store)
            .unwrap();
        assert!(outcome.artifact.is_success());
        assert_eq!(outcome.artifact.quality.dedupe_count, 1);

        let prompts = analyzer.prompts.borrow();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].matches("Repeat me").count(), 1);
        assert!(prompts[0].ends_with("Intro to stages\nRepeat me\nWrap up"));
    }

    #[test]
    fn deterministic_profile_succeeds() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "We discussed the pipeline. Then we reviewed chunking.");
        let analyzer = FakeAnalyzer::always(Err("unused".into()));
        let mut store = MemoryStore::default();
        let outcome = Pipeline::new(PipelineConfig::default(), &analyzer)
            .run("digest_topics", &src, &mut store)
            .unwrap();
        let artifact = &outcome.artifact;
        assert!(artifact.is_success());
        assert_eq!(artifact.analysis_provider.as_deref(), Some(PROVIDER_DETERMINISTIC));
        assert!(artifact.analysis_model.is_none());
        assert!(artifact.error.is_none());
        assert_eq!(
            artifact.timings_ms.stages().collect::<Vec<_>>(),
            vec!["ingest", "chunk", "dedupe", "analyze", "validate"]
        );
        let result = artifact.result.as_ref().unwrap();
        assert_eq!(result["summary"], "We discussed the pipeline");
        assert_eq!(result["metrics"]["word_count"], 8);
        assert_eq!(outcome.path, format!("memory://{}", artifact.id));
    }

    #[test]
    fn identical_inputs_give_identical_quality() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "alpha beta\n\n  gamma   delta\nalpha beta");
        let analyzer = FakeAnalyzer::always(Err("unused".into()));
        let mut store = MemoryStore::default();
        let pipeline = Pipeline::new(lines_config(0), &analyzer);
        let a = pipeline.run("mentor_session", &src, &mut store).unwrap();
        let b = pipeline.run("mentor_session", &src, &mut store).unwrap();
        assert_eq!(a.artifact.quality, b.artifact.quality);
        assert_eq!(a.artifact.result, b.artifact.result);
        assert_ne!(a.artifact.id, b.artifact.id);
    }

    #[test]
    fn analyze_exhaustion_records_failure() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a lesson about testing");
        let analyzer = FakeAnalyzer::always(Err("timed out after 180s".into()));
        let mut store = MemoryStore::default();
        let outcome = Pipeline::new(lines_config(2), &analyzer)
            .run("lesson_analysis", &src, &mut store)
            .unwrap();
        let artifact = &outcome.artifact;

        assert_eq!(analyzer.calls.get(), 3);
        assert_eq!(artifact.status, RunStatus::Failure);
        assert!(artifact.result.is_none());
        let error = artifact.error.as_ref().unwrap();
        assert_eq!(error.stage, "analyze");
        assert!(error.message.contains("timed out"));
        for stage in ["ingest", "chunk", "dedupe", "analyze"] {
            assert!(artifact.timings_ms.get(stage).is_some(), "missing {stage}");
        }
        assert!(artifact.timings_ms.get("validate").is_none());
        assert!(store.artifacts.contains_key(&artifact.id));
    }

    #[test]
    fn retry_recovers_after_transient_errors() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a lesson about testing");
        let analyzer = FakeAnalyzer::new(vec![
            Err("exit status 1".into()),
            Ok(json!(["not", "an", "object"])),
            Ok(lesson()),
        ]);
        let mut store = MemoryStore::default();
        let outcome = Pipeline::new(lines_config(2), &analyzer)
            .run("lesson_analysis", &src, &mut store)
            .unwrap();
        assert_eq!(analyzer.calls.get(), 3);
        assert!(outcome.artifact.is_success());
        assert_eq!(outcome.artifact.analysis_model.as_deref(), Some("fake-model"));
        assert_eq!(outcome.artifact.result, Some(lesson()));
    }

    #[test]
    fn zero_retries_means_one_attempt() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "text");
        let analyzer = FakeAnalyzer::new(vec![Err("boom".into()), Ok(lesson())]);
        let mut store = MemoryStore::default();
        let outcome = Pipeline::new(lines_config(0), &analyzer)
            .run("lesson_analysis", &src, &mut store)
            .unwrap();
        assert_eq!(analyzer.calls.get(), 1);
        assert!(!outcome.artifact.is_success());
    }

    #[test]
    fn schema_rejection_writes_failed_artifact() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a lesson about testing");
        let mut payload = lesson();
        payload.as_object_mut().unwrap().remove("summary");
        let analyzer = FakeAnalyzer::always(Ok(payload));
        let mut store = MemoryStore::default();
        let outcome = Pipeline::new(lines_config(2), &analyzer)
            .run("lesson_analysis", &src, &mut store)
            .unwrap();
        let artifact = &outcome.artifact;

        assert_eq!(analyzer.calls.get(), 1);
        assert_eq!(artifact.status, RunStatus::Failure);
        assert!(artifact.result.is_none());
        let error = artifact.error.as_ref().unwrap();
        assert_eq!(error.stage, "validate");
        assert_eq!(error.violations[0].path, "summary");
        assert_eq!(artifact.analysis_provider.as_deref(), Some("fake"));
        assert!(store.artifacts.contains_key(&artifact.id));
    }

    #[test]
    fn unknown_profile_runs_nothing() {
        let dir = TempDir::new().unwrap();
        let analyzer = FakeAnalyzer::always(Err("unused".into()));
        let mut store = MemoryStore::default();
        let err = Pipeline::new(PipelineConfig::default(), &analyzer)
            .run("haiku", &dir.path().join("missing.txt"), &mut store)
            .unwrap_err();
        assert!(matches!(err, BackboneError::UnsupportedProfile(_)));
        assert!(store.artifacts.is_empty());
    }

    #[test]
    fn missing_or_directory_source_is_invalid() {
        let dir = TempDir::new().unwrap();
        let analyzer = FakeAnalyzer::always(Err("unused".into()));
        let mut store = MemoryStore::default();
        let pipeline = Pipeline::new(PipelineConfig::default(), &analyzer);
        for path in [dir.path().join("missing.txt"), dir.path().to_path_buf()] {
            assert!(matches!(
                pipeline.run("digest_topics", &path, &mut store),
                Err(BackboneError::SourceInvalid(_))
            ));
        }
    }

    #[test]
    fn blank_source_fails_ingest_without_artifact() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "  \n\t\n");
        let analyzer = FakeAnalyzer::always(Err("unused".into()));
        let mut store = MemoryStore::default();
        let err = Pipeline::new(PipelineConfig::default(), &analyzer)
            .run("digest_topics", &src, &mut store)
            .unwrap_err();
        assert!(matches!(err, BackboneError::StageFailure { ref stage, .. } if stage == "ingest"));
        assert!(store.artifacts.is_empty());
    }

    #[test]
    fn fs_store_persists_artifact_and_run_event() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "Notes from the mentor session. Next steps agreed.");
        let analyzer = FakeAnalyzer::always(Err("unused".into()));
        let mut store = FsStore::new(dir.path());
        let outcome = Pipeline::new(PipelineConfig::default(), &analyzer)
            .run("mentor_session", &src, &mut store)
            .unwrap();

        let on_disk = store.read(&outcome.artifact.id).unwrap();
        assert_eq!(on_disk, outcome.artifact);
        let events = std::fs::read_to_string(dir.path().join("reports/events.jsonl")).unwrap();
        assert!(events.contains(&outcome.artifact.id));
    }
}
