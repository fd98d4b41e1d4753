//! Markdown lesson brief rendered from a successful `lesson_analysis` artifact.

use crate::artifact::RunArtifact;
use crate::error::{BackboneError, Result};
use crate::io;
use crate::types::Profile;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;

const NA: &str = "N/A";
const MAX_TIMELINE: usize = 8;
const DEFAULT_ACTIVITY_MINUTES: u32 = 10;
const MIN_QUIZ: usize = 5;
const MAX_QUIZ: usize = 7;
const MAX_GLOSSARY: usize = 10;

const DEFAULT_TIMELINE: &[&str] = &[
    "00:00 Introduction and problem statement",
    "10:00 Hands-on block",
    "30:00 Reflection and takeaways",
];

const GENERIC_QUIZ: &[(&str, &str)] = &[
    (
        "Which part of the lesson had the most practical value?",
        "The part where participants applied the approach to a real case.",
    ),
    (
        "What should be prepared before the next lesson?",
        "Artifacts, input data and a list of review questions.",
    ),
    (
        "Which idea from the lesson would you explain to a colleague first?",
        "The one that changed how the work is planned or checked.",
    ),
    (
        "What would you do differently when repeating the exercise?",
        "Name one concrete step and the signal that shows it worked.",
    ),
    (
        "How do you know the lesson goals were met?",
        "By checking the stated outcomes against the finished exercises.",
    ),
];

const GLOSSARY: &[(&str, &str)] = &[
    (
        "Microservice architecture",
        "A system split into independently deployable services with separate responsibilities.",
    ),
    (
        "Event-driven design",
        "Components communicate through events instead of tight synchronous calls.",
    ),
    (
        "Transcript analysis",
        "Extracting structure, meaning and actionable conclusions from a session transcript.",
    ),
    (
        "Content chunking",
        "Splitting long text into blocks for stable processing and quality control.",
    ),
    (
        "Digest generation",
        "Condensing long material into short key points.",
    ),
    (
        "Processing pipeline",
        "An ordered sequence of stages from input to final artifact, checked at every step.",
    ),
    (
        "Quality test gates",
        "Mandatory automated checks a change must pass before it counts as finished.",
    ),
];

const FALLBACK_DEFINITION: &str =
    "Term from the lesson: write a local definition for your own context and tools.";

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+)\s*m\s*$").expect("valid regex"))
}

/// `"15m"` → 15. Anything else is unknown.
fn parse_minutes(value: &str) -> Option<u32> {
    duration_re()
        .captures(&value.to_lowercase())
        .and_then(|c| c[1].parse().ok())
}

fn clock(total_minutes: u32) -> String {
    let (h, m) = (total_minutes / 60, total_minutes % 60);
    if h > 0 {
        format!("{h:02}:{m:02}:00")
    } else {
        format!("{m:02}:00")
    }
}

fn text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(text).collect())
        .unwrap_or_default()
}

fn bullets(lines: &mut Vec<String>, items: &[String]) {
    if items.is_empty() {
        lines.push(format!("- {NA}"));
    } else {
        lines.extend(items.iter().map(|i| format!("- {i}")));
    }
}

fn timeline(activities: &[Value]) -> Vec<String> {
    if activities.is_empty() {
        return DEFAULT_TIMELINE.iter().map(|s| s.to_string()).collect();
    }
    let mut cursor = 0;
    activities
        .iter()
        .take(MAX_TIMELINE)
        .map(|item| {
            let activity = text(&item["activity"]).unwrap_or_else(|| "Practice".to_string());
            let line = format!("{} {activity}", clock(cursor));
            let minutes = text(&item["duration_estimate"])
                .and_then(|d| parse_minutes(&d))
                .unwrap_or(DEFAULT_ACTIVITY_MINUTES);
            cursor = cursor.saturating_add(minutes);
            line
        })
        .collect()
}

fn homework(value: &Value) -> Vec<String> {
    match value {
        Value::String(_) => text(value).into_iter().collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(_) => text(item),
                Value::Object(_) => {
                    let task = text(&item["task"]).unwrap_or_else(|| "Task".to_string());
                    let mut details = Vec::new();
                    if let Some(d) = text(&item["description"]) {
                        details.push(format!("description={d}"));
                    }
                    if let Some(d) = text(&item["deadline"]) {
                        details.push(format!("deadline={d}"));
                    }
                    if details.is_empty() {
                        Some(task)
                    } else {
                        Some(format!("{task} ({})", details.join("; ")))
                    }
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn quiz(concepts: &[String], suggestions: &[String]) -> Vec<(String, String)> {
    let mut quiz: Vec<(String, String)> = concepts
        .iter()
        .take(4)
        .map(|c| {
            (
                format!("What does '{c}' mean in the context of this lesson?"),
                format!("'{c}' is a key topic of the lesson. Define it through a practical example from the session."),
            )
        })
        .collect();
    for s in suggestions.iter().take(3) {
        if quiz.len() >= MAX_QUIZ {
            break;
        }
        quiz.push((
            "Which improvement should the next lesson adopt, and why?".to_string(),
            format!("One concrete improvement: {s}"),
        ));
    }
    for (q, a) in GENERIC_QUIZ {
        if quiz.len() >= MIN_QUIZ {
            break;
        }
        quiz.push((q.to_string(), a.to_string()));
    }
    quiz.truncate(MAX_QUIZ);
    quiz
}

fn definition(term: &str) -> &'static str {
    GLOSSARY
        .iter()
        .find(|(t, _)| *t == term)
        .map(|(_, d)| *d)
        .unwrap_or(FALLBACK_DEFINITION)
}

/// Render `artifact` as Markdown. `label` names the artifact in the Meta and
/// Sources sections.
pub fn lesson_brief(artifact: &RunArtifact, label: &str) -> Result<String> {
    if artifact.profile != Profile::LessonAnalysis {
        return Err(BackboneError::ArtifactInvalid(format!(
            "artifact profile must be '{}' for lesson brief rendering, got '{}'",
            Profile::LessonAnalysis,
            artifact.profile
        )));
    }
    if !artifact.is_success() {
        return Err(BackboneError::ArtifactInvalid(format!(
            "artifact status must be 'success', got '{}'",
            artifact.status
        )));
    }
    let result = match &artifact.result {
        Some(r @ Value::Object(_)) => r,
        _ => {
            return Err(BackboneError::ArtifactInvalid(
                "artifact has no result object".to_string(),
            ))
        }
    };

    let summary = text(&result["summary"]);
    let detailed = text(&result["detailed_summary"]).or_else(|| summary.clone());
    let concepts = strings(&result["concepts_explained"]);
    let questions = strings(&result["questions_asked"]);
    let suggestions = strings(&result["improvement_suggestions"]);
    let preparation = strings(&result["preparation_for_next"]);
    let activities = result["practical_activities"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let mut lines: Vec<String> = vec!["# Lesson Brief".into(), String::new()];

    lines.push("## Meta".into());
    lines.push(format!("- Artifact: `{label}`"));
    lines.push(format!("- Created at: `{}`", artifact.created_at.to_rfc3339()));
    lines.push(format!("- Word count: `{}`", artifact.quality.word_count));
    lines.push(format!("- Chunk count: `{}`", artifact.quality.chunk_count));
    if let Some(model) = &artifact.analysis_model {
        lines.push(format!("- Model: `{model}`"));
    }
    lines.push(String::new());

    lines.push("## Summary".into());
    lines.push(summary.unwrap_or_else(|| NA.to_string()));
    lines.push(String::new());

    lines.push("## Detailed Summary".into());
    lines.push(detailed.unwrap_or_else(|| NA.to_string()));
    lines.push(String::new());

    lines.push("## Concepts".into());
    bullets(&mut lines, &concepts);
    lines.push(String::new());

    lines.push("## Lesson Timeline".into());
    lines.extend(timeline(&activities).into_iter().map(|t| format!("- {t}")));
    lines.push(String::new());

    lines.push("## Practical Activities".into());
    let practical: Vec<String> = activities
        .iter()
        .map(|item| {
            format!(
                "{} (`duration={}`, `participation={}`)",
                text(&item["activity"]).unwrap_or_else(|| "Practice".to_string()),
                text(&item["duration_estimate"]).unwrap_or_else(|| "n/a".to_string()),
                text(&item["participation"]).unwrap_or_else(|| "n/a".to_string()),
            )
        })
        .collect();
    bullets(&mut lines, &practical);
    lines.push(String::new());

    lines.push("## Questions Raised".into());
    bullets(&mut lines, &questions);
    lines.push(String::new());

    lines.push("## Homework".into());
    bullets(&mut lines, &homework(&result["homework"]));
    lines.push(String::new());

    lines.push("## Improvement Suggestions".into());
    bullets(&mut lines, &suggestions);
    lines.push(String::new());

    lines.push("## Preparation For Next Lesson".into());
    bullets(&mut lines, &preparation);
    lines.push(String::new());

    lines.push("## Next Lesson Focus".into());
    lines.push(text(&result["next_lesson_focus"]).unwrap_or_else(|| NA.to_string()));
    lines.push(String::new());

    lines.push(format!("## Quiz ({MIN_QUIZ}-{MAX_QUIZ} questions)"));
    for (i, (q, a)) in quiz(&concepts, &suggestions).iter().enumerate() {
        lines.push(format!("{}. Q: {q}", i + 1));
        lines.push(format!("   A: {a}"));
    }
    lines.push(String::new());

    lines.push("## Glossary".into());
    let terms: Vec<String> = if concepts.is_empty() {
        vec!["Key lesson topic".to_string()]
    } else {
        concepts.iter().take(MAX_GLOSSARY).cloned().collect()
    };
    for term in &terms {
        lines.push(format!("- **{term}**: {}", definition(term)));
    }
    lines.push(String::new());

    lines.push("## Sources".into());
    lines.push(format!("- Artifact JSON: `{label}`"));

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

/// Read the artifact at `artifact_path`, render it and write the brief to
/// `output`, creating parent directories.
pub fn render_lesson_brief(artifact_path: &Path, output: &Path) -> Result<()> {
    if !artifact_path.is_file() {
        return Err(BackboneError::ArtifactInvalid(format!(
            "artifact file does not exist or is a directory: {}",
            artifact_path.display()
        )));
    }
    let artifact = RunArtifact::from_json(&std::fs::read_to_string(artifact_path)?)?;
    let markdown = lesson_brief(&artifact, &artifact_path.display().to_string())?;
    io::atomic_write(output, markdown.as_bytes())?;
    tracing::info!(output = %output.display(), "lesson brief rendered");
    Ok(())
}
