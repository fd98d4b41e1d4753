//! Built-in generators for the profiles that need no external analysis.
//! Output depends only on the normalized text and the quality counters.

use crate::artifact::Quality;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

const MAX_TOPICS: usize = 8;
const MIN_TOKEN_CHARS: usize = 7;
const FALLBACK_SUMMARY_CHARS: usize = 200;

/// Substring needle → topic label. Checked before token frequency.
const KNOWN_TOPICS: &[(&str, &str)] = &[
    ("microservice", "Microservice architecture"),
    ("микросервис", "Microservice architecture"),
    ("event-driven", "Event-driven design"),
    ("transcript", "Transcript analysis"),
    ("транскрипт", "Transcript analysis"),
    ("chunk", "Content chunking"),
    ("чанк", "Content chunking"),
    ("digest", "Digest generation"),
    ("дайджест", "Digest generation"),
    ("github issue", "Task tracking with GitHub issues"),
    ("pipeline", "Processing pipeline"),
    ("пайплайн", "Processing pipeline"),
    ("test gate", "Quality test gates"),
    ("тест-гейт", "Quality test gates"),
];

const STOP_WORDS: &[&str] = &[
    "because", "through", "without", "another", "something", "everything", "however",
    "сегодня", "уроке", "потом", "чтобы", "всего", "через", "задачи",
];

const NEXT_ACTIONS: &[&str] = &[
    "Draft the task list for the coming week",
    "Record risks and assumptions",
    "Prepare artifacts for the retrospective",
];

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}-]+").expect("valid regex"))
}

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+|\n+").expect("valid regex"))
}

pub fn sentences(text: &str) -> Vec<String> {
    sentence_re()
        .split(text)
        .map(|s| s.trim_matches(|c: char| c == ' ' || ".!?,".contains(c)))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn topics(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut topics: Vec<String> = Vec::new();
    for (needle, label) in KNOWN_TOPICS {
        if lower.contains(needle) && !topics.iter().any(|t| t == label) {
            topics.push(label.to_string());
        }
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for token in token_re().find_iter(&lower).map(|m| m.as_str()) {
        if token.chars().count() < MIN_TOKEN_CHARS || STOP_WORDS.contains(&token) {
            continue;
        }
        *counts.entry(token).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    // BTreeMap order already breaks ties alphabetically; the sort is stable.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    for (token, _) in ranked {
        if topics.len() >= MAX_TOPICS {
            break;
        }
        let label = capitalize(token);
        if !topics.contains(&label) {
            topics.push(label);
        }
    }
    topics.truncate(MAX_TOPICS);
    topics
}

fn fallback_summary(text: &str) -> String {
    text.chars().take(FALLBACK_SUMMARY_CHARS).collect()
}

fn metrics(quality: &Quality) -> Value {
    json!({
        "word_count": quality.word_count,
        "chunk_count": quality.chunk_count,
    })
}

pub fn digest_topics(text: &str, quality: &Quality) -> Value {
    let summary = sentences(text)
        .into_iter()
        .next()
        .unwrap_or_else(|| fallback_summary(text));
    json!({
        "topics": topics(text),
        "summary": summary,
        "metrics": metrics(quality),
    })
}

pub fn mentor_session(text: &str, quality: &Quality) -> Value {
    let sentences = sentences(text);
    let summary = if sentences.is_empty() {
        fallback_summary(text)
    } else {
        sentences.iter().take(2).cloned().collect::<Vec<_>>().join(". ")
    };
    json!({
        "summary": summary,
        "next_actions": NEXT_ACTIONS,
        "metrics": metrics(quality),
    })
}
