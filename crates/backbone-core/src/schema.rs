//! Strict, profile-keyed payload validation.
//!
//! Every profile payload is described once as a [`Shape`]. The same shape
//! drives both validation and the JSON Schema handed to the analysis
//! collaborator, so the two cannot drift apart.

use crate::error::{BackboneError, Result};
use crate::types::Profile;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::OnceLock;

/// One rejected location in a payload.
///
/// `actual` is the JSON type name found, or `missing` / `unexpected` for
/// absent and unknown keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

impl Violation {
    fn new(path: &str, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            path: if path.is_empty() { "$".to_string() } else { path.to_string() },
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: expected {}, got {}", self.path, self.expected, self.actual)
    }
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Shape {
    String,
    NonEmptyString,
    NullableString,
    Integer { min: Option<i64>, max: Option<i64> },
    Boolean,
    Array(Box<Shape>),
    Object(Vec<(&'static str, Shape)>),
    OneOf(Vec<Shape>),
}

fn array(item: Shape) -> Shape {
    Shape::Array(Box::new(item))
}

fn string_list() -> Shape {
    array(Shape::NonEmptyString)
}

fn percent() -> Shape {
    Shape::Integer {
        min: Some(0),
        max: Some(100),
    }
}

fn metrics() -> Shape {
    let count = || Shape::Integer {
        min: Some(0),
        max: None,
    };
    Shape::Object(vec![("word_count", count()), ("chunk_count", count())])
}

fn lesson_shape() -> Shape {
    Shape::Object(vec![
        ("summary", Shape::String),
        ("detailed_summary", Shape::NullableString),
        ("questions_asked", string_list()),
        ("concepts_explained", string_list()),
        (
            "practical_activities",
            array(Shape::Object(vec![
                ("activity", Shape::String),
                ("duration_estimate", Shape::NullableString),
                ("participation", Shape::NullableString),
            ])),
        ),
        (
            "theory_practice_balance",
            Shape::Object(vec![
                ("theory_percent", percent()),
                ("practice_percent", percent()),
                ("assessment", Shape::NullableString),
            ]),
        ),
        (
            "interactivity",
            Shape::Object(vec![
                (
                    "questions_to_students",
                    Shape::Integer {
                        min: Some(0),
                        max: None,
                    },
                ),
                ("polls_or_checks", string_list()),
                ("breakouts_or_pair_work", Shape::Boolean),
            ]),
        ),
        ("learning_outcomes_stated", Shape::Boolean),
        (
            "lesson_structure",
            Shape::Object(vec![
                ("has_opening", Shape::Boolean),
                ("has_closing", Shape::Boolean),
                ("transitions_clear", Shape::Boolean),
            ]),
        ),
        ("improvement_suggestions", string_list()),
        (
            "homework",
            Shape::OneOf(vec![
                Shape::String,
                string_list(),
                array(Shape::Object(vec![
                    ("task", Shape::String),
                    ("description", Shape::NullableString),
                    ("deadline", Shape::NullableString),
                ])),
            ]),
        ),
        ("preparation_for_next", string_list()),
        ("next_lesson_focus", Shape::NullableString),
    ])
}

fn digest_shape() -> Shape {
    Shape::Object(vec![
        ("topics", array(Shape::String)),
        ("summary", Shape::String),
        ("metrics", metrics()),
    ])
}

fn mentor_shape() -> Shape {
    Shape::Object(vec![
        ("summary", Shape::String),
        ("next_actions", array(Shape::String)),
        ("metrics", metrics()),
    ])
}

fn shape_for(profile: Profile) -> &'static Shape {
    static LESSON: OnceLock<Shape> = OnceLock::new();
    static DIGEST: OnceLock<Shape> = OnceLock::new();
    static MENTOR: OnceLock<Shape> = OnceLock::new();
    match profile {
        Profile::LessonAnalysis => LESSON.get_or_init(lesson_shape),
        Profile::DigestTopics => DIGEST.get_or_init(digest_shape),
        Profile::MentorSession => MENTOR.get_or_init(mentor_shape),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

impl Shape {
    fn describe(&self) -> String {
        match self {
            Shape::String => "string".to_string(),
            Shape::NonEmptyString => "non-empty string".to_string(),
            Shape::NullableString => "string or null".to_string(),
            Shape::Integer { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => format!("integer in {lo}..={hi}"),
                (Some(lo), None) => format!("integer >= {lo}"),
                (None, Some(hi)) => format!("integer <= {hi}"),
                (None, None) => "integer".to_string(),
            },
            Shape::Boolean => "boolean".to_string(),
            Shape::Array(item) => format!("array of {}", item.describe()),
            Shape::Object(_) => "object".to_string(),
            Shape::OneOf(options) => options
                .iter()
                .map(Shape::describe)
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }

    fn check(&self, value: &Value, path: &str, out: &mut Vec<Violation>) {
        match (self, value) {
            (Shape::String, Value::String(_)) => {}
            (Shape::NullableString, Value::String(_) | Value::Null) => {}
            (Shape::NonEmptyString, Value::String(s)) => {
                if s.trim().is_empty() {
                    out.push(Violation::new(path, self.describe(), "empty string"));
                }
            }
            (Shape::Boolean, Value::Bool(_)) => {}
            (Shape::Integer { min, max }, Value::Number(n)) if n.is_i64() || n.is_u64() => {
                // u64 beyond i64::MAX is above any bound we declare
                let in_range = match n.as_i64() {
                    Some(v) => min.map_or(true, |lo| v >= lo) && max.map_or(true, |hi| v <= hi),
                    None => max.is_none(),
                };
                if !in_range {
                    out.push(Violation::new(path, self.describe(), n.to_string()));
                }
            }
            (Shape::Array(item), Value::Array(items)) => {
                for (i, v) in items.iter().enumerate() {
                    item.check(v, &format!("{path}[{i}]"), out);
                }
            }
            (Shape::Object(fields), Value::Object(map)) => {
                for (key, shape) in fields {
                    match map.get(*key) {
                        Some(v) => shape.check(v, &child(path, key), out),
                        None => out.push(Violation::new(
                            &child(path, key),
                            shape.describe(),
                            "missing",
                        )),
                    }
                }
                for key in map.keys() {
                    if !fields.iter().any(|(k, _)| k == key) {
                        out.push(Violation::new(&child(path, key), "no such field", "unexpected"));
                    }
                }
            }
            (Shape::OneOf(options), _) => {
                let matched = options.iter().any(|option| {
                    let mut scratch = Vec::new();
                    option.check(value, path, &mut scratch);
                    scratch.is_empty()
                });
                if !matched {
                    out.push(Violation::new(path, self.describe(), type_name(value)));
                }
            }
            _ => out.push(Violation::new(path, self.describe(), type_name(value))),
        }
    }

    fn to_json_schema(&self) -> Value {
        match self {
            Shape::String => json!({"type": "string"}),
            Shape::NonEmptyString => json!({"type": "string", "minLength": 1}),
            Shape::NullableString => json!({"type": ["string", "null"]}),
            Shape::Boolean => json!({"type": "boolean"}),
            Shape::Integer { min, max } => {
                let mut schema = Map::new();
                schema.insert("type".into(), json!("integer"));
                if let Some(lo) = min {
                    schema.insert("minimum".into(), json!(lo));
                }
                if let Some(hi) = max {
                    schema.insert("maximum".into(), json!(hi));
                }
                Value::Object(schema)
            }
            Shape::Array(item) => json!({"type": "array", "items": item.to_json_schema()}),
            Shape::Object(fields) => {
                let properties: Map<String, Value> = fields
                    .iter()
                    .map(|(k, s)| (k.to_string(), s.to_json_schema()))
                    .collect();
                let required: Vec<&str> = fields.iter().map(|(k, _)| *k).collect();
                json!({
                    "type": "object",
                    "additionalProperties": false,
                    "required": required,
                    "properties": properties,
                })
            }
            Shape::OneOf(options) => {
                json!({"anyOf": options.iter().map(Shape::to_json_schema).collect::<Vec<_>>()})
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// All violations in `payload` for `profile`; empty means valid.
pub fn check(profile: Profile, payload: &Value) -> Vec<Violation> {
    let mut out = Vec::new();
    shape_for(profile).check(payload, "", &mut out);
    if out.is_empty() && profile == Profile::LessonAnalysis {
        check_balance(payload, &mut out);
    }
    out
}

fn check_balance(payload: &Value, out: &mut Vec<Violation>) {
    let balance = &payload["theory_practice_balance"];
    let theory = balance["theory_percent"].as_i64().unwrap_or_default();
    let practice = balance["practice_percent"].as_i64().unwrap_or_default();
    if theory + practice != 100 {
        out.push(Violation::new(
            "theory_practice_balance",
            "theory_percent + practice_percent = 100",
            (theory + practice).to_string(),
        ));
    }
}

/// Return `payload` unchanged when it conforms, else `SchemaViolation`.
pub fn validate(profile: Profile, payload: Value) -> Result<Value> {
    let violations = check(profile, &payload);
    if violations.is_empty() {
        Ok(payload)
    } else {
        Err(BackboneError::SchemaViolation {
            profile: profile.to_string(),
            violations,
        })
    }
}

/// JSON Schema document for `profile`. Objects are closed and every key is required.
pub fn json_schema(profile: Profile) -> Value {
    shape_for(profile).to_json_schema()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn lesson() -> Value {
        json!({
            "summary": "Intro to pipelines",
            "detailed_summary": null,
            "questions_asked": ["What is a stage?"],
            "concepts_explained": ["Chunking", "Deduplication"],
            "practical_activities": [
                {"activity": "Build a chunker", "duration_estimate": "20m", "participation": "pairs"}
            ],
            "theory_practice_balance": {"theory_percent": 40, "practice_percent": 60, "assessment": null},
            "interactivity": {"questions_to_students": 3, "polls_or_checks": [], "breakouts_or_pair_work": true},
            "learning_outcomes_stated": true,
            "lesson_structure": {"has_opening": true, "has_closing": false, "transitions_clear": true},
            "improvement_suggestions": ["More examples"],
            "homework": [{"task": "Write a stage", "description": null, "deadline": "Friday"}],
            "preparation_for_next": ["Read chapter 3"],
            "next_lesson_focus": "Validation"
        })
    }

    fn paths(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.path.as_str()).collect()
    }

    #[test]
    fn valid_lesson_passes_unchanged() {
        let payload = lesson();
        assert_eq!(validate(Profile::LessonAnalysis, payload.clone()).unwrap(), payload);
    }

    #[test]
    fn missing_summary_is_named() {
        let mut payload = lesson();
        payload.as_object_mut().unwrap().remove("summary");
        let violations = check(Profile::LessonAnalysis, &payload);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "summary");
        assert_eq!(violations[0].actual, "missing");
    }

    #[test]
    fn concepts_must_be_array() {
        let mut payload = lesson();
        payload["concepts_explained"] = json!("Chunking");
        let violations = check(Profile::LessonAnalysis, &payload);
        assert_eq!(paths(&violations), vec!["concepts_explained"]);
        assert_eq!(violations[0].actual, "string");
    }

    #[test]
    fn unknown_key_is_unexpected() {
        let mut payload = lesson();
        payload["mood"] = json!("great");
        let violations = check(Profile::LessonAnalysis, &payload);
        assert_eq!(violations[0].path, "mood");
        assert_eq!(violations[0].actual, "unexpected");
    }

    #[test]
    fn no_coercion_between_types() {
        let mut payload = lesson();
        payload["summary"] = json!(42);
        payload["interactivity"]["questions_to_students"] = json!(2.0);
        payload["lesson_structure"]["has_opening"] = json!(1);
        let violations = check(Profile::LessonAnalysis, &payload);
        let found = paths(&violations);
        assert!(found.contains(&"summary"));
        assert!(found.contains(&"interactivity.questions_to_students"));
        assert!(found.contains(&"lesson_structure.has_opening"));
    }

    #[test]
    fn booleans_are_not_integers() {
        let mut payload = lesson();
        payload["interactivity"]["questions_to_students"] = json!(true);
        let violations = check(Profile::LessonAnalysis, &payload);
        assert_eq!(violations[0].actual, "boolean");
    }

    #[test]
    fn nested_array_paths_are_indexed() {
        let mut payload = lesson();
        payload["practical_activities"][0]["activity"] = json!(null);
        let violations = check(Profile::LessonAnalysis, &payload);
        assert_eq!(paths(&violations), vec!["practical_activities[0].activity"]);
    }

    #[test]
    fn percents_must_sum_to_100() {
        let mut payload = lesson();
        payload["theory_practice_balance"]["practice_percent"] = json!(50);
        let err = validate(Profile::LessonAnalysis, payload).unwrap_err();
        assert!(err.to_string().contains("theory_practice_balance"));
    }

    #[test]
    fn percent_out_of_range() {
        let mut payload = lesson();
        payload["theory_practice_balance"]["theory_percent"] = json!(140);
        payload["theory_practice_balance"]["practice_percent"] = json!(-40);
        let violations = check(Profile::LessonAnalysis, &payload);
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn homework_accepts_three_forms() {
        for homework in [
            json!("Read the notes"),
            json!(["Read the notes", "Try the kata"]),
            json!([{"task": "Kata", "description": "Bowling", "deadline": null}]),
        ] {
            let mut payload = lesson();
            payload["homework"] = homework.clone();
            assert!(check(Profile::LessonAnalysis, &payload).is_empty(), "{homework}");
        }
        let mut payload = lesson();
        payload["homework"] = json!(7);
        assert_eq!(paths(&check(Profile::LessonAnalysis, &payload)), vec!["homework"]);
    }

    #[test]
    fn empty_strings_rejected_in_lists() {
        let mut payload = lesson();
        payload["questions_asked"] = json!(["ok", "  "]);
        let violations = check(Profile::LessonAnalysis, &payload);
        assert_eq!(paths(&violations), vec!["questions_asked[1]"]);
    }

    #[test]
    fn non_object_root() {
        let violations = check(Profile::DigestTopics, &json!([1, 2]));
        assert_eq!(violations[0].path, "$");
        assert_eq!(violations[0].actual, "array");
    }

    #[test]
    fn digest_and_mentor_shapes() {
        let digest = json!({"topics": ["A"], "summary": "s", "metrics": {"word_count": 3, "chunk_count": 1}});
        assert!(check(Profile::DigestTopics, &digest).is_empty());
        let mentor = json!({"summary": "s", "next_actions": [], "metrics": {"word_count": 0, "chunk_count": 0}});
        assert!(check(Profile::MentorSession, &mentor).is_empty());
        assert!(!check(Profile::MentorSession, &digest).is_empty());
    }

    #[test]
    fn json_schema_is_closed() {
        let schema = json_schema(Profile::LessonAnalysis);
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(schema["required"].as_array().unwrap().len(), 13);
        assert_eq!(
            schema["properties"]["theory_practice_balance"]["properties"]["theory_percent"]["maximum"],
            json!(100)
        );
        assert!(schema["properties"]["homework"]["anyOf"].is_array());
    }
}
