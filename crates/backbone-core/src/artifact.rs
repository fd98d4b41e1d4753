use crate::error::{BackboneError, Result};
use crate::schema::Violation;
use crate::types::{Profile, RunStatus};
use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ---------------------------------------------------------------------------
// Quality
// ---------------------------------------------------------------------------

/// Counters derived only from the ingest/chunk/dedupe stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality {
    pub source_length: u64,
    pub chunk_count: u64,
    pub dedupe_count: u64,
    pub word_count: u64,
}

// ---------------------------------------------------------------------------
// StageTimings
// ---------------------------------------------------------------------------

/// Stage name → elapsed milliseconds, kept in execution order.
///
/// Serialized as a JSON object whose key order is the stage order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTimings(Vec<(String, u64)>);

impl StageTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: impl Into<String>, elapsed_ms: u64) {
        self.0.push((stage.into(), elapsed_ms));
    }

    pub fn get(&self, stage: &str) -> Option<u64> {
        self.0.iter().find(|(s, _)| s == stage).map(|(_, ms)| *ms)
    }

    pub fn stages(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(s, _)| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for StageTimings {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (stage, ms) in &self.0 {
            map.serialize_entry(stage, ms)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StageTimings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TimingsVisitor;

        impl<'de> Visitor<'de> for TimingsVisitor {
            type Value = StageTimings;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of stage name to milliseconds")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<StageTimings, A::Error> {
                let mut timings = StageTimings::new();
                while let Some((stage, ms)) = access.next_entry::<String, u64>()? {
                    timings.record(stage, ms);
                }
                Ok(timings)
            }
        }

        deserializer.deserialize_map(TimingsVisitor)
    }
}

// ---------------------------------------------------------------------------
// RunError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub stage: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

// ---------------------------------------------------------------------------
// RunArtifact
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArtifact {
    pub id: String,
    pub request_id: String,
    pub profile: Profile,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub source: String,
    pub analysis_provider: Option<String>,
    pub analysis_model: Option<String>,
    pub quality: Quality,
    pub timings_ms: StageTimings,
    pub result: Option<serde_json::Value>,
    pub error: Option<RunError>,
}

impl RunArtifact {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| BackboneError::ArtifactInvalid(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
