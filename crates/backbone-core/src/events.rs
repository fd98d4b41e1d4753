//! The transition audit trail.

use crate::error::{BackboneError, Result};
use crate::types::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One successful status transition.
///
/// Field order and the fixed-precision timestamp make `to_line` a pure
/// function of the event, so a replayed log re-serializes to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
    #[serde(with = "micros")]
    pub timestamp: DateTime<Utc>,
}

impl TransitionEvent {
    pub fn new(task_id: impl Into<String>, from: TaskStatus, to: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            from,
            to,
            timestamp: micros::truncate(Utc::now()),
        }
    }

    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Fold events in order into the final status of every task they mention.
///
/// An event whose `from` disagrees with the status reached so far, or that is
/// not an edge of the state machine, is rejected with its 1-based position.
pub fn replay(events: &[TransitionEvent]) -> Result<BTreeMap<String, TaskStatus>> {
    let mut statuses: BTreeMap<String, TaskStatus> = BTreeMap::new();
    for (i, event) in events.iter().enumerate() {
        let line = i + 1;
        if let Some(current) = statuses.get(&event.task_id) {
            if *current != event.from {
                return Err(BackboneError::EventLogCorrupt {
                    line,
                    reason: format!(
                        "task '{}' is {current} but event starts from {}",
                        event.task_id, event.from
                    ),
                });
            }
        }
        if !event.from.can_move_to(event.to) {
            return Err(BackboneError::EventLogCorrupt {
                line,
                reason: format!("{} -> {} is not a valid transition", event.from, event.to),
            });
        }
        statuses.insert(event.task_id.clone(), event.to);
    }
    Ok(statuses)
}

/// Parse raw log lines, replay them, and check that every event re-serializes
/// to exactly the line it was read from.
pub fn replay_lines(lines: &[String]) -> Result<BTreeMap<String, TaskStatus>> {
    let mut events = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let event = TransitionEvent::from_line(line).map_err(|e| BackboneError::EventLogCorrupt {
            line: i + 1,
            reason: e.to_string(),
        })?;
        if event.to_line()? != *line {
            return Err(BackboneError::EventLogCorrupt {
                line: i + 1,
                reason: "line is not in canonical form".to_string(),
            });
        }
        events.push(event);
    }
    replay(&events)
}

mod micros {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn truncate(ts: DateTime<Utc>) -> DateTime<Utc> {
        let s = ts.to_rfc3339_opts(SecondsFormat::Micros, true);
        DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(ts)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
