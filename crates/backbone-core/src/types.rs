use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    InProgress,
    Blocked,
    Done,
}

impl TaskStatus {
    pub fn all() -> &'static [TaskStatus] {
        &[
            TaskStatus::Backlog,
            TaskStatus::InProgress,
            TaskStatus::Blocked,
            TaskStatus::Done,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
        }
    }

    /// Whether the state machine has an edge from `self` to `target`.
    pub fn can_move_to(self, target: TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Backlog, TaskStatus::InProgress)
                | (TaskStatus::Blocked, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Done)
                | (TaskStatus::Backlog, TaskStatus::Blocked)
                | (TaskStatus::InProgress, TaskStatus::Blocked)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(TaskStatus::Backlog),
            "in_progress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "done" => Ok(TaskStatus::Done),
            _ => Err(format!("invalid status '{s}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    LessonAnalysis,
    DigestTopics,
    MentorSession,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::LessonAnalysis => "lesson_analysis",
            Profile::DigestTopics => "digest_topics",
            Profile::MentorSession => "mentor_session",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Profile {
    type Err = crate::error::BackboneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lesson_analysis" => Ok(Profile::LessonAnalysis),
            "digest_topics" => Ok(Profile::DigestTopics),
            "mentor_session" => Ok(Profile::MentorSession),
            _ => Err(crate::error::BackboneError::UnsupportedProfile(
                s.to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
