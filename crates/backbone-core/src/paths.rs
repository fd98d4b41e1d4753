use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File layout constants
// ---------------------------------------------------------------------------

pub const BACKBONE_DIR: &str = ".backbone";
pub const TASKS_FILE: &str = "TASKS.md";
pub const CONFIG_FILE: &str = ".backbone/config.yaml";
pub const VERIFICATIONS_FILE: &str = ".backbone/verifications.jsonl";
pub const EVENTS_FILE: &str = ".backbone/events.jsonl";
pub const ARTIFACTS_DIR: &str = "artifacts";
pub const RUN_EVENTS_FILE: &str = "reports/events.jsonl";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn backbone_dir(root: &Path) -> PathBuf {
    root.join(BACKBONE_DIR)
}

pub fn tasks_path(root: &Path) -> PathBuf {
    root.join(TASKS_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn verifications_path(root: &Path) -> PathBuf {
    root.join(VERIFICATIONS_FILE)
}

pub fn events_path(root: &Path) -> PathBuf {
    root.join(EVENTS_FILE)
}

pub fn artifacts_dir(root: &Path) -> PathBuf {
    root.join(ARTIFACTS_DIR)
}

pub fn artifact_path(root: &Path, artifact_id: &str) -> PathBuf {
    artifacts_dir(root).join(format!("{artifact_id}.json"))
}

pub fn run_events_path(root: &Path) -> PathBuf {
    root.join(RUN_EVENTS_FILE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
