use crate::output::print_json;
use anyhow::Context;
use backbone_core::{config::Config, io, paths};
use std::path::Path;

const TASKS_TEMPLATE: &str = "# Tasks\n\n\
<!-- - [ ] T001 | status=backlog | title=... | required_tests=unit | evidence=reports/T001.md | dod=... -->\n";

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let mut created = Vec::new();
    let mut existing = Vec::new();

    let dir = paths::backbone_dir(root);
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    if paths::config_path(root).exists() {
        existing.push(paths::CONFIG_FILE);
    } else {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        created.push(paths::CONFIG_FILE);
    }

    let tasks = paths::tasks_path(root);
    if tasks.exists() {
        existing.push(paths::TASKS_FILE);
    } else {
        io::atomic_write(&tasks, TASKS_TEMPLATE.as_bytes()).context("failed to write TASKS.md")?;
        created.push(paths::TASKS_FILE);
    }

    if json {
        return print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "created": created,
            "existing": existing,
        }));
    }

    println!("Initialized backbone in: {}", root.display());
    for path in created {
        println!("  created: {path}");
    }
    for path in existing {
        println!("  exists:  {path}");
    }
    Ok(())
}
