use crate::output::{print_json, print_table};
use anyhow::Context;
use backbone_core::{
    config::Config,
    error::BackboneError,
    events,
    gate::{ShellSuiteRunner, VerificationResult},
    store::{FsStore, Ledger},
    task::{self as task_ops, TaskRecord},
    transition::{TaskEdit, TaskEngine},
    types::TaskStatus,
};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// List tasks in TASKS.md
    List {
        /// Only show tasks with this status
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Show full details for a single task
    Show { id: String },
    /// Move a task to in_progress
    Start { id: String },
    /// Run the task's required suites and check its evidence files
    Verify { id: String },
    /// Mark a verified task as done
    Done { id: String },
    /// Mark a task as blocked
    Block {
        id: String,
        #[arg(required = true)]
        reason: Vec<String>,
    },
    /// Append a new backlog task
    Add {
        id: String,
        #[arg(long)]
        title: String,
        /// Required test suites, comma-separated (e.g. unit,integration)
        #[arg(long, default_value = "")]
        tests: String,
        /// Evidence paths relative to the root, comma-separated
        #[arg(long, default_value = "")]
        evidence: String,
        /// Definition of done
        #[arg(long, default_value = "")]
        dod: String,
    },
    /// Edit task fields; changing tests or evidence invalidates the last verify
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        tests: Option<String>,
        #[arg(long)]
        evidence: Option<String>,
        #[arg(long)]
        dod: Option<String>,
    },
    /// Print the transition log and check that it replays cleanly
    Log {
        /// Only show events for this task
        #[arg(long)]
        task: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        TaskSubcommand::List { status } => list(root, status, json),
        TaskSubcommand::Show { id } => show(root, &id, json),
        TaskSubcommand::Start { id } => {
            let task = engine(root)?.start(&id)?;
            report(&task, "started", json)
        }
        TaskSubcommand::Verify { id } => verify(root, &id, json),
        TaskSubcommand::Done { id } => {
            let task = engine(root)?.done(&id)?;
            report(&task, "done", json)
        }
        TaskSubcommand::Block { id, reason } => {
            let task = engine(root)?.block(&id, &reason.join(" "))?;
            report(&task, "blocked", json)
        }
        TaskSubcommand::Add {
            id,
            title,
            tests,
            evidence,
            dod,
        } => {
            let mut record = TaskRecord::new(id, title);
            record.required_tests = task_ops::split_list(&tests);
            record.evidence = task_ops::split_list(&evidence);
            record.dod = dod;
            let task = engine(root)?.add(record)?;
            report(&task, "added", json)
        }
        TaskSubcommand::Edit {
            id,
            title,
            tests,
            evidence,
            dod,
        } => {
            let edit = TaskEdit {
                title,
                required_tests: tests.as_deref().map(task_ops::split_list),
                evidence: evidence.as_deref().map(task_ops::split_list),
                dod,
            };
            let task = engine(root)?.edit(&id, edit)?;
            report(&task, "updated", json)
        }
        TaskSubcommand::Log { task } => log(root, task.as_deref(), json),
    }
}

fn engine(root: &Path) -> anyhow::Result<TaskEngine<FsStore>> {
    let cfg = Config::load(root).context("failed to load config")?;
    let runner = ShellSuiteRunner::new(cfg.suites.command.clone(), root)
        .with_timeout_seconds(cfg.suites.timeout_sec);
    Ok(TaskEngine::new(FsStore::new(root), Box::new(runner), root))
}

fn report(task: &TaskRecord, verb: &str, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(task);
    }
    println!("Task {} {verb} ({}).", task.id, task.status);
    Ok(())
}

// ---------------------------------------------------------------------------
// list / show
// ---------------------------------------------------------------------------

fn list(root: &Path, status: Option<TaskStatus>, json: bool) -> anyhow::Result<()> {
    let tasks: Vec<TaskRecord> = engine(root)?
        .list()?
        .into_iter()
        .filter(|t| status.map_or(true, |s| t.status == s))
        .collect();

    if json {
        return print_json(&tasks);
    }

    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|t| {
            vec![
                t.id.clone(),
                t.status.to_string(),
                t.title.clone(),
                t.required_tests.join(","),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "TITLE", "TESTS"], rows);
    println!("\n{}", task_ops::summarize(&tasks));
    Ok(())
}

fn show(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let engine = engine(root)?;
    let task = engine.get(id)?;
    let latest = engine.store().latest_verification(id)?;

    if json {
        return print_json(&serde_json::json!({
            "task": task,
            "latest_verification": latest,
        }));
    }

    println!("{}: {}", task.id, task.title);
    println!("  status:         {}", task.status);
    println!("  required_tests: {}", list_or_none(&task.required_tests));
    println!("  evidence:       {}", list_or_none(&task.evidence));
    if !task.dod.is_empty() {
        println!("  dod:            {}", task.dod);
    }
    if let Some(blocker) = &task.blocker {
        println!("  blocker:        {blocker}");
    }
    match latest {
        Some(v) => println!(
            "  last verify:    {} at {}",
            if v.passed { "passed" } else { "failed" },
            v.timestamp.to_rfc3339()
        ),
        None => println!("  last verify:    never"),
    }
    Ok(())
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

fn verify(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let mut engine = engine(root)?;
    match engine.verify(id) {
        Ok(result) => print_verification(&result, json),
        Err(err @ BackboneError::GateFailure { .. }) => {
            // The failed result is in the ledger; show it before the error.
            if let Some(result) = engine.store().latest_verification(id)? {
                print_verification(&result, json)?;
            }
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

fn print_verification(result: &VerificationResult, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(result);
    }
    for suite in &result.suites_run {
        println!(
            "  {:<4} {} ({}ms)",
            if suite.passed { "ok" } else { "FAIL" },
            suite.suite,
            suite.duration_ms
        );
    }
    for path in &result.missing_evidence {
        println!("  MISS {path}");
    }
    println!(
        "Verification {} for {}.",
        if result.passed { "passed" } else { "failed" },
        result.task_id
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// log
// ---------------------------------------------------------------------------

fn log(root: &Path, task: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = FsStore::new(root);
    let lines = store.event_lines()?;
    let statuses = events::replay_lines(&lines).context("event log does not replay")?;
    let events: Vec<_> = store
        .events()?
        .into_iter()
        .filter(|e| task.map_or(true, |id| e.task_id == id))
        .collect();

    if json {
        return print_json(&serde_json::json!({
            "events": events,
            "statuses": statuses,
        }));
    }

    if events.is_empty() {
        println!("No transitions recorded.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = events
        .iter()
        .map(|e| {
            vec![
                e.timestamp.to_rfc3339(),
                e.task_id.clone(),
                e.from.to_string(),
                e.to.to_string(),
            ]
        })
        .collect();
    print_table(&["TIMESTAMP", "TASK", "FROM", "TO"], rows);
    Ok(())
}
