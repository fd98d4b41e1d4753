mod analyzer;
mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, render::RenderSubcommand, task::TaskSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "backbone",
    about = "Gate task completion on tests and evidence; run transcript analysis pipelines",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .backbone/, TASKS.md or .git/)
    #[arg(long, global = true, env = "BACKBONE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .backbone/ with a default config and an empty TASKS.md
    Init,

    /// Manage tasks in TASKS.md
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Run an analysis pipeline over a transcript
    Run {
        /// Profile: lesson_analysis, digest_topics or mentor_session
        #[arg(long)]
        profile: String,
        /// Transcript file
        #[arg(long)]
        source: PathBuf,
    },

    /// Render artifacts to Markdown
    Render {
        #[command(subcommand)]
        subcommand: RenderSubcommand,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Task { subcommand } => cmd::task::run(&root, subcommand, cli.json),
        Commands::Run { profile, source } => cmd::run::run(&root, &profile, &source, cli.json),
        Commands::Render { subcommand } => cmd::render::run(subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
