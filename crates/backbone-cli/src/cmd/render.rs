use crate::output::print_json;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum RenderSubcommand {
    /// Render a successful lesson_analysis artifact as a Markdown brief
    LessonBrief {
        #[arg(long)]
        artifact: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

pub fn run(subcmd: RenderSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        RenderSubcommand::LessonBrief { artifact, output } => {
            backbone_core::render::render_lesson_brief(&artifact, &output)?;
            if json {
                print_json(&serde_json::json!({ "output_path": output.display().to_string() }))?;
            } else {
                println!("Lesson brief written to {}", output.display());
            }
            Ok(())
        }
    }
}
