use crate::analyzer::ClaudeAnalyzer;
use crate::output::print_json;
use anyhow::Context;
use backbone_core::{config::Config, pipeline::Pipeline, store::FsStore};
use std::path::Path;

pub fn run(root: &Path, profile: &str, source: &Path, json: bool) -> anyhow::Result<()> {
    let cfg = Config::load(root).context("failed to load config")?;
    let analyzer = ClaudeAnalyzer::from_config(&cfg.claude, root)?;
    let mut store = FsStore::new(root);

    let outcome = Pipeline::new(cfg.pipeline(), &analyzer)
        .run(profile, source, &mut store)
        .with_context(|| format!("{profile} run over {} failed", source.display()))?;
    let artifact = &outcome.artifact;

    if json {
        print_json(&serde_json::json!({
            "artifact_id": artifact.id,
            "artifact_path": outcome.path,
            "request_id": artifact.request_id,
            "status": artifact.status,
        }))?;
    } else {
        println!("Artifact {} ({}) written to {}", artifact.id, artifact.status, outcome.path);
        let q = &artifact.quality;
        println!(
            "  {} chars, {} words, {} chunks, {} duplicates removed",
            q.source_length, q.word_count, q.chunk_count, q.dedupe_count
        );
    }

    if let Some(err) = &artifact.error {
        anyhow::bail!("{} stage failed: {}", err.stage, err.message);
    }
    Ok(())
}
