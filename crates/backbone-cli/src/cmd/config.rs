use crate::output::print_json;
use anyhow::Context;
use backbone_core::config::Config;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective config (file + BACKBONE_* overrides)
    Show,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => {
            let cfg = Config::load(root).context("failed to load config")?;
            if json {
                print_json(&cfg)
            } else {
                print!("{}", serde_yaml::to_string(&cfg)?);
                Ok(())
            }
        }
    }
}
