use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::{load_settings, open_versioner};

#[derive(Args)]
pub struct LatestArgs {
    /// Artifact name
    #[arg(long)]
    name: String,

    /// Layered config paths in merge order
    #[arg(long = "config")]
    config_paths: Vec<PathBuf>,
}

pub fn run(args: LatestArgs) -> Result<()> {
    let settings = load_settings(&args.config_paths)?;
    let versioner = open_versioner(&settings)?;

    println!("latest_version={}", versioner.get_latest_version(&args.name)?);
    println!("next_version={}", versioner.next_version(&args.name)?);
    Ok(())
}
