use anyhow::Result;
use clap::Args;
use mv_versioner::CreateArtifact;
use std::path::PathBuf;

use super::{join_aliases, load_metadata, load_settings, open_versioner};

#[derive(Args)]
pub struct CreateArgs {
    /// Checkpoint file to attach
    #[arg(long)]
    checkpoint: PathBuf,

    /// Artifact name
    #[arg(long)]
    name: String,

    /// Artifact type (default: promotion.artifact_type from config)
    #[arg(long = "type")]
    artifact_type: Option<String>,

    #[arg(long, default_value = "")]
    description: String,

    /// Metadata JSON object
    #[arg(long, conflicts_with = "metadata_file")]
    metadata: Option<String>,

    /// Path to a metadata JSON file
    #[arg(long = "metadata-file", conflicts_with = "metadata")]
    metadata_file: Option<PathBuf>,

    /// Alias to apply when publishing (repeatable); `latest` is always added
    #[arg(long = "alias")]
    aliases: Vec<String>,

    /// Submit the artifact to the store
    #[arg(long, default_value_t = false)]
    publish: bool,

    /// Layered config paths in merge order
    #[arg(long = "config")]
    config_paths: Vec<PathBuf>,
}

pub fn run(args: CreateArgs) -> Result<()> {
    let settings = load_settings(&args.config_paths)?;
    let metadata = load_metadata(args.metadata, args.metadata_file)?;
    let artifact_type = args
        .artifact_type
        .unwrap_or_else(|| settings.config.promotion.artifact_type.clone());

    let mut versioner = open_versioner(&settings)?;
    let created = versioner.create_artifact(CreateArtifact {
        checkpoint: Some(&args.checkpoint),
        artifact_name: &args.name,
        artifact_type: &artifact_type,
        description: &args.description,
        aliases: args.aliases,
        metadata: Some(metadata),
        publish: args.publish,
    })?;

    println!("artifact_name={}", created.artifact.name);
    println!("artifact_type={}", created.artifact.artifact_type);
    for attached in created.artifact.files() {
        println!("file={} sha256={}", attached.file.name, attached.file.sha256);
    }
    match &created.published {
        Some(stored) => {
            println!("published=true");
            println!("version={}", stored.version);
            println!("aliases={}", join_aliases(&stored.aliases));
            println!("run_id={}", stored.run_id);
        }
        None => println!("published=false"),
    }
    if let Some(hash) = &settings.config_hash {
        println!("config_hash={hash}");
    }
    Ok(())
}
