use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{CreateArgs, LatestArgs, PromoteArgs};

#[derive(Parser)]
#[command(name = "mv")]
#[command(about = "Model versioning over an experiment-tracking artifact store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> project overrides ...)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Package a checkpoint as an artifact, optionally publishing it
    Create(CreateArgs),

    /// Compare a model against the promoted one and move the alias if it wins
    Promote(PromoteArgs),

    /// Print the version index tagged `latest` (-1 when none)
    LatestVersion(LatestArgs),
}

fn main() -> Result<()> {
    // Optional local overrides (MV_STORE_ROOT, RUST_LOG); absent file is fine.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let loaded = mv_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
        Commands::Create(args) => commands::create::run(args)?,
        Commands::Promote(args) => commands::promote::run(args)?,
        Commands::LatestVersion(args) => commands::latest::run(args)?,
    }
    Ok(())
}

/// Logs go to stderr; stdout carries only `key=value` lines.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
