use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use mv_promotion::{write_promotion_report_json, ComparisonMode, MissingMetricPolicy};
use mv_schemas::ArtifactQuery;
use mv_store::RunClient;
use mv_versioner::{Artifact, NewModel, PromotionRequest};
use std::path::PathBuf;

use super::{join_aliases, load_metadata, load_settings, open_versioner};

#[derive(Args)]
#[command(group(
    ArgGroup::new("candidate")
        .required(true)
        .args(["checkpoint", "deployed_version"]),
))]
pub struct PromoteArgs {
    /// Artifact name
    #[arg(long)]
    name: String,

    /// Checkpoint of a new model; it is submitted as the next version
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Metadata JSON object for the new model
    #[arg(long, conflicts_with_all = ["metadata_file", "deployed_version"])]
    metadata: Option<String>,

    /// Path to a metadata JSON file for the new model
    #[arg(long = "metadata-file", conflicts_with_all = ["metadata", "deployed_version"])]
    metadata_file: Option<PathBuf>,

    /// Already stored version (`v3`) or alias to promote without resubmitting
    #[arg(long = "deployed-version")]
    deployed_version: Option<String>,

    #[arg(long, default_value = "")]
    description: String,

    /// Artifact type (default: promotion.artifact_type)
    #[arg(long = "type")]
    artifact_type: Option<String>,

    /// Metadata key to compare (default: promotion.comparison_metric)
    #[arg(long)]
    metric: Option<String>,

    /// Promotion alias (default: promotion.promotion_alias)
    #[arg(long)]
    alias: Option<String>,

    /// smaller | smaller_or_equal | greater | greater_or_equal
    #[arg(long)]
    comparison: Option<String>,

    /// abort | promote_candidate
    #[arg(long = "on-missing-metric")]
    on_missing_metric: Option<String>,

    /// Directory for promotion_report.json (default: report.out_dir)
    #[arg(long = "report-dir")]
    report_dir: Option<PathBuf>,

    /// Layered config paths in merge order
    #[arg(long = "config")]
    config_paths: Vec<PathBuf>,
}

pub fn run(args: PromoteArgs) -> Result<()> {
    let settings = load_settings(&args.config_paths)?;
    let cfg = &settings.config.promotion;

    let comparison = match &args.comparison {
        Some(name) => name.parse::<ComparisonMode>()?,
        None => cfg.comparison_mode()?,
    };
    let on_missing_metric = match &args.on_missing_metric {
        Some(name) => name.parse::<MissingMetricPolicy>()?,
        None => cfg.missing_metric_policy()?,
    };
    let request = PromotionRequest::new(
        args.name.clone(),
        args.artifact_type
            .unwrap_or_else(|| cfg.artifact_type.clone()),
        args.metric.unwrap_or_else(|| cfg.comparison_metric.clone()),
        args.alias.unwrap_or_else(|| cfg.promotion_alias.clone()),
    )
    .with_comparison(comparison)
    .with_missing_metric_policy(on_missing_metric);

    let mut versioner = open_versioner(&settings)?;

    let new_model = match (args.deployed_version, args.checkpoint) {
        (Some(selector), _) => {
            let query = ArtifactQuery::new(args.name.as_str(), selector);
            let deployed = versioner
                .run()
                .resolve_artifact(&query, Some(&request.artifact_type))
                .with_context(|| format!("deployed model {query}"))?;
            NewModel::Deployed(deployed)
        }
        (None, Some(checkpoint)) => {
            let metadata = load_metadata(args.metadata, args.metadata_file)?;
            let mut artifact = Artifact::new(args.name.as_str(), request.artifact_type.as_str())
                .with_description(args.description)
                .with_metadata(metadata);
            artifact.add_file(&checkpoint)?;
            NewModel::Pending(artifact)
        }
        (None, None) => anyhow::bail!("either --checkpoint or --deployed-version is required"),
    };

    let outcome = versioner.promote_model(new_model, &request)?;

    println!("decision={}", outcome.decision);
    println!("candidate_version={}", outcome.candidate.version);
    println!("aliases={}", join_aliases(outcome.new_aliases()));
    println!("submitted={}", outcome.submitted);
    if let Some(previous) = &outcome.previous {
        println!("previous_version={}", previous.version);
    }
    println!("previous_demoted={}", outcome.previous_demoted);
    if let Some(m) = &outcome.metrics {
        println!("promoted_metric={}", m.promoted);
        println!("candidate_metric={}", m.candidate);
    }

    let report_dir = args
        .report_dir
        .or_else(|| settings.config.report.out_dir.clone());
    if let Some(dir) = report_dir {
        let path = write_promotion_report_json(&dir, &outcome.report(&request))
            .with_context(|| format!("write promotion report to {}", dir.display()))?;
        println!("report={}", path.display());
    }
    if let Some(hash) = &settings.config_hash {
        println!("config_hash={hash}");
    }
    Ok(())
}
