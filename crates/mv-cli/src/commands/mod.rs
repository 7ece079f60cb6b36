use anyhow::{Context, Result};
use mv_config::{report_unused_keys, UnusedKeyPolicy, VersionerConfig};
use mv_schemas::{AliasSet, Metadata};
use mv_store::OfflineRun;
use mv_versioner::Versioner;
use std::fs;
use std::path::{Path, PathBuf};

pub mod create;
pub mod latest;
pub mod promote;

pub use create::CreateArgs;
pub use latest::LatestArgs;
pub use promote::PromoteArgs;

/// Effective settings for one invocation.
pub struct Settings {
    pub config: VersionerConfig,
    /// `None` when no `--config` layers were given.
    pub config_hash: Option<String>,
}

pub fn load_settings(paths: &[PathBuf]) -> Result<Settings> {
    if paths.is_empty() {
        return Ok(Settings {
            config: VersionerConfig::default(),
            config_hash: None,
        });
    }

    let loaded = mv_config::load_layered_yaml(paths)?;
    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for key in &unused.unused_leaf_pointers {
        tracing::warn!(key = %key, "config key is not used by mv");
    }

    Ok(Settings {
        config: VersionerConfig::from_loaded(&loaded)?,
        config_hash: Some(loaded.config_hash),
    })
}

/// Open a fresh offline run under the configured store root.
pub fn open_versioner(settings: &Settings) -> Result<Versioner<OfflineRun>> {
    let cfg = &settings.config;
    let root = cfg.resolve_store_root(|name| std::env::var(name).ok());
    let run = OfflineRun::init(&root, &cfg.store.project).with_context(|| {
        format!(
            "open store at {} (project {})",
            root.display(),
            cfg.store.project
        )
    })?;
    tracing::debug!(root = %root.display(), project = %cfg.store.project, "store opened");
    Ok(Versioner::new(run))
}

/// Metadata from `--metadata` (inline JSON) or `--metadata-file`; empty when
/// neither is given. Files may carry a UTF-8 BOM.
pub fn load_metadata(inline: Option<String>, file: Option<PathBuf>) -> Result<Metadata> {
    if let Some(p) = file {
        return read_metadata_file(&p);
    }
    match inline {
        Some(raw) => serde_json::from_str(raw.trim())
            .context("--metadata must be a JSON object"),
        None => Ok(Metadata::new()),
    }
}

fn read_metadata_file(p: &Path) -> Result<Metadata> {
    let bytes =
        fs::read(p).with_context(|| format!("read metadata-file failed: {}", p.display()))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = std::str::from_utf8(bytes).context("metadata-file must be UTF-8 text")?;
    serde_json::from_str(raw.trim()).context("metadata-file must contain a JSON object")
}

pub fn join_aliases(aliases: &AliasSet) -> String {
    aliases.iter().cloned().collect::<Vec<_>>().join(",")
}
