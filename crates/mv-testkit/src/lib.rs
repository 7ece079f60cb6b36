use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mv_schemas::{AliasSet, Metadata};
use mv_store::OfflineRun;
use serde_json::Value;
use tempfile::TempDir;

mod recording;

pub use recording::{RecordingRun, RunCall};

/// Metadata with a single metric entry.
pub fn metric_metadata(key: &str, value: impl Into<Value>) -> Metadata {
    let mut m = Metadata::new();
    m.insert(key.to_string(), value.into());
    m
}

pub fn aliases(items: &[&str]) -> AliasSet {
    items.iter().map(|s| s.to_string()).collect()
}

/// Write a fake checkpoint file under `dir`.
pub fn write_checkpoint(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.join(file_name);
    fs::write(&path, bytes).with_context(|| format!("write checkpoint: {}", path.display()))?;
    Ok(path)
}

/// Fresh file-backed run in a temp dir. Keep the `TempDir` alive for the
/// duration of the test.
pub fn offline_run(project: &str) -> Result<(TempDir, OfflineRun)> {
    let dir = tempfile::tempdir().context("create temp store root")?;
    let run = OfflineRun::init(dir.path(), project).context("init offline run")?;
    Ok((dir, run))
}
