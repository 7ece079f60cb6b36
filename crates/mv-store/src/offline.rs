//! File-backed run client.
//!
//! Layout under `<root>/<project>/`:
//!
//! ```text
//! artifacts/<name>/<vN>/manifest.json
//! artifacts/<name>/<vN>/files/<file>
//! runs/<run_id>/events.jsonl
//! ```
//!
//! An alias names at most one version per artifact name. If a crash leaves
//! two versions holding the same alias, resolution picks the newest.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use mv_artifacts::{read_manifest, validate_name, write_manifest, Artifact};
use mv_audit::{
    verify_event_log, RunEventLog, VerifyResult, EVENT_ALIASES_PERSISTED,
    EVENT_ARTIFACT_SUBMITTED,
};
use mv_schemas::{parse_version_tag, version_tag, AliasSet, ArtifactQuery, ArtifactRef};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{RunClient, StoreError};

pub struct OfflineRun {
    run_id: Uuid,
    project_dir: PathBuf,
    events: RunEventLog,
}

impl OfflineRun {
    /// Start a new run in `<root>/<project>`.
    pub fn init(root: impl AsRef<Path>, project: &str) -> Result<Self, StoreError> {
        Self::resume(root, project, Uuid::new_v4())
    }

    /// Attach to an existing run (or create its directory if missing).
    pub fn resume(root: impl AsRef<Path>, project: &str, run_id: Uuid) -> Result<Self, StoreError> {
        validate_name(project)?;
        let project_dir = root.as_ref().join(project);
        let artifacts_dir = project_dir.join("artifacts");
        fs::create_dir_all(&artifacts_dir).map_err(|source| StoreError::Io {
            path: artifacts_dir.clone(),
            source,
        })?;

        let events_path = project_dir
            .join("runs")
            .join(run_id.to_string())
            .join("events.jsonl");
        let events = RunEventLog::open(&events_path, true)
            .map_err(|e| StoreError::EventLog(format!("{e:#}")))?;

        debug!(%run_id, project_dir = %project_dir.display(), "offline run opened");
        Ok(Self {
            run_id,
            project_dir,
            events,
        })
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn events_path(&self) -> &Path {
        self.events.path()
    }

    pub fn verify_event_log(&self) -> Result<VerifyResult, StoreError> {
        verify_event_log(self.events.path()).map_err(|e| StoreError::EventLog(format!("{e:#}")))
    }

    /// All stored versions of `name`, oldest first.
    pub fn versions(&self, name: &str) -> Result<Vec<ArtifactRef>, StoreError> {
        validate_name(name)?;
        let dir = self.artifact_dir(name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut out: Vec<(u64, ArtifactRef)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Ok(index) = parse_version_tag(&file_name) else {
                continue;
            };
            if !entry.path().is_dir() {
                continue;
            }
            out.push((index, read_manifest(&entry.path())?));
        }

        out.sort_by_key(|(index, _)| *index);
        Ok(out.into_iter().map(|(_, r)| r).collect())
    }

    fn artifact_dir(&self, name: &str) -> PathBuf {
        self.project_dir.join("artifacts").join(name)
    }

    fn version_dir(&self, name: &str, version: &str) -> PathBuf {
        self.artifact_dir(name).join(version)
    }

    /// Remove `aliases` from every version of `name` except `owner`.
    fn claim_aliases(&self, name: &str, owner: &str, aliases: &AliasSet) -> Result<(), StoreError> {
        if aliases.is_empty() {
            return Ok(());
        }
        for mut other in self.versions(name)? {
            if other.version == owner {
                continue;
            }
            let before = other.aliases.len();
            other.aliases.retain(|a| !aliases.contains(a));
            if other.aliases.len() != before {
                debug!(artifact = %other.qualified_name(), "aliases moved away");
                write_manifest(&self.version_dir(name, &other.version), &other)?;
            }
        }
        Ok(())
    }

    fn log_event(&mut self, event_type: &str, artifact: &ArtifactRef) -> Result<(), StoreError> {
        let payload = json!({
            "artifact_id": artifact.id,
            "name": artifact.name,
            "version": artifact.version,
            "aliases": artifact.aliases,
        });
        self.events
            .append(self.run_id, event_type, payload)
            .map(|_| ())
            .map_err(|e| StoreError::EventLog(format!("{e:#}")))
    }
}

impl RunClient for OfflineRun {
    fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn submit_artifact(
        &mut self,
        artifact: &Artifact,
        aliases: &AliasSet,
    ) -> Result<ArtifactRef, StoreError> {
        artifact.validate()?;

        let existing = self.versions(&artifact.name)?;
        if let Some(prev) = existing.last() {
            if prev.artifact_type != artifact.artifact_type {
                return Err(StoreError::TypeMismatch {
                    query: prev.qualified_name(),
                    expected: artifact.artifact_type.clone(),
                    actual: prev.artifact_type.clone(),
                });
            }
        }
        let next = match existing.last() {
            Some(prev) => prev.version_index()? + 1,
            None => 0,
        };
        let version = version_tag(next);
        let dir = self.version_dir(&artifact.name, &version);

        let files_dir = dir.join("files");
        fs::create_dir_all(&files_dir).map_err(|source| StoreError::Io {
            path: files_dir.clone(),
            source,
        })?;
        for attached in artifact.files() {
            let dest = files_dir.join(&attached.file.name);
            fs::copy(&attached.source, &dest).map_err(|source| StoreError::Io {
                path: attached.source.clone(),
                source,
            })?;
        }

        let stored = ArtifactRef {
            id: Uuid::new_v4(),
            name: artifact.name.clone(),
            artifact_type: artifact.artifact_type.clone(),
            description: artifact.description.clone(),
            version,
            metadata: artifact.metadata.clone(),
            aliases: aliases.clone(),
            files: artifact.files().iter().map(|f| f.file.clone()).collect(),
            run_id: self.run_id,
            created_at_utc: Utc::now(),
        };
        write_manifest(&dir, &stored)?;
        self.claim_aliases(&stored.name, &stored.version, &stored.aliases)?;
        self.log_event(EVENT_ARTIFACT_SUBMITTED, &stored)?;

        info!(
            artifact = %stored.qualified_name(),
            aliases = ?stored.aliases,
            "artifact submitted"
        );
        Ok(stored)
    }

    fn resolve_artifact(
        &self,
        query: &ArtifactQuery,
        artifact_type: Option<&str>,
    ) -> Result<ArtifactRef, StoreError> {
        let versions = self.versions(&query.name)?;

        let found = if query.is_version_tag() {
            versions.into_iter().find(|v| v.version == query.alias)
        } else {
            versions.into_iter().rev().find(|v| v.has_alias(&query.alias))
        };
        let found = found.ok_or_else(|| StoreError::NotFound(query.to_string()))?;

        if let Some(expected) = artifact_type {
            if found.artifact_type != expected {
                return Err(StoreError::TypeMismatch {
                    query: query.to_string(),
                    expected: expected.to_string(),
                    actual: found.artifact_type,
                });
            }
        }

        debug!(query = %query, version = %found.version, "artifact resolved");
        Ok(found)
    }

    fn persist_alias_changes(&mut self, artifact: &ArtifactRef) -> Result<(), StoreError> {
        let dir = self.version_dir(&artifact.name, &artifact.version);
        if !dir.is_dir() {
            return Err(StoreError::UnknownVersion(artifact.qualified_name()));
        }
        let mut stored = read_manifest(&dir)?;
        if stored.id != artifact.id {
            return Err(StoreError::UnknownVersion(artifact.qualified_name()));
        }

        stored.aliases = artifact.aliases.clone();
        write_manifest(&dir, &stored)?;
        self.claim_aliases(&stored.name, &stored.version, &stored.aliases)?;
        self.log_event(EVENT_ALIASES_PERSISTED, &stored)?;

        info!(
            artifact = %stored.qualified_name(),
            aliases = ?stored.aliases,
            "aliases persisted"
        );
        Ok(())
    }
}
