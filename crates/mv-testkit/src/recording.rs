use std::cell::Cell;
use std::collections::BTreeMap;

use chrono::Utc;
use mv_artifacts::Artifact;
use mv_schemas::{version_tag, AliasSet, ArtifactQuery, ArtifactRef, Metadata};
use mv_store::{RunClient, StoreError};
use uuid::Uuid;

/// A mutating call seen by [`RecordingRun`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunCall {
    Submit {
        name: String,
        version: String,
        aliases: AliasSet,
    },
    Persist {
        name: String,
        version: String,
        aliases: AliasSet,
    },
}

/// In-memory run client used ONLY for tests.
///
/// Alias semantics match the offline store: an alias lives on at most one
/// version per name. Every submit and persist is recorded; seeding is not.
#[derive(Debug, Default)]
pub struct RecordingRun {
    run_id: Uuid,
    versions: BTreeMap<String, Vec<ArtifactRef>>,
    calls: Vec<RunCall>,
    lookups: Cell<usize>,
    fail_lookups: bool,
}

impl RecordingRun {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            ..Self::default()
        }
    }

    /// Every lookup fails with a non-NotFound error (simulates a broken backend).
    pub fn with_failing_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    /// Store a version without recording a call.
    pub fn seed(
        &mut self,
        name: &str,
        artifact_type: &str,
        metadata: Metadata,
        aliases: AliasSet,
    ) -> ArtifactRef {
        let stored = self.store(name, artifact_type, metadata, aliases);
        self.claim(&stored);
        stored
    }

    /// Store a prebuilt ref exactly as given, version tag included.
    pub fn insert_raw(&mut self, artifact: ArtifactRef) {
        self.versions
            .entry(artifact.name.clone())
            .or_default()
            .push(artifact);
    }

    pub fn calls(&self) -> &[RunCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn submit_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, RunCall::Submit { .. }))
            .count()
    }

    pub fn persist_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, RunCall::Persist { .. }))
            .count()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.get()
    }

    pub fn versions(&self, name: &str) -> &[ArtifactRef] {
        self.versions.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Current holder of `alias` under `name`.
    pub fn holder(&self, name: &str, alias: &str) -> Option<&ArtifactRef> {
        self.versions(name).iter().find(|v| v.has_alias(alias))
    }

    fn store(
        &mut self,
        name: &str,
        artifact_type: &str,
        metadata: Metadata,
        aliases: AliasSet,
    ) -> ArtifactRef {
        let list = self.versions.entry(name.to_string()).or_default();
        let stored = ArtifactRef {
            id: Uuid::new_v4(),
            name: name.to_string(),
            artifact_type: artifact_type.to_string(),
            description: String::new(),
            version: version_tag(list.len() as u64),
            metadata,
            aliases,
            files: Vec::new(),
            run_id: self.run_id,
            created_at_utc: Utc::now(),
        };
        list.push(stored.clone());
        stored
    }

    fn claim(&mut self, owner: &ArtifactRef) {
        if let Some(list) = self.versions.get_mut(&owner.name) {
            for other in list.iter_mut().filter(|v| v.id != owner.id) {
                other.aliases.retain(|a| !owner.aliases.contains(a));
            }
        }
    }
}

impl RunClient for RecordingRun {
    fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn submit_artifact(
        &mut self,
        artifact: &Artifact,
        aliases: &AliasSet,
    ) -> Result<ArtifactRef, StoreError> {
        artifact.validate()?;
        if let Some(prev) = self.versions(&artifact.name).last() {
            if prev.artifact_type != artifact.artifact_type {
                return Err(StoreError::TypeMismatch {
                    query: prev.qualified_name(),
                    expected: artifact.artifact_type.clone(),
                    actual: prev.artifact_type.clone(),
                });
            }
        }

        let mut stored = self.store(
            &artifact.name,
            &artifact.artifact_type,
            artifact.metadata.clone(),
            aliases.clone(),
        );
        stored.description = artifact.description.clone();
        stored.files = artifact.files().iter().map(|f| f.file.clone()).collect();
        if let Some(slot) = self
            .versions
            .get_mut(&artifact.name)
            .and_then(|list| list.last_mut())
        {
            *slot = stored.clone();
        }
        self.claim(&stored);

        self.calls.push(RunCall::Submit {
            name: stored.name.clone(),
            version: stored.version.clone(),
            aliases: stored.aliases.clone(),
        });
        Ok(stored)
    }

    fn resolve_artifact(
        &self,
        query: &ArtifactQuery,
        artifact_type: Option<&str>,
    ) -> Result<ArtifactRef, StoreError> {
        self.lookups.set(self.lookups.get() + 1);
        if self.fail_lookups {
            return Err(StoreError::EventLog(format!(
                "lookup of '{query}' failed: backend unavailable"
            )));
        }

        let versions = self.versions(&query.name);
        let found = if query.is_version_tag() {
            versions.iter().find(|v| v.version == query.alias)
        } else {
            versions.iter().rev().find(|v| v.has_alias(&query.alias))
        };
        let found = found
            .cloned()
            .ok_or_else(|| StoreError::NotFound(query.to_string()))?;

        if let Some(expected) = artifact_type {
            if found.artifact_type != expected {
                return Err(StoreError::TypeMismatch {
                    query: query.to_string(),
                    expected: expected.to_string(),
                    actual: found.artifact_type,
                });
            }
        }
        Ok(found)
    }

    fn persist_alias_changes(&mut self, artifact: &ArtifactRef) -> Result<(), StoreError> {
        let slot = self
            .versions
            .get_mut(&artifact.name)
            .and_then(|list| list.iter_mut().find(|v| v.id == artifact.id))
            .ok_or_else(|| StoreError::UnknownVersion(artifact.qualified_name()))?;
        slot.aliases = artifact.aliases.clone();
        let owner = slot.clone();
        self.claim(&owner);

        self.calls.push(RunCall::Persist {
            name: owner.name.clone(),
            version: owner.version.clone(),
            aliases: owner.aliases.clone(),
        });
        Ok(())
    }
}
