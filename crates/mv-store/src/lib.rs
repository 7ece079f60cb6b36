//! Run client boundary.
//!
//! Everything durable (submitting artifacts, looking them up by alias,
//! persisting alias changes) goes through [`RunClient`]. The versioner never
//! touches storage directly.
//!
//! [`OfflineRun`] is the file-backed implementation used by the CLI and by
//! tests that want real alias-moving semantics.

mod offline;

use std::io;
use std::path::PathBuf;

use mv_artifacts::{Artifact, ArtifactError};
use mv_schemas::{AliasSet, ArtifactQuery, ArtifactRef, VersionParseError};
use uuid::Uuid;

pub use offline::OfflineRun;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("artifact '{0}' not found")]
    NotFound(String),
    #[error("artifact '{query}' has type '{actual}', expected '{expected}'")]
    TypeMismatch {
        query: String,
        expected: String,
        actual: String,
    },
    #[error("artifact '{0}' is not stored in this run's project")]
    UnknownVersion(String),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    MalformedVersion(#[from] VersionParseError),
    #[error("io {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("run event log: {0}")]
    EventLog(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// A handle on a running experiment that can store artifacts.
///
/// Calls are blocking; each is one round-trip to the backing store.
pub trait RunClient {
    fn run_id(&self) -> Uuid;

    /// Store `artifact` as the next version of its name, tagged with `aliases`.
    /// Aliases already held by other versions of the same name move to the new one.
    fn submit_artifact(
        &mut self,
        artifact: &Artifact,
        aliases: &AliasSet,
    ) -> Result<ArtifactRef, StoreError>;

    /// Look up `name:alias` (or `name:vN`). `artifact_type`, when given, must
    /// match the stored type.
    fn resolve_artifact(
        &self,
        query: &ArtifactQuery,
        artifact_type: Option<&str>,
    ) -> Result<ArtifactRef, StoreError>;

    /// Make the store's alias set for `artifact`'s version equal to
    /// `artifact.aliases`.
    fn persist_alias_changes(&mut self, artifact: &ArtifactRef) -> Result<(), StoreError>;
}

impl<R: RunClient + ?Sized> RunClient for &mut R {
    fn run_id(&self) -> Uuid {
        (**self).run_id()
    }

    fn submit_artifact(
        &mut self,
        artifact: &Artifact,
        aliases: &AliasSet,
    ) -> Result<ArtifactRef, StoreError> {
        (**self).submit_artifact(artifact, aliases)
    }

    fn resolve_artifact(
        &self,
        query: &ArtifactQuery,
        artifact_type: Option<&str>,
    ) -> Result<ArtifactRef, StoreError> {
        (**self).resolve_artifact(query, artifact_type)
    }

    fn persist_alias_changes(&mut self, artifact: &ArtifactRef) -> Result<(), StoreError> {
        (**self).persist_alias_changes(artifact)
    }
}

impl<R: RunClient + ?Sized> RunClient for Box<R> {
    fn run_id(&self) -> Uuid {
        (**self).run_id()
    }

    fn submit_artifact(
        &mut self,
        artifact: &Artifact,
        aliases: &AliasSet,
    ) -> Result<ArtifactRef, StoreError> {
        (**self).submit_artifact(artifact, aliases)
    }

    fn resolve_artifact(
        &self,
        query: &ArtifactQuery,
        artifact_type: Option<&str>,
    ) -> Result<ArtifactRef, StoreError> {
        (**self).resolve_artifact(query, artifact_type)
    }

    fn persist_alias_changes(&mut self, artifact: &ArtifactRef) -> Result<(), StoreError> {
        (**self).persist_alias_changes(artifact)
    }
}
