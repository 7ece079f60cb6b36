//! Artifact drafts: a named, typed, described bundle of files plus metadata
//! that has not been submitted to a run yet.
//!
//! A draft is turned into a stored [`ArtifactRef`] by a run client. This crate
//! also owns the on-disk `manifest.json` format for stored versions.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use mv_schemas::{ArtifactFile, ArtifactRef, Metadata};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact name '{0}' is invalid (must be non-empty, no ':', '/' or '\\')")]
    InvalidName(String),
    #[error("artifact type must not be empty")]
    EmptyType,
    #[error("'{}' is not a regular file", .0.display())]
    NotAFile(PathBuf),
    #[error("file '{name}' is already attached to artifact")]
    DuplicateFile { name: String },
    #[error("read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A file attached to a draft, with the local path it will be copied from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedFile {
    pub file: ArtifactFile,
    pub source: PathBuf,
}

/// Unsubmitted artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub artifact_type: String,
    pub description: String,
    pub metadata: Metadata,
    files: Vec<AttachedFile>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, artifact_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artifact_type: artifact_type.into(),
            description: String::new(),
            metadata: Metadata::new(),
            files: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach a local file. The digest is taken now; the store copies the
    /// bytes at submission time.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<&ArtifactFile, ArtifactError> {
        let path = path.as_ref();
        let file = digest_file(path)?;
        if self.files.iter().any(|f| f.file.name == file.name) {
            return Err(ArtifactError::DuplicateFile { name: file.name });
        }
        self.files.push(AttachedFile {
            file,
            source: path.to_path_buf(),
        });
        let last = self.files.len() - 1;
        Ok(&self.files[last].file)
    }

    pub fn files(&self) -> &[AttachedFile] {
        &self.files
    }

    /// Name and type checks a store applies before accepting the draft.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        validate_name(&self.name)?;
        if self.artifact_type.trim().is_empty() {
            return Err(ArtifactError::EmptyType);
        }
        Ok(())
    }
}

pub fn validate_name(name: &str) -> Result<(), ArtifactError> {
    let bad = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains([':', '/', '\\']);
    if bad {
        return Err(ArtifactError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Size + SHA-256 of a regular file.
pub fn digest_file(path: &Path) -> Result<ArtifactFile, ArtifactError> {
    let meta = fs::metadata(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if !meta.is_file() {
        return Err(ArtifactError::NotAFile(path.to_path_buf()));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ArtifactError::NotAFile(path.to_path_buf()))?;

    let read_err = |source: io::Error| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut f = fs::File::open(path).map_err(read_err)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size_bytes = 0u64;
    loop {
        let n = f.read(&mut buf).map_err(read_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size_bytes += n as u64;
    }

    Ok(ArtifactFile {
        name,
        size_bytes,
        sha256: hex::encode(hasher.finalize()),
    })
}

/// Write `<dir>/manifest.json` (pretty, trailing newline). Overwrites.
pub fn write_manifest(dir: &Path, artifact: &ArtifactRef) -> Result<PathBuf, ArtifactError> {
    fs::create_dir_all(dir).map_err(|source| ArtifactError::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(artifact).map_err(|source| ArtifactError::Manifest {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, format!("{json}\n")).map_err(|source| ArtifactError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

pub fn read_manifest(dir: &Path) -> Result<ArtifactRef, ArtifactError> {
    let path = dir.join(MANIFEST_FILE);
    let raw = fs::read_to_string(&path).map_err(|source| ArtifactError::Read {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ArtifactError::Manifest { path, source })
}
