//! Append-only run event log (JSON Lines, one event per line).
//!
//! Each event optionally carries `hash_prev` + `hash_self` so the log can be
//! checked for tampering with [`verify_event_log`].

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const EVENT_ARTIFACT_SUBMITTED: &str = "ARTIFACT_SUBMITTED";
pub const EVENT_ALIASES_PERSISTED: &str = "ALIASES_PERSISTED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub event_id: Uuid,
    pub run_id: Uuid,
    /// Position in the log, starting at 0.
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub event_type: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

pub struct RunEventLog {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    seq: u64,
}

impl RunEventLog {
    /// Open (or create) the log at `path`. An existing log is resumed: the
    /// sequence counter and last hash are restored from its final line.
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }

        let mut log = Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
        };

        if log.path.exists() {
            let content = fs::read_to_string(&log.path)
                .with_context(|| format!("read event log {:?}", log.path))?;
            if let Some(last) = content.lines().rev().find(|l| !l.trim().is_empty()) {
                let ev: RunEvent =
                    serde_json::from_str(last.trim()).context("parse last event on resume")?;
                log.seq = ev.seq + 1;
                log.last_hash = ev.hash_self;
            }
        }

        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of events in the log.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    pub fn append(&mut self, run_id: Uuid, event_type: &str, payload: Value) -> Result<RunEvent> {
        let mut ev = RunEvent {
            event_id: Uuid::new_v4(),
            run_id,
            seq: self.seq,
            ts_utc: Utc::now(),
            event_type: event_type.to_string(),
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            ev.hash_prev = self.last_hash.clone();
            let self_hash = compute_event_hash(&ev)?;
            ev.hash_self = Some(self_hash);
        }

        let line = canonical_json_line(&ev)?;
        append_line(&self.path, &line)?;

        self.seq += 1;
        if self.hash_chain {
            self.last_hash = ev.hash_self.clone();
        }
        Ok(ev)
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open event log {:?}", path))?;
    f.write_all(line.as_bytes())
        .context("write event line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

/// Compact JSON with keys sorted recursively.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize run event failed")?;
    serde_json::to_string(&sort_keys(&raw)).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Hash of the canonical event with `hash_self` cleared.
pub fn compute_event_hash(ev: &RunEvent) -> Result<String> {
    let mut clone = ev.clone();
    clone.hash_self = None;

    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    /// 1-based line of the first bad event.
    Broken { line: usize, reason: String },
}

pub fn verify_event_log(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read event log {:?}", path.as_ref()))?;
    verify_event_log_str(&content)
}

pub fn verify_event_log_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut line_count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let ev: RunEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("parse run event at line {}", i + 1))?;
        line_count += 1;

        if ev.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, ev.hash_prev
                ),
            });
        }

        if let Some(ref claimed) = ev.hash_self {
            let recomputed = compute_event_hash(&ev)?;
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                });
            }
        }

        prev_hash = ev.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: line_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chained_log_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("events.jsonl");
        let run_id = Uuid::new_v4();

        let mut log = RunEventLog::open(&path, true).unwrap();
        for i in 0..3 {
            log.append(run_id, EVENT_ARTIFACT_SUBMITTED, json!({ "version": format!("v{i}") }))
                .unwrap();
        }
        assert_eq!(log.seq(), 3);
        assert_eq!(
            verify_event_log(&path).unwrap(),
            VerifyResult::Valid { lines: 3 }
        );
    }

    #[test]
    fn reopened_log_continues_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let run_id = Uuid::new_v4();

        let first_hash = {
            let mut log = RunEventLog::open(&path, true).unwrap();
            log.append(run_id, EVENT_ARTIFACT_SUBMITTED, json!({})).unwrap();
            log.last_hash().map(str::to_string)
        };

        let mut log = RunEventLog::open(&path, true).unwrap();
        assert_eq!(log.seq(), 1);
        assert_eq!(log.last_hash().map(str::to_string), first_hash);

        let ev = log.append(run_id, EVENT_ALIASES_PERSISTED, json!({})).unwrap();
        assert_eq!(ev.seq, 1);
        assert_eq!(ev.hash_prev, first_hash);
        assert_eq!(
            verify_event_log(&path).unwrap(),
            VerifyResult::Valid { lines: 2 }
        );
    }

    #[test]
    fn tampered_payload_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let run_id = Uuid::new_v4();

        let mut log = RunEventLog::open(&path, true).unwrap();
        log.append(run_id, EVENT_ARTIFACT_SUBMITTED, json!({ "aliases": ["latest"] }))
            .unwrap();
        log.append(run_id, EVENT_ALIASES_PERSISTED, json!({ "aliases": ["latest"] }))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let tampered = content.replacen("\"latest\"", "\"production\"", 1);
        match verify_event_log_str(&tampered).unwrap() {
            VerifyResult::Broken { line, reason } => {
                assert_eq!(line, 1);
                assert!(reason.contains("hash_self"), "{reason}");
            }
            other => panic!("expected broken chain, got {other:?}"),
        }
    }

    #[test]
    fn unchained_log_has_no_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let mut log = RunEventLog::open(&path, false).unwrap();
        let ev = log.append(Uuid::new_v4(), EVENT_ARTIFACT_SUBMITTED, json!({})).unwrap();
        assert!(ev.hash_prev.is_none());
        assert!(ev.hash_self.is_none());
        assert_eq!(
            verify_event_log(&path).unwrap(),
            VerifyResult::Valid { lines: 1 }
        );
    }
}
