//! Unused-key guard.
//!
//! A leaf is "consumed" when its JSON pointer equals, or sits under, one of
//! [`CONSUMED_POINTERS`]. Anything else is most likely a typo
//! (`promotion.comparision`) that would otherwise fall back to a default
//! silently.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every key `VersionerConfig` reads. Keep in sync with `settings.rs`.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/store/root",
    "/store/project",
    "/store/root_env",
    "/promotion/artifact_type",
    "/promotion/comparison_metric",
    "/promotion/promotion_alias",
    "/promotion/comparison",
    "/promotion/on_missing_metric",
    "/report/out_dir",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Sorted leaf pointers no consumer reads.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// With `Fail`, unused keys are an error; with `Warn` the report is returned
/// for the caller to log.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !CONSUMED_POINTERS.iter().any(|p| is_prefix_pointer(p, leaf)))
        // `{}` at the root is a leaf too, but carries nothing.
        .filter(|leaf| leaf != "/")
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s) detected: {:?}",
            report.unused_leaf_pointers.len(),
            report.unused_leaf_pointers
        );
    }
    Ok(report)
}

/// "/a/b" covers "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    match leaf.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub(crate) fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, vv) in map {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_pointers(vv, &format!("{prefix}/{i}"), out);
            }
        }
        _ => {
            let p = if prefix.is_empty() { "/" } else { prefix };
            out.push(p.to_string());
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}
