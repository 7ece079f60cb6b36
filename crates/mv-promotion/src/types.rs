use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mv_schemas::Metadata;
use serde::{Deserialize, Serialize};

use crate::compare::ComparisonMode;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{side} model metadata has no metric '{key}'")]
    MissingMetric { key: String, side: MetricSide },
    #[error("{side} model metric '{key}' is not a number: {value}")]
    NonNumericMetric {
        key: String,
        side: MetricSide,
        value: String,
    },
}

/// Which of the two compared models a metric was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSide {
    Candidate,
    Promoted,
}

impl fmt::Display for MetricSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricSide::Candidate => f.write_str("candidate"),
            MetricSide::Promoted => f.write_str("promoted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// What to do when either model lacks the comparison metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingMetricPolicy {
    /// Fail with [`PolicyError::MissingMetric`]; nothing is promoted.
    #[default]
    Abort,
    /// Treat the comparison as won by the candidate.
    PromoteCandidate,
}

impl MissingMetricPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingMetricPolicy::Abort => "abort",
            MissingMetricPolicy::PromoteCandidate => "promote_candidate",
        }
    }
}

impl std::str::FromStr for MissingMetricPolicy {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "abort" => Ok(MissingMetricPolicy::Abort),
            "promote_candidate" => Ok(MissingMetricPolicy::PromoteCandidate),
            other => Err(PolicyError::InvalidArgument(format!(
                "unknown missing-metric policy '{other}'. expected one of: abort | promote_candidate"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

pub struct PolicyInput<'a> {
    /// Metadata key holding the metric.
    pub metric_key: &'a str,
    /// Alias meaning "currently promoted", e.g. `production`.
    pub promotion_alias: &'a str,
    pub comparison: ComparisonMode,
    pub on_missing_metric: MissingMetricPolicy,
    pub candidate: &'a Metadata,
    /// Metadata of the version currently holding `promotion_alias`, if any.
    pub promoted: Option<&'a Metadata>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionDecision {
    /// Candidate beat the promoted model and takes over the alias.
    PromotedNew,
    /// Promoted model stays; candidate gets no promotion alias.
    KeptExisting,
    /// Nothing held the alias; candidate takes it unopposed.
    PromotedNewNoPrior,
}

impl PromotionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionDecision::PromotedNew => "promoted_new",
            PromotionDecision::KeptExisting => "kept_existing",
            PromotionDecision::PromotedNewNoPrior => "promoted_new_no_prior",
        }
    }

    pub fn promotes_candidate(&self) -> bool {
        !matches!(self, PromotionDecision::KeptExisting)
    }
}

impl fmt::Display for PromotionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub key: String,
    pub mode: ComparisonMode,
    pub promoted: f64,
    pub candidate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromotionPlan {
    pub decision: PromotionDecision,
    /// Aliases for the candidate if it is submitted now: always `latest`, plus
    /// the promotion alias when promoted.
    pub submission_aliases: BTreeSet<String>,
    /// The current holder must give up the promotion alias.
    pub demote_promoted: bool,
    /// `None` when there was nothing to compare against, or a metric was
    /// missing under [`MissingMetricPolicy::PromoteCandidate`].
    pub metrics: Option<MetricComparison>,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Record of one promotion attempt (serializable to JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionReport {
    pub artifact_name: String,
    pub artifact_type: String,
    pub promotion_alias: String,
    pub comparison: ComparisonMode,
    pub metric_key: String,
    pub decision: PromotionDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricComparison>,
    /// Aliases the candidate holds after the attempt.
    pub candidate_aliases: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    pub previous_demoted: bool,
    pub evaluated_at_utc: DateTime<Utc>,
}

/// Write the report as pretty-printed JSON to `out_dir/promotion_report.json`.
/// Returns the path written.
pub fn write_promotion_report_json(
    out_dir: &Path,
    report: &PromotionReport,
) -> io::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join("promotion_report.json");
    let json = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(path)
}
