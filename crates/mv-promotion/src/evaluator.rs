use std::collections::BTreeSet;

use mv_schemas::{Metadata, LATEST_ALIAS};
use serde_json::Value;

use crate::types::{
    MetricComparison, MetricSide, MissingMetricPolicy, PolicyError, PolicyInput,
    PromotionDecision, PromotionPlan,
};

// ============================================================================
// Public API
// ============================================================================

/// Read `key` from `metadata` as a number.
pub fn read_metric(metadata: &Metadata, key: &str, side: MetricSide) -> Result<f64, PolicyError> {
    let value = metadata.get(key).ok_or_else(|| PolicyError::MissingMetric {
        key: key.to_string(),
        side,
    })?;
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| non_numeric(key, side, value)),
        _ => Err(non_numeric(key, side, value)),
    }
}

/// Decide what happens to the candidate and the current alias holder.
///
/// The candidate wins when `comparison` holds for `(candidate, promoted)`,
/// candidate first: `Smaller` promotes a candidate with the lower metric.
/// No promoted model means the candidate is promoted unopposed.
pub fn evaluate_promotion(input: &PolicyInput<'_>) -> Result<PromotionPlan, PolicyError> {
    let mut submission_aliases: BTreeSet<String> = BTreeSet::new();
    submission_aliases.insert(LATEST_ALIAS.to_string());

    let Some(promoted) = input.promoted else {
        submission_aliases.insert(input.promotion_alias.to_string());
        return Ok(PromotionPlan {
            decision: PromotionDecision::PromotedNewNoPrior,
            submission_aliases,
            demote_promoted: false,
            metrics: None,
        });
    };

    // A malformed metric fails regardless of policy; only absence is negotiable.
    let candidate_metric = read_metric(input.candidate, input.metric_key, MetricSide::Candidate);
    let promoted_metric = read_metric(promoted, input.metric_key, MetricSide::Promoted);

    let (candidate_wins, metrics) = match (candidate_metric, promoted_metric) {
        (Ok(candidate), Ok(promoted)) => (
            input.comparison.holds(&candidate, &promoted),
            Some(MetricComparison {
                key: input.metric_key.to_string(),
                mode: input.comparison,
                promoted,
                candidate,
            }),
        ),
        (Err(e @ PolicyError::NonNumericMetric { .. }), _)
        | (_, Err(e @ PolicyError::NonNumericMetric { .. })) => return Err(e),
        (Err(e), _) | (_, Err(e)) => match input.on_missing_metric {
            MissingMetricPolicy::Abort => return Err(e),
            MissingMetricPolicy::PromoteCandidate => (true, None),
        },
    };

    if !candidate_wins {
        return Ok(PromotionPlan {
            decision: PromotionDecision::KeptExisting,
            submission_aliases,
            demote_promoted: false,
            metrics,
        });
    }

    submission_aliases.insert(input.promotion_alias.to_string());
    Ok(PromotionPlan {
        decision: PromotionDecision::PromotedNew,
        submission_aliases,
        demote_promoted: true,
        metrics,
    })
}

// ============================================================================
// Internal helpers
// ============================================================================

fn non_numeric(key: &str, side: MetricSide, value: &Value) -> PolicyError {
    PolicyError::NonNumericMetric {
        key: key.to_string(),
        side,
        value: value.to_string(),
    }
}
