//! Promotion policy: decide whether a candidate model replaces the one
//! currently holding a promotion alias, by comparing one metadata metric.
//!
//! Pure decision logic. Applying the decision to a store is the versioner's job.

mod compare;
mod evaluator;
mod types;

pub use compare::{compare, ComparisonMode};
pub use evaluator::{evaluate_promotion, read_metric};
pub use types::{
    write_promotion_report_json, MetricComparison, MetricSide, MissingMetricPolicy, PolicyError,
    PolicyInput, PromotionDecision, PromotionPlan, PromotionReport,
};
