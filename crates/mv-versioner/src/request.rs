use std::path::Path;

use chrono::Utc;
use mv_artifacts::Artifact;
use mv_promotion::{
    ComparisonMode, MetricComparison, MissingMetricPolicy, PolicyError, PromotionDecision,
    PromotionReport,
};
use mv_schemas::{parse_version_tag, AliasSet, ArtifactRef, Metadata, LATEST_ALIAS};

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Arguments for [`crate::Versioner::create_artifact`].
#[derive(Debug, Clone, Default)]
pub struct CreateArtifact<'a> {
    /// File to attach, usually a model checkpoint.
    pub checkpoint: Option<&'a Path>,
    pub artifact_name: &'a str,
    pub artifact_type: &'a str,
    pub description: &'a str,
    /// Extra aliases when publishing. `latest` is always added.
    pub aliases: Vec<String>,
    pub metadata: Option<Metadata>,
    /// Submit to the run right away.
    pub publish: bool,
}

#[derive(Debug, Clone)]
pub struct CreatedArtifact {
    pub artifact: Artifact,
    /// Stored version when `publish` was set.
    pub published: Option<ArtifactRef>,
}

// ---------------------------------------------------------------------------
// Promote
// ---------------------------------------------------------------------------

/// The model being considered for promotion.
#[derive(Debug, Clone)]
pub enum NewModel {
    /// Not in the store yet; it is submitted as part of promotion.
    Pending(Artifact),
    /// Already stored; promotion only changes aliases.
    Deployed(ArtifactRef),
}

impl NewModel {
    pub fn metadata(&self) -> &Metadata {
        match self {
            NewModel::Pending(a) => &a.metadata,
            NewModel::Deployed(r) => &r.metadata,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NewModel::Pending(a) => &a.name,
            NewModel::Deployed(r) => &r.name,
        }
    }

    pub fn artifact_type(&self) -> &str {
        match self {
            NewModel::Pending(a) => &a.artifact_type,
            NewModel::Deployed(r) => &r.artifact_type,
        }
    }

    pub fn is_deployed(&self) -> bool {
        matches!(self, NewModel::Deployed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromotionRequest {
    pub artifact_name: String,
    pub artifact_type: String,
    /// Metadata key compared between the two models.
    pub comparison_metric: String,
    /// Alias denoting "currently promoted", e.g. `production`.
    pub promotion_alias: String,
    pub comparison: ComparisonMode,
    pub on_missing_metric: MissingMetricPolicy,
}

impl PromotionRequest {
    pub fn new(
        artifact_name: impl Into<String>,
        artifact_type: impl Into<String>,
        comparison_metric: impl Into<String>,
        promotion_alias: impl Into<String>,
    ) -> Self {
        Self {
            artifact_name: artifact_name.into(),
            artifact_type: artifact_type.into(),
            comparison_metric: comparison_metric.into(),
            promotion_alias: promotion_alias.into(),
            comparison: ComparisonMode::default(),
            on_missing_metric: MissingMetricPolicy::default(),
        }
    }

    pub fn with_comparison(mut self, comparison: ComparisonMode) -> Self {
        self.comparison = comparison;
        self
    }

    /// Same as [`Self::with_comparison`] but from a mode name; unknown names
    /// fail with `InvalidArgument`.
    pub fn with_comparison_name(self, name: &str) -> Result<Self, PolicyError> {
        Ok(self.with_comparison(name.parse()?))
    }

    pub fn with_missing_metric_policy(mut self, policy: MissingMetricPolicy) -> Self {
        self.on_missing_metric = policy;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), PolicyError> {
        let alias = self.promotion_alias.trim();
        if alias.is_empty() || alias == LATEST_ALIAS || parse_version_tag(alias).is_ok() {
            return Err(PolicyError::InvalidArgument(format!(
                "promotion alias '{}' is reserved or empty",
                self.promotion_alias
            )));
        }
        if self.comparison_metric.trim().is_empty() {
            return Err(PolicyError::InvalidArgument(
                "comparison metric must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The candidate must belong to the artifact family being promoted.
    pub(crate) fn check_candidate(&self, model: &NewModel) -> Result<(), PolicyError> {
        if model.name() != self.artifact_name {
            return Err(PolicyError::InvalidArgument(format!(
                "candidate '{}' does not match artifact name '{}'",
                model.name(),
                self.artifact_name
            )));
        }
        if model.artifact_type() != self.artifact_type {
            return Err(PolicyError::InvalidArgument(format!(
                "candidate type '{}' does not match artifact type '{}'",
                model.artifact_type(),
                self.artifact_type
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromotionOutcome {
    pub decision: PromotionDecision,
    /// Candidate as it stands in the store afterwards.
    pub candidate: ArtifactRef,
    /// Version that held the promotion alias before this call, after any demotion.
    pub previous: Option<ArtifactRef>,
    pub previous_demoted: bool,
    /// The candidate was submitted by this call.
    pub submitted: bool,
    pub metrics: Option<MetricComparison>,
}

impl PromotionOutcome {
    /// Alias set applied to the candidate.
    pub fn new_aliases(&self) -> &AliasSet {
        &self.candidate.aliases
    }

    pub fn report(&self, request: &PromotionRequest) -> PromotionReport {
        PromotionReport {
            artifact_name: request.artifact_name.clone(),
            artifact_type: request.artifact_type.clone(),
            promotion_alias: request.promotion_alias.clone(),
            comparison: request.comparison,
            metric_key: request.comparison_metric.clone(),
            decision: self.decision,
            metrics: self.metrics.clone(),
            candidate_aliases: self.candidate.aliases.clone(),
            candidate_version: Some(self.candidate.version.clone()),
            previous_version: self.previous.as_ref().map(|p| p.version.clone()),
            previous_demoted: self.previous_demoted,
            evaluated_at_utc: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_and_builders() {
        let req = PromotionRequest::new("resnet", "model", "val_metric", "production");
        assert_eq!(req.comparison, ComparisonMode::Smaller);
        assert_eq!(req.on_missing_metric, MissingMetricPolicy::Abort);

        let req = req.with_comparison_name("greater_or_equal").unwrap();
        assert_eq!(req.comparison, ComparisonMode::GreaterOrEqual);

        let err = req.clone().with_comparison_name("bigger").unwrap_err();
        assert!(matches!(err, PolicyError::InvalidArgument(_)));
    }

    #[test]
    fn reserved_promotion_aliases_rejected() {
        for alias in ["", "latest", "v3"] {
            let req = PromotionRequest::new("resnet", "model", "val_metric", alias);
            assert!(
                matches!(req.validate(), Err(PolicyError::InvalidArgument(_))),
                "{alias:?}"
            );
        }
        let req = PromotionRequest::new("resnet", "model", " ", "production");
        assert!(req.validate().is_err());
        assert!(PromotionRequest::new("resnet", "model", "val_metric", "staging")
            .validate()
            .is_ok());
    }

    #[test]
    fn candidate_must_match_request_family() {
        let req = PromotionRequest::new("resnet", "model", "val_metric", "production");
        assert!(req
            .check_candidate(&NewModel::Pending(Artifact::new("resnet", "model")))
            .is_ok());

        let typo = NewModel::Pending(Artifact::new("resnet-typo", "model"));
        assert!(matches!(
            req.check_candidate(&typo),
            Err(PolicyError::InvalidArgument(_))
        ));

        let dataset = NewModel::Pending(Artifact::new("resnet", "dataset"));
        assert!(matches!(
            req.check_candidate(&dataset),
            Err(PolicyError::InvalidArgument(_))
        ));
    }
}
