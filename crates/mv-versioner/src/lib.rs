//! Model versioning on top of a run client.
//!
//! [`Versioner`] packages checkpoints as artifacts, decides whether a new
//! model takes over the promotion alias (via `mv-promotion`), and applies the
//! resulting alias moves through a [`RunClient`].
//!
//! Promotion order matters when the store is remote: the candidate gains the
//! alias before the previous holder loses it for deployed candidates, and a
//! pending candidate is submitted only after the previous holder is demoted.

mod request;

use mv_artifacts::ArtifactError;
use mv_promotion::{evaluate_promotion, PolicyError, PolicyInput, PromotionDecision};
use mv_schemas::{AliasSet, ArtifactQuery, ArtifactRef, VersionParseError, LATEST_ALIAS};
use mv_store::{RunClient, StoreError};
use tracing::{debug, info, warn};

pub use mv_artifacts::Artifact;
pub use request::{
    CreateArtifact, CreatedArtifact, NewModel, PromotionOutcome, PromotionRequest,
};

/// Returned by [`Versioner::get_latest_version`] when nothing is stored under
/// the name.
pub const NO_VERSION: i64 = -1;

#[derive(Debug, thiserror::Error)]
pub enum VersionerError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    MalformedVersion(#[from] VersionParseError),
}

pub struct Versioner<R> {
    run: R,
}

impl<R: RunClient> Versioner<R> {
    pub fn new(run: R) -> Self {
        Self { run }
    }

    pub fn run(&self) -> &R {
        &self.run
    }

    pub fn run_mut(&mut self) -> &mut R {
        &mut self.run
    }

    pub fn into_run(self) -> R {
        self.run
    }

    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Build a draft artifact, attaching the checkpoint if one is given.
    /// With `publish`, the draft is also submitted under its aliases plus
    /// `latest`.
    pub fn create_artifact(
        &mut self,
        args: CreateArtifact<'_>,
    ) -> Result<CreatedArtifact, VersionerError> {
        let mut artifact = Artifact::new(args.artifact_name, args.artifact_type)
            .with_description(args.description)
            .with_metadata(args.metadata.unwrap_or_default());
        artifact.validate()?;
        if let Some(checkpoint) = args.checkpoint {
            artifact.add_file(checkpoint)?;
        }

        if !args.publish {
            return Ok(CreatedArtifact {
                artifact,
                published: None,
            });
        }

        let mut aliases: AliasSet = args
            .aliases
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        aliases.insert(LATEST_ALIAS.to_string());

        let stored = self.run.submit_artifact(&artifact, &aliases)?;
        info!(
            artifact = %stored.qualified_name(),
            aliases = ?stored.aliases,
            "artifact published"
        );
        Ok(CreatedArtifact {
            artifact,
            published: Some(stored),
        })
    }

    // ------------------------------------------------------------------
    // Promote
    // ------------------------------------------------------------------

    /// Compare `new_model` against the version holding
    /// `request.promotion_alias` and move the alias if the new one wins.
    ///
    /// A pending model is always submitted (tagged `latest`, plus the
    /// promotion alias when it wins). A deployed model is never resubmitted.
    /// Nothing is written when the policy fails.
    pub fn promote_model(
        &mut self,
        new_model: NewModel,
        request: &PromotionRequest,
    ) -> Result<PromotionOutcome, VersionerError> {
        request.validate()?;
        request.check_candidate(&new_model)?;
        let new_model = match new_model {
            NewModel::Deployed(handle) => NewModel::Deployed(self.refresh_deployed(&handle)?),
            pending => pending,
        };
        let promoted = self.lookup_promoted(request);

        if let (NewModel::Deployed(candidate), Some(holder)) = (&new_model, &promoted) {
            if candidate.id == holder.id {
                info!(
                    artifact = %candidate.qualified_name(),
                    alias = %request.promotion_alias,
                    "candidate already holds the promotion alias"
                );
                return Ok(PromotionOutcome {
                    decision: PromotionDecision::KeptExisting,
                    candidate: holder.clone(),
                    previous: promoted,
                    previous_demoted: false,
                    submitted: false,
                    metrics: None,
                });
            }
        }

        let plan = evaluate_promotion(&PolicyInput {
            metric_key: &request.comparison_metric,
            promotion_alias: &request.promotion_alias,
            comparison: request.comparison,
            on_missing_metric: request.on_missing_metric,
            candidate: new_model.metadata(),
            promoted: promoted.as_ref().map(|p| &p.metadata),
        })?;

        match (&plan.decision, &plan.metrics) {
            (PromotionDecision::PromotedNewNoPrior, _) => info!(
                name = %request.artifact_name,
                alias = %request.promotion_alias,
                "no promoted model found, promoting new model"
            ),
            (decision, Some(m)) => info!(
                name = %request.artifact_name,
                metric = %m.key,
                promoted = m.promoted,
                candidate = m.candidate,
                comparison = %m.mode,
                decision = %decision,
                "compared new model against promoted model"
            ),
            (decision, None) => warn!(
                name = %request.artifact_name,
                metric = %request.comparison_metric,
                decision = %decision,
                "comparison metric missing, promoting new model"
            ),
        }

        let mut new_model = new_model;
        if let NewModel::Deployed(candidate) = &mut new_model {
            if plan.decision.promotes_candidate() {
                candidate.aliases.insert(request.promotion_alias.clone());
                self.run.persist_alias_changes(candidate)?;
            }
        }

        let mut previous = promoted;
        let mut previous_demoted = false;
        if plan.demote_promoted {
            if let Some(holder) = previous.as_mut() {
                holder.aliases.remove(&request.promotion_alias);
                self.run.persist_alias_changes(holder)?;
                previous_demoted = true;
                debug!(artifact = %holder.qualified_name(), "previous model demoted");
            }
        }

        let (candidate, submitted) = match new_model {
            NewModel::Pending(artifact) => {
                let stored = self
                    .run
                    .submit_artifact(&artifact, &plan.submission_aliases)?;
                (stored, true)
            }
            NewModel::Deployed(candidate) => (candidate, false),
        };

        info!(
            artifact = %candidate.qualified_name(),
            aliases = ?candidate.aliases,
            decision = %plan.decision,
            "promotion finished"
        );

        Ok(PromotionOutcome {
            decision: plan.decision,
            candidate,
            previous,
            previous_demoted,
            submitted,
            metrics: plan.metrics,
        })
    }

    /// Current store view of a deployed candidate. Alias changes are made
    /// against this, never against the caller's copy.
    fn refresh_deployed(&self, handle: &ArtifactRef) -> Result<ArtifactRef, VersionerError> {
        let query = ArtifactQuery::new(&handle.name, &handle.version);
        let current = self
            .run
            .resolve_artifact(&query, Some(&handle.artifact_type))?;
        if current.id != handle.id {
            return Err(StoreError::UnknownVersion(handle.qualified_name()).into());
        }
        Ok(current)
    }

    /// Version holding the promotion alias. Any lookup failure counts as
    /// "nothing promoted".
    fn lookup_promoted(&self, request: &PromotionRequest) -> Option<ArtifactRef> {
        let query = ArtifactQuery::new(&request.artifact_name, &request.promotion_alias);
        match self
            .run
            .resolve_artifact(&query, Some(&request.artifact_type))
        {
            Ok(found) => Some(found),
            Err(e) if e.is_not_found() => {
                debug!(query = %query, "no promoted model");
                None
            }
            Err(e) => {
                warn!(query = %query, error = %e, "promoted model lookup failed, treating as absent");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Versions
    // ------------------------------------------------------------------

    /// Index of the version tagged `latest`, or `None` when the lookup fails.
    pub fn latest_version(&self, artifact_name: &str) -> Result<Option<u64>, VersionerError> {
        let query = ArtifactQuery::latest(artifact_name);
        match self.run.resolve_artifact(&query, None) {
            Ok(found) => Ok(Some(found.version_index()?)),
            Err(e) => {
                debug!(query = %query, error = %e, "no latest version");
                Ok(None)
            }
        }
    }

    /// Like [`Self::latest_version`] with [`NO_VERSION`] for "none".
    pub fn get_latest_version(&self, artifact_name: &str) -> Result<i64, VersionerError> {
        match self.latest_version(artifact_name)? {
            Some(index) => i64::try_from(index).map_err(|_| {
                VersionerError::MalformedVersion(VersionParseError(format!("v{index}")))
            }),
            None => Ok(NO_VERSION),
        }
    }

    /// Index the next submission under `artifact_name` is expected to get.
    pub fn next_version(&self, artifact_name: &str) -> Result<u64, VersionerError> {
        Ok(self
            .latest_version(artifact_name)?
            .map_or(0, |index| index + 1))
    }
}
