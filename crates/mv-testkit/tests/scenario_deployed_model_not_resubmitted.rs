//! Scenario: a model already in the store is promoted by alias changes alone.
//!
//! # Invariants under test
//!
//! 1. Deployed + wins: zero submissions, one persistence for the candidate
//!    (gains the alias) followed by one for the previous holder (loses it).
//! 2. Deployed + nothing promoted: one persistence, no submission.
//! 3. Deployed + loses: no calls at all.
//! 4. Deployed candidate that already holds the alias: no calls.
//! 5. A stale handle to the candidate does not pull back aliases it has
//!    since lost; `latest` stays on the newest submission.
//!
//! GREEN when: call logs match exactly.

use mv_promotion::{ComparisonMode, PromotionDecision};
use mv_schemas::AliasSet;
use mv_testkit::{aliases, metric_metadata, RecordingRun, RunCall};
use mv_versioner::{NewModel, PromotionRequest, Versioner};

fn request() -> PromotionRequest {
    PromotionRequest::new("clf", "model", "accuracy", "staging")
        .with_comparison(ComparisonMode::Greater)
}

#[test]
fn deployed_winner_only_persists_aliases() {
    let mut run = RecordingRun::new();
    let prior = run.seed(
        "clf",
        "model",
        metric_metadata("accuracy", 0.81),
        aliases(&["staging"]),
    );
    let challenger = run.seed(
        "clf",
        "model",
        metric_metadata("accuracy", 0.86),
        aliases(&["latest"]),
    );
    let mut v = Versioner::new(run);

    let out = v
        .promote_model(NewModel::Deployed(challenger.clone()), &request())
        .unwrap();

    assert_eq!(out.decision, PromotionDecision::PromotedNew);
    assert!(!out.submitted);
    assert!(out.previous_demoted);
    assert_eq!(out.new_aliases(), &aliases(&["latest", "staging"]));

    let run = v.run();
    assert_eq!(run.submit_count(), 0);
    assert_eq!(
        run.calls(),
        &[
            RunCall::Persist {
                name: "clf".into(),
                version: challenger.version.clone(),
                aliases: aliases(&["latest", "staging"]),
            },
            RunCall::Persist {
                name: "clf".into(),
                version: prior.version.clone(),
                aliases: AliasSet::new(),
            },
        ]
    );
    assert_eq!(run.holder("clf", "staging").unwrap().id, challenger.id);
}

#[test]
fn deployed_without_prior_persists_once() {
    let mut run = RecordingRun::new();
    let only = run.seed(
        "clf",
        "model",
        metric_metadata("accuracy", 0.7),
        aliases(&["latest"]),
    );
    let mut v = Versioner::new(run);

    let out = v
        .promote_model(NewModel::Deployed(only.clone()), &request())
        .unwrap();

    assert_eq!(out.decision, PromotionDecision::PromotedNewNoPrior);
    assert_eq!(v.run().submit_count(), 0);
    assert_eq!(v.run().persist_count(), 1);
    assert_eq!(v.run().holder("clf", "staging").unwrap().id, only.id);
}

#[test]
fn deployed_loser_changes_nothing() {
    let mut run = RecordingRun::new();
    let prior = run.seed(
        "clf",
        "model",
        metric_metadata("accuracy", 0.9),
        aliases(&["staging"]),
    );
    let challenger = run.seed(
        "clf",
        "model",
        metric_metadata("accuracy", 0.85),
        aliases(&["latest"]),
    );
    let mut v = Versioner::new(run);

    let out = v
        .promote_model(NewModel::Deployed(challenger), &request())
        .unwrap();

    assert_eq!(out.decision, PromotionDecision::KeptExisting);
    assert!(v.run().calls().is_empty());
    assert_eq!(v.run().holder("clf", "staging").unwrap().id, prior.id);
}

#[test]
fn deployed_holder_is_left_alone() {
    let mut run = RecordingRun::new();
    let holder = run.seed(
        "clf",
        "model",
        metric_metadata("accuracy", 0.9),
        aliases(&["latest", "staging"]),
    );
    let mut v = Versioner::new(run);

    let out = v
        .promote_model(
            NewModel::Deployed(holder.clone()),
            &request().with_comparison(ComparisonMode::GreaterOrEqual),
        )
        .unwrap();

    assert_eq!(out.decision, PromotionDecision::KeptExisting);
    assert!(v.run().calls().is_empty());
    assert_eq!(v.run().holder("clf", "staging").unwrap().id, holder.id);
}

#[test]
fn stale_deployed_handle_leaves_latest_alone() {
    let mut run = RecordingRun::new();
    let prior = run.seed(
        "clf",
        "model",
        metric_metadata("accuracy", 0.8),
        aliases(&["staging"]),
    );
    let stale = run.seed(
        "clf",
        "model",
        metric_metadata("accuracy", 0.9),
        aliases(&["latest"]),
    );
    let newest = run.seed(
        "clf",
        "model",
        metric_metadata("accuracy", 0.7),
        aliases(&["latest"]),
    );
    assert!(stale.has_alias("latest"));
    let mut v = Versioner::new(run);

    let out = v
        .promote_model(NewModel::Deployed(stale.clone()), &request())
        .unwrap();

    assert_eq!(out.decision, PromotionDecision::PromotedNew);
    assert_eq!(out.new_aliases(), &aliases(&["staging"]));
    assert_eq!(
        v.run().calls(),
        &[
            RunCall::Persist {
                name: "clf".into(),
                version: stale.version.clone(),
                aliases: aliases(&["staging"]),
            },
            RunCall::Persist {
                name: "clf".into(),
                version: prior.version.clone(),
                aliases: AliasSet::new(),
            },
        ]
    );
    assert_eq!(v.run().holder("clf", "latest").unwrap().id, newest.id);
    assert_eq!(v.get_latest_version("clf").unwrap(), 2);
    assert_eq!(v.next_version("clf").unwrap(), 3);
}
