//! Suspension and resume semantics of `RunHandle`.

mod test_support;

use anyhow::Result;
use std::sync::atomic::Ordering;

use formloop_engine::{RunOutcome, RunState};
use formloop_utils::error::RunError;
use test_support::{Harness, ScriptedOracle};

#[tokio::test]
async fn test_resume_before_first_observation_is_invalid() -> Result<()> {
    let harness = Harness::name_scenario(ScriptedOracle::default());
    let engine = harness.engine();
    let mut run = engine.start(&harness.source, &harness.form)?;

    assert_eq!(run.state(), RunState::Created);
    let err = run.resume("done").await.unwrap_err();
    assert!(matches!(err, RunError::InvalidResume { state } if state == "created"));
    Ok(())
}

#[tokio::test]
async fn test_resume_after_completion_is_invalid() -> Result<()> {
    let harness = Harness::name_scenario(ScriptedOracle::default());
    let engine = harness.engine();
    let mut run = engine.start(&harness.source, &harness.form)?;

    run.next_suspension_or_result().await;
    let done = run.resume("Looks Good").await?;
    assert!(matches!(done, RunOutcome::Completed { .. }));
    assert_eq!(run.state(), RunState::Terminated);

    let err = run.resume("one more change").await.unwrap_err();
    assert!(matches!(err, RunError::InvalidResume { .. }));

    // Observing again returns the same terminal result.
    assert_eq!(run.next_suspension_or_result().await, done);
    Ok(())
}

#[tokio::test]
async fn test_blank_resume_re_exposes_suspension() -> Result<()> {
    let harness = Harness::name_scenario(ScriptedOracle::new(&["REVISE"]));
    let engine = harness.engine();
    let mut run = engine.start(&harness.source, &harness.form)?;

    let first = run.next_suspension_or_result().await;
    let again = run.resume("   \n").await?;
    assert_eq!(first, again);
    assert_eq!(run.state(), RunState::Suspended);
    assert_eq!(run.round(), 1);
    assert_eq!(harness.oracle.calls.load(Ordering::SeqCst), 0);

    // Observing a suspended handle does no work either.
    assert_eq!(run.next_suspension_or_result().await, first);
    assert_eq!(harness.answerer.asked_count("Last Name"), 1);
    Ok(())
}

#[tokio::test]
async fn test_acceptance_goes_to_oracle_when_bypass_disabled() -> Result<()> {
    let harness = Harness::name_scenario(ScriptedOracle::new(&["REVISE", "ACCEPT"]));
    let mut options = harness.options();
    options.acceptance_bypass = false;
    let engine = harness.engine_with(options);
    let mut run = engine.start(&harness.source, &harness.form)?;

    run.next_suspension_or_result().await;
    let outcome = run.resume("done").await?;
    assert!(matches!(outcome, RunOutcome::Suspended { .. }));
    let outcome = run.resume("done").await?;
    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert_eq!(harness.oracle.calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_unknown_oracle_token_revises() -> Result<()> {
    let harness = Harness::name_scenario(ScriptedOracle::new(&["MAYBE"]));
    let engine = harness.engine();
    let mut run = engine.start(&harness.source, &harness.form)?;

    run.next_suspension_or_result().await;
    let outcome = run.resume("change the last name").await?;
    assert!(matches!(outcome, RunOutcome::Suspended { .. }));
    assert_eq!(run.round(), 2);
    Ok(())
}

#[tokio::test]
async fn test_custom_prompt_is_exposed() -> Result<()> {
    let harness = Harness::name_scenario(ScriptedOracle::default());
    let mut options = harness.options();
    options.prompt = "Anything to change?".to_string();
    let engine = harness.engine_with(options);
    let mut run = engine.start(&harness.source, &harness.form)?;

    match run.next_suspension_or_result().await {
        RunOutcome::Suspended { prompt, .. } => assert_eq!(prompt, "Anything to change?"),
        other => panic!("unexpected outcome {other:?}"),
    }
    Ok(())
}

/// The re-exposed draft is the answer store rendered in form order.
#[tokio::test]
async fn test_suspension_draft_matches_answers() -> Result<()> {
    let harness = Harness::name_scenario(ScriptedOracle::new(&["REVISE"]));
    let engine = harness.engine();
    let mut run = engine.start(&harness.source, &harness.form)?;
    run.next_suspension_or_result().await;

    let answers = run.answers();
    let expected: Vec<String> = run
        .fields()
        .iter()
        .map(|field| format!("{field}: {}", answers[field]))
        .collect();
    match run.resume("").await? {
        RunOutcome::Suspended { draft, .. } => {
            assert_eq!(draft, expected.join("\n"));
            assert_eq!(draft, "First Name: Ana\nLast Name: Lee");
        }
        other => panic!("expected suspension, got {other:?}"),
    }
    Ok(())
}
