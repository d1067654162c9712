//! Workflow runner: gates, short-circuiting, append-only accumulation

use super::common::*;
use prodflow::errors::HarnessError;
use prodflow::run::Run;
use prodflow_sdk::RunStatus;
use serde_json::json;

#[tokio::test]
async fn test_successful_run_accumulates_everything_in_order() {
    let fixture = Fixture::new([
        response(70.0, Some("docs/collect.md")),
        response(80.0, Some("docs/refine.md")),
        response(90.0, Some("docs/assemble.md")),
    ]);
    let runner = fixture.runner();
    let run = Run::new("plain");
    let run_id = run.id;

    let outcome = runner
        .run(&success_plan(), empty_inputs(), run)
        .await
        .unwrap();

    assert!(outcome.success);
    assert!(outcome.reason.is_none());
    assert_eq!(outcome.metadata.process_id, "plain");
    assert_eq!(outcome.metadata.run_id, run_id);

    let step_ids: Vec<&str> = outcome.results.iter().map(|r| r.step_id.as_str()).collect();
    assert_eq!(step_ids, vec!["01_collect", "02_refine", "03_assemble"]);

    // Artifact list is the union of each step's declarations, in step order.
    let paths: Vec<&str> = outcome.artifacts.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["docs/collect.md", "docs/refine.md", "docs/assemble.md"]
    );

    let persisted = fixture.store.load_run(&run_id).await.unwrap();
    assert_eq!(persisted.status, RunStatus::Succeeded);
}

#[tokio::test]
async fn test_fatal_gate_short_circuits_with_partial_results() {
    // Steps 1-2 pass, step 3 scores below the gate, steps 4-5 must not run.
    let fixture = Fixture::new([
        response(90.0, Some("docs/collect.md")),
        response(85.0, Some("docs/refine.md")),
        response(12.0, Some("docs/polish.md")),
        response(99.0, None),
        response(99.0, None),
    ]);
    let runner = fixture.runner();
    let run = Run::new("five");
    let run_id = run.id;

    let outcome = runner
        .run(&five_step_plan(), empty_inputs(), run)
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.reason.unwrap().contains("Quality gate failed"));

    // Exactly three agent invocations: the runner never reached steps 4-5.
    assert_eq!(fixture.agent.invocation_count(), 3);

    // Partial results survive: all three completed steps and their artifacts.
    assert_eq!(outcome.results.len(), 3);
    let paths: Vec<&str> = outcome.artifacts.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["docs/collect.md", "docs/refine.md", "docs/polish.md"]
    );

    let persisted = fixture.store.load_run(&run_id).await.unwrap();
    assert_eq!(persisted.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_canonical_gate_scenario() {
    // {collect(score 35), gate(threshold 40, fatal), assemble} with inputs {x: 1}
    let fixture = Fixture::new([response(35.0, Some("docs/collect.md"))]);
    let runner = fixture.runner();
    let run = Run::new("gated");

    let mut inputs = empty_inputs();
    inputs.insert("x".to_string(), json!(1));

    let outcome = runner.run(&gated_plan(), inputs, run).await.unwrap();

    assert!(!outcome.success);
    assert!(outcome.reason.unwrap().contains("Quality gate failed"));
    // `assemble` was never invoked.
    assert_eq!(fixture.agent.invocation_count(), 1);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.artifacts[0].path, "docs/collect.md");
    assert!(outcome.concerns.iter().any(|c| c.contains("35")));
}

#[tokio::test]
async fn test_agent_failure_folds_into_failed_outcome() {
    // First step succeeds, second invocation has no scripted response.
    let fixture = Fixture::new([response(75.0, Some("docs/collect.md"))]);
    let runner = fixture.runner();
    let run = Run::new("plain");

    let outcome = runner
        .run(&success_plan(), empty_inputs(), run)
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.reason.unwrap().contains("invocation failed"));
    // The first step's artifact is retained.
    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.results.len(), 1);
}

#[tokio::test]
async fn test_schema_violation_reports_concerns() {
    let fixture = Fixture::new([json!({"summary": 1, "score": "high"}).to_string()]);
    let runner = fixture.runner();
    let run = Run::new("plain");

    let outcome = runner
        .run(&success_plan(), empty_inputs(), run)
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.reason.unwrap().contains("violated its output schema"));
    // Both violations surface as concerns.
    assert_eq!(outcome.concerns.len(), 2);
}

#[tokio::test]
async fn test_factory_error_propagates_as_invalid_argument() {
    // `refine` requires the result of `collect`; a plan starting with it is
    // a caller error, not a failed run.
    let fixture = Fixture::new([response(50.0, None)]);
    let runner = fixture.runner();
    let run = Run::new("broken");

    let plan = prodflow::runner::WorkflowPlan {
        id: "broken",
        name: "Broken",
        description: "Starts with a step that needs a prior result",
        entries: vec![prodflow::runner::PlanEntry::step("refine", "Refine", refine)],
    };

    let err = runner.run(&plan, empty_inputs(), run).await.unwrap_err();
    assert!(matches!(err, HarnessError::InvalidArgument { .. }));
}
