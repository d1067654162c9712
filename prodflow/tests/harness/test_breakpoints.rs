//! Breakpoint suspension, resume, abort, and durable resolution

use super::common::*;
use prodflow::breakpoint::{channel_gate, ResumeSignal, StoreGate};
use prodflow::run::Run;
use prodflow::storage::TaskStore;
use prodflow_sdk::RunStatus;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_unresolved_breakpoint_keeps_run_paused() {
    let fixture = Fixture::new([
        response(60.0, Some("docs/collect.md")),
        response(70.0, None),
    ]);
    let (gate, operator) = channel_gate();
    let runner = fixture.runner_with_gate(Arc::new(gate));
    let store = fixture.store.clone();

    let run = Run::new("reviewed");
    let run_id = run.id;

    let handle = tokio::spawn(async move {
        runner.run(&breakpoint_plan(), empty_inputs(), run).await
    });

    // The breakpoint surfaces with the run context, then nothing resolves it.
    let pending = operator.next().await.unwrap();
    assert_eq!(pending.request.id, "bp_review");
    assert_eq!(pending.request.context.run_id, run_id);
    assert_eq!(pending.request.context.artifacts.len(), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished());

    // Durable state says paused; only the first step ever ran.
    let persisted = store.load_run(&run_id).await.unwrap();
    assert_eq!(persisted.status, RunStatus::Paused);
    assert_eq!(fixture.agent.invocation_count(), 1);

    // Resume: execution continues from the next step.
    pending.resolve(ResumeSignal::Resume { note: None });
    let outcome = handle.await.unwrap().unwrap();
    assert!(outcome.success);
    assert_eq!(fixture.agent.invocation_count(), 2);
    assert_eq!(outcome.results.len(), 2);
}

#[tokio::test]
async fn test_abort_at_breakpoint_fails_without_further_steps() {
    let fixture = Fixture::new([response(60.0, Some("docs/collect.md"))]);
    let (gate, operator) = channel_gate();
    let runner = fixture.runner_with_gate(Arc::new(gate));
    let store = fixture.store.clone();

    let run = Run::new("reviewed");
    let run_id = run.id;

    let handle = tokio::spawn(async move {
        runner.run(&breakpoint_plan(), empty_inputs(), run).await
    });

    let pending = operator.next().await.unwrap();
    pending.resolve(ResumeSignal::Abort {
        note: Some("collected data looks wrong".to_string()),
    });

    let outcome = handle.await.unwrap().unwrap();
    assert!(!outcome.success);
    assert!(outcome.reason.unwrap().contains("aborted at breakpoint"));
    // `assemble` never ran; the collected artifact is still returned.
    assert_eq!(fixture.agent.invocation_count(), 1);
    assert_eq!(outcome.artifacts.len(), 1);

    let persisted = store.load_run(&run_id).await.unwrap();
    assert_eq!(persisted.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_resume_note_is_recorded_as_concern() {
    let fixture = Fixture::new([response(60.0, None), response(70.0, None)]);
    let (gate, operator) = channel_gate();
    let runner = fixture.runner_with_gate(Arc::new(gate));

    let run = Run::new("reviewed");
    let handle = tokio::spawn(async move {
        runner.run(&breakpoint_plan(), empty_inputs(), run).await
    });

    let pending = operator.next().await.unwrap();
    pending.resolve(ResumeSignal::Resume {
        note: Some("watch the sample size".to_string()),
    });

    let outcome = handle.await.unwrap().unwrap();
    assert!(outcome.success);
    assert!(outcome
        .concerns
        .iter()
        .any(|c| c.contains("watch the sample size")));
}

#[tokio::test]
async fn test_store_gate_resumes_via_resolution_file() {
    // The durable path: a second process writes the resolution file, exactly
    // as `prodflow resolve` does.
    let fixture = Fixture::new([response(60.0, None), response(70.0, None)]);
    let store = fixture.store.clone();
    let gate = StoreGate::new(store.clone(), Duration::from_millis(10));
    let runner = fixture.runner_with_gate(Arc::new(gate));

    let run = Run::new("reviewed");
    let run_id = run.id;

    let handle = tokio::spawn(async move {
        runner.run(&breakpoint_plan(), empty_inputs(), run).await
    });

    // Wait for the request file to appear.
    let request_rel = TaskStore::breakpoint_request_rel("bp_review");
    for _ in 0..100 {
        if store.exists(&run_id, &request_rel).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(store.exists(&run_id, &request_rel).await);
    assert!(!handle.is_finished());

    store
        .write_json(
            &run_id,
            &TaskStore::breakpoint_resolution_rel("bp_review"),
            &ResumeSignal::Resume { note: None },
        )
        .await
        .unwrap();

    let outcome = handle.await.unwrap().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.results.len(), 2);
}

#[tokio::test]
async fn test_advisory_gate_failure_raises_breakpoint() {
    use prodflow::runner::{PlanEntry, QualityGate, WorkflowPlan};

    let plan = WorkflowPlan {
        id: "advisory",
        name: "Advisory",
        description: "Advisory gate on the first step",
        entries: vec![
            PlanEntry::gated(
                "collect",
                "Collect",
                collect,
                vec![QualityGate::advisory(
                    "score_floor",
                    "score",
                    40.0,
                    "Collected score below floor",
                )],
            ),
            PlanEntry::step("assemble", "Assemble", assemble),
        ],
    };

    // Score 20 trips the advisory gate; the human lets it continue.
    let fixture = Fixture::new([response(20.0, None), response(90.0, None)]);
    let (gate, operator) = channel_gate();
    let runner = fixture.runner_with_gate(Arc::new(gate));

    let run = Run::new("advisory");
    let handle = tokio::spawn(async move { runner.run(&plan, empty_inputs(), run).await });

    let pending = operator.next().await.unwrap();
    assert_eq!(pending.request.id, "bp_gate_score_floor");
    assert!(pending.request.question.contains("continue anyway"));
    pending.resolve(ResumeSignal::Resume { note: None });

    let outcome = handle.await.unwrap().unwrap();
    assert!(outcome.success);
    assert_eq!(fixture.agent.invocation_count(), 2);
    // The gate failure stays on the record even though the run succeeded.
    assert!(outcome.concerns.iter().any(|c| c.contains("below threshold")));
}
