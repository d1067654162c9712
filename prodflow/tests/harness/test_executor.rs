//! Step executor: persistence, validation, replay

use super::common::*;
use prodflow::errors::HarnessError;
use prodflow::run::Run;
use prodflow::schema;
use prodflow::task::{FactoryArgs, RunContext};
use serde_json::{json, Value};

#[tokio::test]
async fn test_step_writes_input_and_result_files() {
    let fixture = Fixture::new([response(72.0, Some("docs/collect.md"))]);
    let executor = fixture.executor();
    let mut run = Run::new("plain");

    let inputs = empty_inputs();
    let args = FactoryArgs::new(&inputs, &run.records);
    let descriptor = collect(&args, &mut RunContext::new(run.id)).unwrap();

    let result = executor.run_step(&descriptor, &mut run).await.unwrap();
    assert_eq!(result.value["score"], 72.0);
    assert_eq!(result.artifacts.len(), 1);

    // Exactly the two files of the naming convention.
    assert!(fixture.store.exists(&run.id, "tasks/01_collect/input.json").await);
    assert!(fixture.store.exists(&run.id, "tasks/01_collect/result.json").await);

    // The persisted input is the full resolved descriptor.
    let persisted: Value = fixture
        .store
        .read_json(&run.id, "tasks/01_collect/input.json")
        .await
        .unwrap();
    assert_eq!(persisted["step_id"], "01_collect");
    assert_eq!(persisted["agent"], "test-agent");
    assert!(persisted["output_schema"].is_object());
}

#[tokio::test]
async fn test_persisted_result_revalidates_after_reread() {
    let fixture = Fixture::new([response(55.0, None)]);
    let executor = fixture.executor();
    let mut run = Run::new("plain");

    let inputs = empty_inputs();
    let args = FactoryArgs::new(&inputs, &run.records);
    let descriptor = collect(&args, &mut RunContext::new(run.id)).unwrap();
    executor.run_step(&descriptor, &mut run).await.unwrap();

    // Round-trip: what was persisted still validates against the same schema.
    let reread: Value = fixture
        .store
        .read_json(&run.id, &descriptor.output_path)
        .await
        .unwrap();
    assert!(schema::validate(&reread, &descriptor.output_schema).is_ok());
    assert_eq!(reread, run.result("01_collect").unwrap().clone());
}

#[tokio::test]
async fn test_schema_violation_carries_every_violation() {
    // Violates two independent constraints: score out of range, summary wrong type.
    let bad = json!({"summary": 12, "score": 250}).to_string();
    let fixture = Fixture::new([bad]);
    let executor = fixture.executor();
    let mut run = Run::new("plain");

    let inputs = empty_inputs();
    let args = FactoryArgs::new(&inputs, &run.records);
    let descriptor = collect(&args, &mut RunContext::new(run.id)).unwrap();

    let err = executor.run_step(&descriptor, &mut run).await.unwrap_err();
    match err {
        HarnessError::SchemaViolation { step, violations } => {
            assert_eq!(step, "01_collect");
            assert_eq!(violations.len(), 2);
        }
        other => panic!("Expected SchemaViolation, got {:?}", other),
    }

    // The request was persisted for diagnosis; no result was accepted.
    assert!(fixture.store.exists(&run.id, "tasks/01_collect/input.json").await);
    assert!(!fixture.store.exists(&run.id, "tasks/01_collect/result.json").await);
    assert_eq!(run.step_count(), 0);
}

#[tokio::test]
async fn test_unparseable_response_fails_closed() {
    let fixture = Fixture::new(["this is not json"]);
    let executor = fixture.executor();
    let mut run = Run::new("plain");

    let inputs = empty_inputs();
    let args = FactoryArgs::new(&inputs, &run.records);
    let descriptor = collect(&args, &mut RunContext::new(run.id)).unwrap();

    let err = executor.run_step(&descriptor, &mut run).await.unwrap_err();
    match err {
        HarnessError::SchemaViolation { violations, .. } => {
            assert_eq!(violations.len(), 1);
            assert!(violations[0].message.contains("not valid JSON"));
        }
        other => panic!("Expected SchemaViolation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fenced_json_response_is_accepted() {
    let fenced = format!("Here you go:\n```json\n{}\n```", response(64.0, None));
    let fixture = Fixture::new([fenced]);
    let executor = fixture.executor();
    let mut run = Run::new("plain");

    let inputs = empty_inputs();
    let args = FactoryArgs::new(&inputs, &run.records);
    let descriptor = collect(&args, &mut RunContext::new(run.id)).unwrap();

    let result = executor.run_step(&descriptor, &mut run).await.unwrap();
    assert_eq!(result.value["score"], 64.0);
}

#[tokio::test]
async fn test_agent_failure_propagates_without_result() {
    // No scripted responses: the invocation itself fails.
    let fixture = Fixture::new(Vec::<String>::new());
    let executor = fixture.executor();
    let mut run = Run::new("plain");

    let inputs = empty_inputs();
    let args = FactoryArgs::new(&inputs, &run.records);
    let descriptor = collect(&args, &mut RunContext::new(run.id)).unwrap();

    let err = executor.run_step(&descriptor, &mut run).await.unwrap_err();
    assert!(matches!(err, HarnessError::AgentInvocation { .. }));
    assert_eq!(run.step_count(), 0);
}

#[tokio::test]
async fn test_replay_skips_the_agent() {
    let fixture = Fixture::new([response(81.0, Some("docs/collect.md"))]);
    let executor = fixture.executor();
    let mut run = Run::new("plain");

    let inputs = empty_inputs();
    let args = FactoryArgs::new(&inputs, &run.records);
    let descriptor = collect(&args, &mut RunContext::new(run.id)).unwrap();
    executor.run_step(&descriptor, &mut run).await.unwrap();
    assert_eq!(fixture.agent.invocation_count(), 1);

    // A re-entered run starts from a fresh record under the same id.
    let mut rerun = Run::with_id(run.id, "plain");
    let replayed = executor
        .try_replay(&descriptor, &mut rerun)
        .await
        .unwrap()
        .expect("persisted result should replay");

    assert_eq!(replayed.value["score"], 81.0);
    assert_eq!(rerun.step_count(), 1);
    assert_eq!(rerun.artifacts.len(), 1);
    // No second agent call.
    assert_eq!(fixture.agent.invocation_count(), 1);
}

#[tokio::test]
async fn test_replay_returns_none_without_persisted_result() {
    let fixture = Fixture::new(Vec::<String>::new());
    let executor = fixture.executor();
    let mut run = Run::new("plain");

    let inputs = empty_inputs();
    let args = FactoryArgs::new(&inputs, &run.records);
    let descriptor = collect(&args, &mut RunContext::new(run.id)).unwrap();

    let replayed = executor.try_replay(&descriptor, &mut run).await.unwrap();
    assert!(replayed.is_none());
    assert_eq!(fixture.agent.invocation_count(), 0);
}
