//! Built-in workflow catalog: metadata, factories, and a full PRD run

use super::common::Fixture;
use prodflow::run::Run;
use prodflow::runner::PlanEntry;
use prodflow::task::{FactoryArgs, RunContext};
use prodflow::workflows;
use serde_json::json;
use std::collections::BTreeMap;

fn minimal_raw_inputs(id: &str) -> BTreeMap<String, String> {
    let pairs: &[(&str, &str)] = match id {
        "prd" => &[("product", "Atlas"), ("problem", "Week-one churn is 40%")],
        "roadmap" => &[("quarter", "2026-Q4"), ("product", "Atlas")],
        "retention" => &[("product", "Atlas")],
        "story-map" => &[("product", "Atlas"), ("journey", "first purchase")],
        "pmf" => &[("product", "Atlas")],
        "governance" => &[("organization", "Acme"), ("scope", "data products")],
        other => panic!("no sample inputs for '{}'", other),
    };
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_every_workflow_builds_its_first_descriptor() {
    for plan in workflows::catalog() {
        let raw = minimal_raw_inputs(plan.id);
        let inputs = workflows::validate_inputs(plan.id, &raw)
            .unwrap_or_else(|e| panic!("inputs for '{}' rejected: {}", plan.id, e));

        let PlanEntry::Step(first) = &plan.entries[0] else {
            panic!("workflow '{}' does not start with a step", plan.id);
        };

        let args = FactoryArgs::new(&inputs, &[]);
        let mut ctx = RunContext::new(uuid::Uuid::new_v4());
        let descriptor = (first.factory)(&args, &mut ctx)
            .unwrap_or_else(|e| panic!("first factory of '{}' failed: {}", plan.id, e));

        assert!(descriptor.step_id.starts_with("01_"));
        assert!(descriptor.input_path.starts_with("tasks/"));
        assert!(!descriptor.prompt.task.is_empty());
    }
}

#[test]
fn test_every_workflow_ends_with_an_assembly_step() {
    for plan in workflows::catalog() {
        let Some(PlanEntry::Step(last)) = plan.entries.last() else {
            panic!("workflow '{}' does not end with a step", plan.id);
        };
        assert!(
            last.name.ends_with("assembly"),
            "workflow '{}' ends with '{}'",
            plan.id,
            last.name
        );
    }
}

#[tokio::test]
async fn test_prd_workflow_end_to_end() {
    let responses = vec![
        // 01 problem_analysis
        json!({
            "summary": "Users churn because onboarding never shows value",
            "problem_statement": "New users abandon Atlas before reaching the first insight",
            "assumptions": ["activation drives retention"],
            "scores": {"clarity": 82, "evidence": 65},
            "artifacts": [{"path": "docs/problem-analysis.md", "format": "markdown"}]
        })
        .to_string(),
        // 02 user_personas
        json!({
            "summary": "Two personas dominate the churned cohort",
            "personas": [
                {"name": "Data Dana", "role": "analyst", "goals": ["fast answers"], "pains": ["setup friction"]}
            ]
        })
        .to_string(),
        // 03 user_stories
        json!({
            "summary": "Five stories cover activation",
            "stories": [
                {"title": "Guided import", "story": "As Dana, I want a guided import, so that setup is fast", "persona": "Data Dana", "priority": "must"},
                {"title": "Sample dashboard", "story": "As Dana, I want a sample dashboard, so that value is visible", "persona": "Data Dana", "priority": "must"},
                {"title": "Email digest", "story": "As Dana, I want a weekly digest, so that I return", "persona": "Data Dana", "priority": "should"}
            ],
            "artifacts": [{"path": "docs/user-stories.md", "format": "markdown"}]
        })
        .to_string(),
        // 04 acceptance_criteria
        json!({
            "summary": "Criteria for both must stories",
            "criteria": [
                {"story": "Guided import", "given": "a fresh workspace", "when": "the user uploads a CSV", "then": "a chart renders within a minute"}
            ]
        })
        .to_string(),
        // 05 prioritization (after the auto-approved story review)
        json!({
            "summary": "Must set covers the activation gap",
            "ranked": [
                {"title": "Guided import", "priority": "must", "rationale": "removes the setup wall"},
                {"title": "Sample dashboard", "priority": "must", "rationale": "shows value instantly"},
                {"title": "Email digest", "priority": "should", "rationale": "retention lever"}
            ],
            "scores": {"coverage": 85}
        })
        .to_string(),
        // 06 prd_assembly
        json!({
            "summary": "PRD assembled",
            "sections": [
                {"heading": "Overview", "content": "..."},
                {"heading": "Problem", "content": "..."},
                {"heading": "Personas", "content": "..."},
                {"heading": "Requirements", "content": "..."},
                {"heading": "Success Metrics", "content": "..."}
            ],
            "artifacts": [{"path": "docs/prd.md", "format": "markdown", "label": "PRD"}]
        })
        .to_string(),
    ];

    let fixture = Fixture::new(responses);
    let runner = fixture.runner();
    let plan = workflows::find("prd").unwrap();

    let raw = minimal_raw_inputs("prd");
    let inputs = workflows::validate_inputs("prd", &raw).unwrap();
    let run = Run::new("prd");

    let outcome = runner.run(&plan, inputs, run).await.unwrap();

    assert!(outcome.success, "reason: {:?}", outcome.reason);
    assert_eq!(outcome.results.len(), 6);
    assert_eq!(fixture.agent.invocation_count(), 6);

    // Artifacts accumulate across steps, in step order.
    let paths: Vec<&str> = outcome.artifacts.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["docs/problem-analysis.md", "docs/user-stories.md", "docs/prd.md"]
    );

    // Each step got the agent identity its plan declares.
    let agents = fixture.agent.invoked_agents();
    assert_eq!(agents[0], "pm-analyst");
    assert_eq!(agents[5], "pm-writer");
}

#[tokio::test]
async fn test_prd_clarity_gate_stops_vague_problems() {
    let responses = vec![json!({
        "summary": "Too vague to analyze",
        "problem_statement": "Make the product better",
        "scores": {"clarity": 15, "evidence": 10},
        "artifacts": [{"path": "docs/problem-analysis.md", "format": "markdown"}]
    })
    .to_string()];

    let fixture = Fixture::new(responses);
    let runner = fixture.runner();
    let plan = workflows::find("prd").unwrap();

    let raw = minimal_raw_inputs("prd");
    let inputs = workflows::validate_inputs("prd", &raw).unwrap();
    let run = Run::new("prd");

    let outcome = runner.run(&plan, inputs, run).await.unwrap();

    assert!(!outcome.success);
    assert!(outcome.reason.unwrap().contains("too vague"));
    assert_eq!(fixture.agent.invocation_count(), 1);
    // The analysis artifact survives the failure.
    assert_eq!(outcome.artifacts.len(), 1);
}
