//! PRD creation workflow
//!
//! Seven phases from raw problem statement to assembled PRD: analyze the
//! problem, sketch personas, draft user stories with acceptance criteria,
//! pause for a human story review, prioritize with MoSCoW, then assemble the
//! document. A fatal clarity gate after the first step stops runs whose
//! problem statement is too vague to be worth further agent calls.

use super::{artifacts_schema, sections_schema};
use crate::errors::HarnessResult;
use crate::runner::{PlanEntry, QualityGate, WorkflowPlan};
use crate::schema::Schema;
use crate::task::{FactoryArgs, PromptPayload, RunContext, TaskDescriptor};
use prodflow_sdk::WorkflowDefinition;
use serde_json::json;

/// PRD workflow invocation surface
#[derive(Debug, Clone, WorkflowDefinition)]
#[workflow(
    id = "prd",
    name = "PRD Creation",
    description = "Problem analysis → personas → user stories → acceptance criteria → story review → MoSCoW prioritization → PRD assembly"
)]
pub struct Inputs {
    #[field(label = "Product Name", description = "Product or feature the PRD covers")]
    pub product: String,

    #[field(label = "Problem Statement", description = "The customer problem to solve, in one or two sentences")]
    pub problem: String,

    #[field(label = "Target Audience", description = "Primary audience or market segment")]
    pub audience: Option<String>,

    #[field(label = "Timeline", description = "Target release window, if known")]
    pub timeline: Option<String>,
}

pub fn plan() -> WorkflowPlan {
    WorkflowPlan {
        id: "prd",
        name: "PRD Creation",
        description: "Create a product requirements document from a problem statement",
        entries: vec![
            PlanEntry::gated(
                "problem_analysis",
                "Problem Analysis",
                problem_analysis,
                vec![
                    QualityGate::fatal(
                        "problem_clarity",
                        "scores.clarity",
                        40.0,
                        "Problem statement too vague to proceed",
                    ),
                    QualityGate::advisory(
                        "evidence",
                        "scores.evidence",
                        50.0,
                        "Problem evidence is thin",
                    ),
                ],
            ),
            PlanEntry::step("user_personas", "User Personas", user_personas),
            PlanEntry::step("user_stories", "User Stories", user_stories),
            PlanEntry::step(
                "acceptance_criteria",
                "Acceptance Criteria",
                acceptance_criteria,
            ),
            PlanEntry::breakpoint(
                "story_review",
                "Story Review",
                "Do the user stories and acceptance criteria cover the launch scope?",
                vec!["user_stories", "acceptance_criteria"],
            ),
            PlanEntry::gated(
                "prioritization",
                "MoSCoW Prioritization",
                prioritization,
                vec![QualityGate::advisory(
                    "coverage",
                    "scores.coverage",
                    60.0,
                    "Prioritization leaves stories uncovered",
                )],
            ),
            PlanEntry::step("prd_assembly", "PRD Assembly", prd_assembly),
        ],
    }
}

fn problem_analysis(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let product = args.require_str("product")?;
    let problem = args.require_str("problem")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            ("problem_statement", Schema::string()),
            ("assumptions", Schema::array(Schema::string())),
            (
                "scores",
                Schema::object(
                    [
                        ("clarity", Schema::number_range(0.0, 100.0)),
                        ("evidence", Schema::number_range(0.0, 100.0)),
                    ],
                    &["clarity", "evidence"],
                ),
            ),
            ("artifacts", artifacts_schema()),
        ],
        &["summary", "problem_statement", "scores"],
    );

    let prompt = PromptPayload::new(
        "a senior product manager",
        format!("Analyze the problem behind '{}' and restate it precisely.", product),
    )
    .with_context(json!({
        "product": product,
        "problem": problem,
        "audience": args.str_or("audience", "not specified"),
    }))
    .with_instructions(&[
        "Restate the problem from the customer's point of view",
        "List the assumptions that must hold for this problem to matter",
        "Score clarity and evidence strength from 0 to 100",
        "Write the analysis to docs/problem-analysis.md and declare it as an artifact",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("problem_analysis"),
        "Problem Analysis",
        "pm-analyst",
        prompt,
        schema,
    )
    .with_labels(&["prd", "analysis"]))
}

fn user_personas(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let analysis = args.require_result("problem_analysis")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "personas",
                Schema::array_min(
                    Schema::object(
                        [
                            ("name", Schema::string()),
                            ("role", Schema::string()),
                            ("goals", Schema::array_min(Schema::string(), 1)),
                            ("pains", Schema::array_min(Schema::string(), 1)),
                        ],
                        &["name", "role", "goals", "pains"],
                    ),
                    1,
                ),
            ),
            ("artifacts", artifacts_schema()),
        ],
        &["summary", "personas"],
    );

    let prompt = PromptPayload::new(
        "a user researcher",
        "Derive the personas most affected by the analyzed problem.",
    )
    .with_context(json!({
        "problem_statement": analysis.get("problem_statement"),
        "audience": args.str_or("audience", "not specified"),
    }))
    .with_instructions(&[
        "Keep personas grounded in the problem statement, not generic archetypes",
        "Name each persona's top goals and pains",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("user_personas"),
        "User Personas",
        "ux-researcher",
        prompt,
        schema,
    )
    .with_labels(&["prd", "research"]))
}

fn user_stories(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let personas = args.require_result("user_personas")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "stories",
                Schema::array_min(
                    Schema::object(
                        [
                            ("title", Schema::string()),
                            ("story", Schema::string()),
                            ("persona", Schema::string()),
                            (
                                "priority",
                                Schema::enumeration(&["must", "should", "could", "wont"]),
                            ),
                        ],
                        &["title", "story", "persona", "priority"],
                    ),
                    3,
                ),
            ),
            ("artifacts", artifacts_schema()),
        ],
        &["summary", "stories"],
    );

    let prompt = PromptPayload::new(
        "a senior product manager",
        "Write user stories covering the personas' top goals.",
    )
    .with_context(json!({ "personas": personas.get("personas") }))
    .with_instructions(&[
        "Use the 'As a ..., I want ..., so that ...' form in the story field",
        "Tag each story with an initial MoSCoW priority",
        "Write the stories to docs/user-stories.md and declare it as an artifact",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("user_stories"),
        "User Stories",
        "pm-writer",
        prompt,
        schema,
    )
    .with_labels(&["prd", "stories"]))
}

fn acceptance_criteria(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let stories = args.require_result("user_stories")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "criteria",
                Schema::array_min(
                    Schema::object(
                        [
                            ("story", Schema::string()),
                            ("given", Schema::string()),
                            ("when", Schema::string()),
                            ("then", Schema::string()),
                        ],
                        &["story", "given", "when", "then"],
                    ),
                    1,
                ),
            ),
            ("artifacts", artifacts_schema()),
        ],
        &["summary", "criteria"],
    );

    let prompt = PromptPayload::new(
        "a senior product manager",
        "Define given/when/then acceptance criteria for each must-have story.",
    )
    .with_context(json!({ "stories": stories.get("stories") }))
    .with_instructions(&[
        "Cover every 'must' story with at least one criterion",
        "Keep each criterion independently testable",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("acceptance_criteria"),
        "Acceptance Criteria",
        "pm-writer",
        prompt,
        schema,
    )
    .with_labels(&["prd", "stories"]))
}

fn prioritization(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let stories = args.require_result("user_stories")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "ranked",
                Schema::array_min(
                    Schema::object(
                        [
                            ("title", Schema::string()),
                            (
                                "priority",
                                Schema::enumeration(&["must", "should", "could", "wont"]),
                            ),
                            ("rationale", Schema::string()),
                        ],
                        &["title", "priority", "rationale"],
                    ),
                    3,
                ),
            ),
            (
                "scores",
                Schema::object([("coverage", Schema::number_range(0.0, 100.0))], &["coverage"]),
            ),
        ],
        &["summary", "ranked", "scores"],
    );

    let prompt = PromptPayload::new(
        "a product strategist",
        "Finalize the MoSCoW prioritization after the story review.",
    )
    .with_context(json!({
        "stories": stories.get("stories"),
        "timeline": args.str_or("timeline", "not specified"),
    }))
    .with_instructions(&[
        "Re-rank with the review feedback in mind",
        "Score how much of the launch scope the 'must' set covers, 0 to 100",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("prioritization"),
        "MoSCoW Prioritization",
        "pm-strategist",
        prompt,
        schema,
    )
    .with_labels(&["prd", "prioritization"]))
}

fn prd_assembly(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let product = args.require_str("product")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            ("sections", sections_schema(5)),
            ("artifacts", Schema::array_min(
                Schema::object(
                    [("path", Schema::string()), ("format", Schema::string()), ("label", Schema::string())],
                    &["path", "format"],
                ),
                1,
            )),
        ],
        &["summary", "sections", "artifacts"],
    );

    let prompt = PromptPayload::new(
        "a senior product manager",
        format!("Assemble the full PRD for '{}'.", product),
    )
    .with_context(json!({
        "problem_analysis": args.result_of("problem_analysis"),
        "personas": args.result_of("user_personas"),
        "stories": args.result_of("user_stories"),
        "acceptance_criteria": args.result_of("acceptance_criteria"),
        "prioritization": args.result_of("prioritization"),
    }))
    .with_instructions(&[
        "Include at minimum: overview, problem, personas, requirements, success metrics",
        "Write the document to docs/prd.md and declare it as an artifact",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("prd_assembly"),
        "PRD Assembly",
        "pm-writer",
        prompt,
        schema,
    )
    .with_labels(&["prd", "assembly"]))
}
