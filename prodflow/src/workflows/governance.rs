//! Product governance charter workflow

use super::sections_schema;
use crate::errors::HarnessResult;
use crate::runner::{PlanEntry, QualityGate, WorkflowPlan};
use crate::schema::Schema;
use crate::task::{FactoryArgs, PromptPayload, RunContext, TaskDescriptor};
use prodflow_sdk::WorkflowDefinition;
use serde_json::json;

#[derive(Debug, Clone, WorkflowDefinition)]
#[workflow(
    id = "governance",
    name = "Governance Charter",
    description = "Stakeholder mapping → decision rights → policy drafting → legal review → charter assembly"
)]
pub struct Inputs {
    #[field(label = "Organization", description = "Organization the charter governs")]
    pub organization: String,

    #[field(label = "Scope", description = "What the charter covers, e.g. 'data products'")]
    pub scope: String,

    #[field(
        label = "Decision Framework",
        description = "Decision-rights framework to apply",
        type = "select",
        options = "raci,daci",
        default = "raci"
    )]
    pub framework: Option<String>,
}

pub fn plan() -> WorkflowPlan {
    WorkflowPlan {
        id: "governance",
        name: "Governance Charter",
        description: "Draft a product governance charter with explicit decision rights",
        entries: vec![
            PlanEntry::step("stakeholder_mapping", "Stakeholder Mapping", stakeholder_mapping),
            PlanEntry::step("decision_rights", "Decision Rights", decision_rights),
            PlanEntry::gated(
                "policy_drafting",
                "Policy Drafting",
                policy_drafting,
                vec![QualityGate::advisory(
                    "policy_completeness",
                    "scores.completeness",
                    60.0,
                    "Policy set leaves governance areas uncovered",
                )],
            ),
            PlanEntry::breakpoint(
                "legal_review",
                "Legal Review",
                "Are the drafted policies compatible with existing legal and compliance obligations?",
                vec!["policy_drafting"],
            ),
            PlanEntry::step("charter_assembly", "Charter Assembly", charter_assembly),
        ],
    }
}

fn stakeholder_mapping(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let organization = args.require_str("organization")?;
    let scope = args.require_str("scope")?;

    let level = || Schema::enumeration(&["low", "medium", "high"]);
    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "stakeholders",
                Schema::array_min(
                    Schema::object(
                        [
                            ("name", Schema::string()),
                            ("role", Schema::string()),
                            ("interest", level()),
                            ("influence", level()),
                        ],
                        &["name", "role", "interest", "influence"],
                    ),
                    3,
                ),
            ),
        ],
        &["summary", "stakeholders"],
    );

    let prompt = PromptPayload::new(
        "a governance consultant",
        format!("Map the stakeholders of {} for the '{}' scope.", organization, scope),
    )
    .with_context(json!({ "organization": organization, "scope": scope }))
    .with_instructions(&[
        "Rate each stakeholder's interest and influence",
        "Include roles, not individual names, where the structure allows",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("stakeholder_mapping"),
        "Stakeholder Mapping",
        "pm-analyst",
        prompt,
        schema,
    )
    .with_labels(&["governance"]))
}

fn decision_rights(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let stakeholders = args.require_result("stakeholder_mapping")?;
    let framework = args.str_or("framework", "raci");

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "decisions",
                Schema::array_min(
                    Schema::object(
                        [
                            ("area", Schema::string()),
                            ("owner", Schema::string()),
                            ("consulted", Schema::array(Schema::string())),
                            ("informed", Schema::array(Schema::string())),
                        ],
                        &["area", "owner", "consulted", "informed"],
                    ),
                    3,
                ),
            ),
        ],
        &["summary", "decisions"],
    );

    let prompt = PromptPayload::new(
        "a governance consultant",
        format!("Assign decision rights using the {} framework.", framework.to_uppercase()),
    )
    .with_context(json!({
        "stakeholders": stakeholders.get("stakeholders"),
        "framework": framework,
    }))
    .with_instructions(&[
        "Exactly one owner per decision area",
        "Keep the consulted list short enough to be honest",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("decision_rights"),
        "Decision Rights",
        "governance-counsel",
        prompt,
        schema,
    )
    .with_labels(&["governance"]))
}

fn policy_drafting(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let decisions = args.require_result("decision_rights")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "policies",
                Schema::array_min(
                    Schema::object(
                        [
                            ("title", Schema::string()),
                            ("statement", Schema::string()),
                            ("review_cycle", Schema::string()),
                        ],
                        &["title", "statement", "review_cycle"],
                    ),
                    3,
                ),
            ),
            (
                "scores",
                Schema::object(
                    [("completeness", Schema::number_range(0.0, 100.0))],
                    &["completeness"],
                ),
            ),
        ],
        &["summary", "policies", "scores"],
    );

    let prompt = PromptPayload::new(
        "a governance counsel",
        "Draft the governance policies backing the decision-rights matrix.",
    )
    .with_context(json!({ "decisions": decisions.get("decisions") }))
    .with_instructions(&[
        "One enforceable statement per policy; no aspirational language",
        "Set a review cycle per policy",
        "Score 0-100 how completely the policy set covers the decision areas",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("policy_drafting"),
        "Policy Drafting",
        "governance-counsel",
        prompt,
        schema,
    )
    .with_labels(&["governance", "policy"]))
}

fn charter_assembly(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let organization = args.require_str("organization")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            ("sections", sections_schema(4)),
            (
                "artifacts",
                Schema::array_min(
                    Schema::object(
                        [("path", Schema::string()), ("format", Schema::string())],
                        &["path", "format"],
                    ),
                    1,
                ),
            ),
        ],
        &["summary", "sections", "artifacts"],
    );

    let prompt = PromptPayload::new(
        "a governance counsel",
        format!("Assemble the governance charter for {}.", organization),
    )
    .with_context(json!({
        "stakeholders": args.result_of("stakeholder_mapping"),
        "decisions": args.result_of("decision_rights"),
        "policies": args.result_of("policy_drafting"),
    }))
    .with_instructions(&[
        "Sections: purpose, stakeholders, decision rights, policies",
        "Write the charter to docs/governance-charter.md and declare it as an artifact",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("charter_assembly"),
        "Charter Assembly",
        "pm-writer",
        prompt,
        schema,
    )
    .with_labels(&["governance", "assembly"]))
}
