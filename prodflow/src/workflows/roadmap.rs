//! Quarterly roadmap workflow
//!
//! Collect initiatives, assess capacity, RICE-score everything, pause for a
//! stakeholder review, then sequence the quarter and assemble the roadmap.
//! Scoring confidence below 35 is fatal: a roadmap built on guesswork is
//! worse than no roadmap.

use super::{artifacts_schema, sections_schema};
use crate::errors::HarnessResult;
use crate::runner::{PlanEntry, QualityGate, WorkflowPlan};
use crate::schema::Schema;
use crate::task::{FactoryArgs, PromptPayload, RunContext, TaskDescriptor};
use prodflow_sdk::WorkflowDefinition;
use serde_json::json;

#[derive(Debug, Clone, WorkflowDefinition)]
#[workflow(
    id = "roadmap",
    name = "Quarterly Roadmap",
    description = "Initiative collection → capacity assessment → RICE scoring → stakeholder review → sequencing → roadmap assembly"
)]
pub struct Inputs {
    #[field(label = "Quarter", description = "Planning quarter, e.g. 2026-Q4")]
    pub quarter: String,

    #[field(label = "Product Name", description = "Product the roadmap covers")]
    pub product: String,

    #[field(label = "Team", description = "Owning team, if any")]
    pub team: Option<String>,

    #[field(
        label = "Capacity Points",
        description = "Rough delivery capacity for the quarter",
        type = "number",
        min = "1",
        max = "1000"
    )]
    pub capacity_points: Option<i64>,
}

pub fn plan() -> WorkflowPlan {
    WorkflowPlan {
        id: "roadmap",
        name: "Quarterly Roadmap",
        description: "Plan one quarter of initiatives with RICE scoring",
        entries: vec![
            PlanEntry::step(
                "initiative_collection",
                "Initiative Collection",
                initiative_collection,
            ),
            PlanEntry::step(
                "capacity_assessment",
                "Capacity Assessment",
                capacity_assessment,
            ),
            PlanEntry::gated(
                "rice_scoring",
                "RICE Scoring",
                rice_scoring,
                vec![QualityGate::fatal(
                    "scoring_confidence",
                    "confidence",
                    35.0,
                    "RICE scoring confidence too low",
                )],
            ),
            PlanEntry::breakpoint(
                "stakeholder_review",
                "Stakeholder Review",
                "Does the scored initiative list match stakeholder expectations for the quarter?",
                vec!["rice_scoring"],
            ),
            PlanEntry::step("sequencing", "Sequencing", sequencing),
            PlanEntry::step("roadmap_assembly", "Roadmap Assembly", roadmap_assembly),
        ],
    }
}

fn initiative_collection(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let product = args.require_str("product")?;
    let quarter = args.require_str("quarter")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "initiatives",
                Schema::array_min(
                    Schema::object(
                        [
                            ("title", Schema::string()),
                            ("theme", Schema::string()),
                            ("effort", Schema::enumeration(&["small", "medium", "large"])),
                        ],
                        &["title", "theme", "effort"],
                    ),
                    3,
                ),
            ),
            ("artifacts", artifacts_schema()),
        ],
        &["summary", "initiatives"],
    );

    let prompt = PromptPayload::new(
        "a product strategist",
        format!("Collect candidate initiatives for {} in {}.", product, quarter),
    )
    .with_context(json!({
        "product": product,
        "quarter": quarter,
        "team": args.str_or("team", "not specified"),
    }))
    .with_instructions(&[
        "Group initiatives under strategic themes",
        "Give each a coarse effort size",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("initiative_collection"),
        "Initiative Collection",
        "pm-strategist",
        prompt,
        schema,
    )
    .with_labels(&["roadmap"]))
}

fn capacity_assessment(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "capacity",
                Schema::object(
                    [
                        ("points", Schema::integer_min(0.0)),
                        ("risks", Schema::array(Schema::string())),
                    ],
                    &["points", "risks"],
                ),
            ),
        ],
        &["summary", "capacity"],
    );

    let prompt = PromptPayload::new(
        "an engineering-aware product analyst",
        "Assess realistic delivery capacity for the quarter.",
    )
    .with_context(json!({
        "declared_capacity": args.number_or("capacity_points", 0.0),
        "team": args.str_or("team", "not specified"),
        "initiatives": args.result_of("initiative_collection"),
    }))
    .with_instructions(&[
        "Account for on-call load, holidays, and carry-over work",
        "List the capacity risks explicitly",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("capacity_assessment"),
        "Capacity Assessment",
        "pm-analyst",
        prompt,
        schema,
    )
    .with_labels(&["roadmap", "capacity"]))
}

fn rice_scoring(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let initiatives = args.require_result("initiative_collection")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "scored",
                Schema::array_min(
                    Schema::object(
                        [
                            ("title", Schema::string()),
                            ("reach", Schema::number()),
                            ("impact", Schema::number_range(0.25, 3.0)),
                            ("confidence", Schema::number_range(0.0, 100.0)),
                            ("effort", Schema::number()),
                            ("rice", Schema::number()),
                        ],
                        &["title", "reach", "impact", "confidence", "effort", "rice"],
                    ),
                    3,
                ),
            ),
            ("confidence", Schema::number_range(0.0, 100.0)),
        ],
        &["summary", "scored", "confidence"],
    );

    let prompt = PromptPayload::new(
        "a product strategist",
        "RICE-score every collected initiative.",
    )
    .with_context(json!({
        "initiatives": initiatives.get("initiatives"),
        "capacity": args.result_of("capacity_assessment"),
    }))
    .with_instructions(&[
        "Use reach per quarter, impact on the 0.25-3 scale, confidence 0-100, effort in person-weeks",
        "Report an overall confidence score for the scoring exercise itself",
        "Write the scoring table to docs/rice-scores.md and declare it as an artifact",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("rice_scoring"),
        "RICE Scoring",
        "pm-strategist",
        prompt,
        schema,
    )
    .with_labels(&["roadmap", "scoring"]))
}

fn sequencing(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let scored = args.require_result("rice_scoring")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "lanes",
                Schema::array_min(
                    Schema::object(
                        [
                            ("month", Schema::string()),
                            ("initiatives", Schema::array_min(Schema::string(), 1)),
                        ],
                        &["month", "initiatives"],
                    ),
                    1,
                ),
            ),
        ],
        &["summary", "lanes"],
    );

    let prompt = PromptPayload::new(
        "a product strategist",
        "Sequence the top-scored initiatives across the quarter.",
    )
    .with_context(json!({
        "scored": scored.get("scored"),
        "capacity": args.result_of("capacity_assessment"),
        "quarter": args.str_or("quarter", ""),
    }))
    .with_instructions(&[
        "Respect the assessed capacity; cut from the bottom of the RICE ranking",
        "Front-load dependencies and risk",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("sequencing"),
        "Sequencing",
        "pm-strategist",
        prompt,
        schema,
    )
    .with_labels(&["roadmap"]))
}

fn roadmap_assembly(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let quarter = args.require_str("quarter")?;

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
        "a senior product manager",
        format!("Assemble the {} roadmap document.", quarter),
    )
    .with_context(json!({
        "scoring": args.result_of("rice_scoring"),
        "sequence": args.result_of("sequencing"),
        "capacity": args.result_of("capacity_assessment"),
    }))
    .with_instructions(&[
        "Sections: summary, themes, month-by-month plan, risks",
        "Write the document to docs/roadmap.md and declare it as an artifact",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("roadmap_assembly"),
        "Roadmap Assembly",
        "pm-writer",
        prompt,
        schema,
    )
    .with_labels(&["roadmap", "assembly"]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    #[test]
    fn test_metadata_and_fields() {
        assert_eq!(Inputs::metadata().id, "roadmap");
        let fields = Inputs::fields();
        let capacity = fields.iter().find(|f| f.name == "capacity_points").unwrap();
        assert!(!capacity.required);
        match &capacity.field_type {
            prodflow_sdk::FieldType::Number { min, max } => {
                assert_eq!(*min, Some(1));
                assert_eq!(*max, Some(1000));
            }
            other => panic!("Expected Number field, got {:?}", other),
        }
    }

    #[test]
    fn test_rice_gate_is_fatal_on_confidence() {
        let plan = plan();
        let PlanEntry::Step(step) = &plan.entries[2] else {
            panic!("Expected a step at position 2");
        };
        assert_eq!(step.name, "rice_scoring");
        assert_eq!(step.gates[0].score_path, "confidence");
        assert_eq!(step.gates[0].threshold, 35.0);
    }

    #[test]
    fn test_first_factory_requires_quarter() {
        let mut inputs = BTreeMap::new();
        inputs.insert("product".to_string(), json!("Atlas"));
        let args = FactoryArgs::new(&inputs, &[]);
        assert!(initiative_collection(&args, &mut RunContext::new(Uuid::new_v4())).is_err());
    }
}
