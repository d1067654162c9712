//! User story mapping workflow

use super::{artifacts_schema, sections_schema};
use crate::errors::HarnessResult;
use crate::runner::{PlanEntry, QualityGate, WorkflowPlan};
use crate::schema::Schema;
use crate::task::{FactoryArgs, PromptPayload, RunContext, TaskDescriptor};
use prodflow_sdk::WorkflowDefinition;
use serde_json::json;

#[derive(Debug, Clone, WorkflowDefinition)]
#[workflow(
    id = "story-map",
    name = "Story Map",
    description = "Journey backbone → activity breakdown → story slicing → release slices → map review → map assembly"
)]
pub struct Inputs {
    #[field(label = "Product Name", description = "Product being mapped")]
    pub product: String,

    #[field(label = "User Journey", description = "The end-to-end journey to map, e.g. 'first purchase'")]
    pub journey: String,

    #[field(
        label = "Release Count",
        description = "How many release slices to plan",
        type = "number",
        min = "1",
        max = "6",
        default = "3"
    )]
    pub releases: Option<i64>,
}

pub fn plan() -> WorkflowPlan {
    WorkflowPlan {
        id: "story-map",
        name: "Story Map",
        description: "Build a user story map with release slices",
        entries: vec![
            PlanEntry::step("journey_backbone", "Journey Backbone", journey_backbone),
            PlanEntry::step("activity_breakdown", "Activity Breakdown", activity_breakdown),
            PlanEntry::step("story_slicing", "Story Slicing", story_slicing),
            PlanEntry::gated(
                "release_slices",
                "Release Slices",
                release_slices,
                vec![QualityGate::advisory(
                    "walking_skeleton",
                    "scores.walking_skeleton",
                    50.0,
                    "First release is not a walking skeleton",
                )],
            ),
            PlanEntry::breakpoint(
                "map_review",
                "Map Review",
                "Does the first slice deliver an end-to-end journey?",
                vec!["release_slices"],
            ),
            PlanEntry::step("map_assembly", "Map Assembly", map_assembly),
        ],
    }
}

fn journey_backbone(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let product = args.require_str("product")?;
    let journey = args.require_str("journey")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "activities",
                Schema::array_min(
                    Schema::object(
                        [("name", Schema::string()), ("goal", Schema::string())],
                        &["name", "goal"],
                    ),
                    3,
                ),
            ),
        ],
        &["summary", "activities"],
    );

    let prompt = PromptPayload::new(
        "a user researcher",
        format!("Lay out the backbone activities of the '{}' journey in {}.", journey, product),
    )
    .with_context(json!({ "product": product, "journey": journey }))
    .with_instructions(&[
        "Order activities left to right as the user experiences them",
        "Name the user's goal per activity, not the feature",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("journey_backbone"),
        "Journey Backbone",
        "ux-researcher",
        prompt,
        schema,
    )
    .with_labels(&["story-map"]))
}

fn activity_breakdown(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let backbone = args.require_result("journey_backbone")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "tasks",
                Schema::array_min(
                    Schema::object(
                        [
                            ("activity", Schema::string()),
                            ("steps", Schema::array_min(Schema::string(), 1)),
                        ],
                        &["activity", "steps"],
                    ),
                    1,
                ),
            ),
        ],
        &["summary", "tasks"],
    );

    let prompt = PromptPayload::new(
        "a user researcher",
        "Break each backbone activity into concrete user tasks.",
    )
    .with_context(json!({ "activities": backbone.get("activities") }))
    .with_instructions(&["Keep tasks at the level of one user intention each"]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("activity_breakdown"),
        "Activity Breakdown",
        "ux-researcher",
        prompt,
        schema,
    )
    .with_labels(&["story-map"]))
}

fn story_slicing(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let breakdown = args.require_result("activity_breakdown")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "stories",
                Schema::array_min(
                    Schema::object(
                        [
                            ("activity", Schema::string()),
                            ("title", Schema::string()),
                            ("size", Schema::enumeration(&["xs", "s", "m", "l"])),
                        ],
                        &["activity", "title", "size"],
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
        "Slice the user tasks into estimable stories.",
    )
    .with_context(json!({ "tasks": breakdown.get("tasks") }))
    .with_instructions(&[
        "Each story must map back to one backbone activity",
        "Size coarsely: xs, s, m, l",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("story_slicing"),
        "Story Slicing",
        "pm-writer",
        prompt,
        schema,
    )
    .with_labels(&["story-map"]))
}

fn release_slices(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let stories = args.require_result("story_slicing")?;
    let releases = args.number_or("releases", 3.0);

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "slices",
                Schema::array_min(
                    Schema::object(
                        [
                            ("release", Schema::string()),
                            ("goal", Schema::string()),
                            ("stories", Schema::array_min(Schema::string(), 1)),
                        ],
                        &["release", "goal", "stories"],
                    ),
                    1,
                ),
            ),
            (
                "scores",
                Schema::object(
                    [("walking_skeleton", Schema::number_range(0.0, 100.0))],
                    &["walking_skeleton"],
                ),
            ),
        ],
        &["summary", "slices", "scores"],
    );

    let prompt = PromptPayload::new(
        "a product strategist",
        format!("Cut the map into {} release slices.", releases),
    )
    .with_context(json!({
        "stories": stories.get("stories"),
        "release_count": releases,
    }))
    .with_instructions(&[
        "Slice horizontally: every release must touch every backbone activity it can",
        "Score 0-100 how well slice one works as a walking skeleton",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("release_slices"),
        "Release Slices",
        "pm-strategist",
        prompt,
        schema,
    )
    .with_labels(&["story-map", "planning"]))
}

fn map_assembly(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let product = args.require_str("product")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            ("sections", sections_schema(3)),
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
        format!("Assemble the story map document for '{}'.", product),
    )
    .with_context(json!({
        "backbone": args.result_of("journey_backbone"),
        "stories": args.result_of("story_slicing"),
        "slices": args.result_of("release_slices"),
    }))
    .with_instructions(&[
        "Render the map as a table: activities across, slices down",
        "Write the document to docs/story-map.md and declare it as an artifact",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("map_assembly"),
        "Map Assembly",
        "pm-writer",
        prompt,
        schema,
    )
    .with_labels(&["story-map", "assembly"]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    #[test]
    fn test_plan_has_one_breakpoint() {
        let breakpoints = plan()
            .entries
            .iter()
            .filter(|e| matches!(e, PlanEntry::Breakpoint(_)))
            .count();
        assert_eq!(breakpoints, 1);
        assert_eq!(plan().step_count(), 5);
    }

    #[test]
    fn test_release_slices_uses_default_count() {
        let mut inputs = BTreeMap::new();
        inputs.insert("product".to_string(), json!("Atlas"));
        inputs.insert("journey".to_string(), json!("first purchase"));
        let records = vec![crate::run::StepRecord {
            step_id: "03_story_slicing".to_string(),
            value: json!({"stories": []}),
        }];
        let args = FactoryArgs::new(&inputs, &records);
        let descriptor = release_slices(&args, &mut RunContext::new(Uuid::new_v4())).unwrap();
        assert!(descriptor.prompt.task.contains("3 release slices"));
    }
}
