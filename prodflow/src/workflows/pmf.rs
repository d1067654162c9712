//! Product-market-fit assessment workflow (Sean Ellis survey method)

use super::{artifacts_schema, sections_schema};
use crate::errors::HarnessResult;
use crate::runner::{PlanEntry, QualityGate, WorkflowPlan};
use crate::schema::Schema;
use crate::task::{FactoryArgs, PromptPayload, RunContext, TaskDescriptor};
use prodflow_sdk::WorkflowDefinition;
use serde_json::json;

#[derive(Debug, Clone, WorkflowDefinition)]
#[workflow(
    id = "pmf",
    name = "PMF Assessment",
    description = "Signal collection → Sean Ellis scoring → segment analysis → assessment review → assessment assembly"
)]
pub struct Inputs {
    #[field(label = "Product Name", description = "Product under assessment")]
    pub product: String,

    #[field(label = "Segment", description = "Customer segment to focus on, if any")]
    pub segment: Option<String>,

    #[field(
        label = "Survey Window",
        description = "How far back to read survey responses",
        default = "60d"
    )]
    pub survey_window: Option<String>,
}

pub fn plan() -> WorkflowPlan {
    WorkflowPlan {
        id: "pmf",
        name: "PMF Assessment",
        description: "Assess product-market fit from survey signal",
        entries: vec![
            PlanEntry::gated(
                "signal_collection",
                "Signal Collection",
                signal_collection,
                // Below 30 responses the Sean Ellis ratio is noise.
                vec![QualityGate::fatal(
                    "sample_size",
                    "responses",
                    30.0,
                    "Survey sample too small for a PMF read",
                )],
            ),
            PlanEntry::gated(
                "sean_ellis_scoring",
                "Sean Ellis Scoring",
                sean_ellis_scoring,
                vec![QualityGate::advisory(
                    "pmf_signal",
                    "pmf_score",
                    40.0,
                    "PMF score below the 40% benchmark",
                )],
            ),
            PlanEntry::step("segment_analysis", "Segment Analysis", segment_analysis),
            PlanEntry::breakpoint(
                "assessment_review",
                "Assessment Review",
                "Do the survey segments match how the team thinks about the market?",
                vec!["sean_ellis_scoring", "segment_analysis"],
            ),
            PlanEntry::step("assessment_assembly", "Assessment Assembly", assessment_assembly),
        ],
    }
}

fn signal_collection(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let product = args.require_str("product")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            ("responses", Schema::integer_min(0.0)),
            ("channels", Schema::array_min(Schema::string(), 1)),
            ("artifacts", artifacts_schema()),
        ],
        &["summary", "responses", "channels"],
    );

    let prompt = PromptPayload::new(
        "a product data analyst",
        format!("Collect PMF survey responses for '{}'.", product),
    )
    .with_context(json!({
        "product": product,
        "segment": args.str_or("segment", "all users"),
        "window": args.str_or("survey_window", "60d"),
    }))
    .with_instructions(&[
        "Count only completed 'how would you feel if you could no longer use X' responses",
        "List the channels the responses came from",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("signal_collection"),
        "Signal Collection",
        "data-analyst",
        prompt,
        schema,
    )
    .with_labels(&["pmf", "data"]))
}

fn sean_ellis_scoring(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let signal = args.require_result("signal_collection")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            ("very_disappointed", Schema::number_range(0.0, 100.0)),
            ("somewhat_disappointed", Schema::number_range(0.0, 100.0)),
            ("not_disappointed", Schema::number_range(0.0, 100.0)),
            ("pmf_score", Schema::number_range(0.0, 100.0)),
        ],
        &["summary", "very_disappointed", "pmf_score"],
    );

    let prompt = PromptPayload::new(
        "a growth analyst",
        "Compute the Sean Ellis PMF score from the collected responses.",
    )
    .with_context(json!({ "signal": signal }))
    .with_instructions(&[
        "pmf_score is the percentage answering 'very disappointed'",
        "Break out the full disappointment distribution",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("sean_ellis_scoring"),
        "Sean Ellis Scoring",
        "data-analyst",
        prompt,
        schema,
    )
    .with_labels(&["pmf", "scoring"]))
}

fn segment_analysis(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let scoring = args.require_result("sean_ellis_scoring")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "segments",
                Schema::array_min(
                    Schema::object(
                        [
                            ("name", Schema::string()),
                            ("pmf_score", Schema::number_range(0.0, 100.0)),
                            ("insight", Schema::string()),
                        ],
                        &["name", "pmf_score", "insight"],
                    ),
                    1,
                ),
            ),
        ],
        &["summary", "segments"],
    );

    let prompt = PromptPayload::new(
        "a product analyst",
        "Find the segments where fit concentrates.",
    )
    .with_context(json!({
        "overall": scoring,
        "focus_segment": args.str_or("segment", "all users"),
    }))
    .with_instructions(&[
        "Cut by role, company size, and acquisition channel where data allows",
        "Flag the strongest-fit segment in the summary",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("segment_analysis"),
        "Segment Analysis",
        "pm-analyst",
        prompt,
        schema,
    )
    .with_labels(&["pmf"]))
}

fn assessment_assembly(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
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
        format!("Assemble the PMF assessment for '{}'.", product),
    )
    .with_context(json!({
        "scoring": args.result_of("sean_ellis_scoring"),
        "segments": args.result_of("segment_analysis"),
    }))
    .with_instructions(&[
        "Sections: verdict, score breakdown, segment findings",
        "Write the assessment to docs/pmf-assessment.md and declare it as an artifact",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("assessment_assembly"),
        "Assessment Assembly",
        "pm-writer",
        prompt,
        schema,
    )
    .with_labels(&["pmf", "assembly"]))
}
