//! Retention analysis workflow (AARRR funnel)

use super::{artifacts_schema, sections_schema};
use crate::errors::HarnessResult;
use crate::runner::{PlanEntry, QualityGate, WorkflowPlan};
use crate::schema::Schema;
use crate::task::{FactoryArgs, PromptPayload, RunContext, TaskDescriptor};
use prodflow_sdk::WorkflowDefinition;
use serde_json::json;

#[derive(Debug, Clone, WorkflowDefinition)]
#[workflow(
    id = "retention",
    name = "Retention Analysis",
    description = "Cohort definition → metric collection → AARRR funnel analysis → churn drivers → findings review → recommendations → report assembly"
)]
pub struct Inputs {
    #[field(label = "Product Name", description = "Product under analysis")]
    pub product: String,

    #[field(
        label = "Analysis Period",
        description = "Lookback window, e.g. 90d",
        default = "90d"
    )]
    pub period: String,

    #[field(label = "Data Source", description = "Where usage data lives (warehouse, analytics tool)")]
    pub data_source: Option<String>,
}

pub fn plan() -> WorkflowPlan {
    WorkflowPlan {
        id: "retention",
        name: "Retention Analysis",
        description: "Analyze retention through the AARRR funnel and recommend fixes",
        entries: vec![
            PlanEntry::step("cohort_definition", "Cohort Definition", cohort_definition),
            PlanEntry::gated(
                "metric_collection",
                "Metric Collection",
                metric_collection,
                vec![QualityGate::fatal(
                    "data_completeness",
                    "data_completeness",
                    50.0,
                    "Too many metrics missing to analyze retention",
                )],
            ),
            PlanEntry::step("funnel_analysis", "Funnel Analysis", funnel_analysis),
            PlanEntry::gated(
                "churn_drivers",
                "Churn Drivers",
                churn_drivers,
                vec![QualityGate::advisory(
                    "driver_confidence",
                    "scores.confidence",
                    40.0,
                    "Churn driver attribution is speculative",
                )],
            ),
            PlanEntry::breakpoint(
                "findings_review",
                "Findings Review",
                "Do the funnel numbers and churn drivers match what the team sees in production?",
                vec!["funnel_analysis", "churn_drivers"],
            ),
            PlanEntry::step("recommendations", "Recommendations", recommendations),
            PlanEntry::step("report_assembly", "Report Assembly", report_assembly),
        ],
    }
}

fn cohort_definition(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let product = args.require_str("product")?;
    let period = args.require_str("period")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "cohorts",
                Schema::array_min(
                    Schema::object(
                        [
                            ("name", Schema::string()),
                            ("window", Schema::string()),
                            ("size", Schema::integer_min(0.0)),
                        ],
                        &["name", "window", "size"],
                    ),
                    1,
                ),
            ),
        ],
        &["summary", "cohorts"],
    );

    let prompt = PromptPayload::new(
        "a product data analyst",
        format!("Define the cohorts for a {} retention analysis of {}.", period, product),
    )
    .with_context(json!({
        "product": product,
        "period": period,
        "data_source": args.str_or("data_source", "not specified"),
    }))
    .with_instructions(&[
        "Cohort by signup week unless the product's cadence suggests otherwise",
        "Estimate cohort sizes from the data source",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("cohort_definition"),
        "Cohort Definition",
        "data-analyst",
        prompt,
        schema,
    )
    .with_labels(&["retention"]))
}

fn metric_collection(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let cohorts = args.require_result("cohort_definition")?;

    // Funnel metrics keyed by stage name; completeness reports how much of
    // the requested data was actually available.
    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            ("metrics", Schema::map_of(Schema::number())),
            ("data_completeness", Schema::number_range(0.0, 100.0)),
            ("artifacts", artifacts_schema()),
        ],
        &["summary", "metrics", "data_completeness"],
    );

    let prompt = PromptPayload::new(
        "a product data analyst",
        "Collect the funnel metrics for each defined cohort.",
    )
    .with_context(json!({
        "cohorts": cohorts.get("cohorts"),
        "data_source": args.str_or("data_source", "not specified"),
    }))
    .with_instructions(&[
        "Report week-1/week-4/week-12 retention plus activation and referral rates",
        "Score data completeness 0-100: how much of the requested data existed",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("metric_collection"),
        "Metric Collection",
        "data-analyst",
        prompt,
        schema,
    )
    .with_labels(&["retention", "data"]))
}

fn funnel_analysis(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let metrics = args.require_result("metric_collection")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "stages",
                Schema::array_min(
                    Schema::object(
                        [
                            (
                                "stage",
                                Schema::enumeration(&[
                                    "acquisition",
                                    "activation",
                                    "retention",
                                    "referral",
                                    "revenue",
                                ]),
                            ),
                            ("conversion", Schema::number_range(0.0, 100.0)),
                            ("insight", Schema::string()),
                        ],
                        &["stage", "conversion", "insight"],
                    ),
                    3,
                ),
            ),
        ],
        &["summary", "stages"],
    );

    let prompt = PromptPayload::new(
        "a growth analyst",
        "Walk the AARRR funnel and find where users fall out.",
    )
    .with_context(json!({ "metrics": metrics.get("metrics") }))
    .with_instructions(&[
        "One insight per stage, tied to a number",
        "Name the single worst leak explicitly in the summary",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("funnel_analysis"),
        "Funnel Analysis",
        "data-analyst",
        prompt,
        schema,
    )
    .with_labels(&["retention", "funnel"]))
}

fn churn_drivers(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let funnel = args.require_result("funnel_analysis")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "drivers",
                Schema::array_min(
                    Schema::object(
                        [
                            ("driver", Schema::string()),
                            ("severity", Schema::enumeration(&["low", "medium", "high"])),
                            ("evidence", Schema::string()),
                        ],
                        &["driver", "severity", "evidence"],
                    ),
                    1,
                ),
            ),
            (
                "scores",
                Schema::object(
                    [("confidence", Schema::number_range(0.0, 100.0))],
                    &["confidence"],
                ),
            ),
        ],
        &["summary", "drivers", "scores"],
    );

    let prompt = PromptPayload::new(
        "a product analyst",
        "Attribute the funnel leaks to concrete churn drivers.",
    )
    .with_context(json!({ "funnel": funnel.get("stages") }))
    .with_instructions(&[
        "Back every driver with evidence from the metrics, not intuition",
        "Score your overall attribution confidence 0-100",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("churn_drivers"),
        "Churn Drivers",
        "pm-analyst",
        prompt,
        schema,
    )
    .with_labels(&["retention"]))
}

fn recommendations(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let drivers = args.require_result("churn_drivers")?;

    let schema = Schema::object(
        [
            ("summary", Schema::string()),
            (
                "recommendations",
                Schema::array_min(
                    Schema::object(
                        [
                            ("action", Schema::string()),
                            ("expected_impact", Schema::string()),
                            ("horizon", Schema::enumeration(&["now", "next", "later"])),
                        ],
                        &["action", "expected_impact", "horizon"],
                    ),
                    3,
                ),
            ),
        ],
        &["summary", "recommendations"],
    );

    let prompt = PromptPayload::new(
        "a product strategist",
        "Turn the churn drivers into an actionable retention plan.",
    )
    .with_context(json!({ "drivers": drivers.get("drivers") }))
    .with_instructions(&[
        "Order by expected impact over effort",
        "Use the now/next/later horizon buckets",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("recommendations"),
        "Recommendations",
        "pm-strategist",
        prompt,
        schema,
    )
    .with_labels(&["retention"]))
}

fn report_assembly(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    let product = args.require_str("product")?;

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
        format!("Assemble the retention analysis report for '{}'.", product),
    )
    .with_context(json!({
        "funnel": args.result_of("funnel_analysis"),
        "drivers": args.result_of("churn_drivers"),
        "recommendations": args.result_of("recommendations"),
    }))
    .with_instructions(&[
        "Sections: executive summary, funnel, churn drivers, recommendations",
        "Write the report to docs/retention-report.md and declare it as an artifact",
    ]);

    Ok(TaskDescriptor::agent(
        ctx.next_step_id("report_assembly"),
        "Report Assembly",
        "pm-writer",
        prompt,
        schema,
    )
    .with_labels(&["retention", "assembly"]))
}
