//! Shared fixtures for the harness integration tests

use prodflow::agent::ScriptedAgent;
use prodflow::breakpoint::{AutoApprove, BreakpointGate};
use prodflow::errors::HarnessResult;
use prodflow::executor::StepExecutor;
use prodflow::runner::{PlanEntry, QualityGate, WorkflowPlan, WorkflowRunner};
use prodflow::schema::Schema;
use prodflow::storage::TaskStore;
use prodflow::task::{FactoryArgs, PromptPayload, RunContext, TaskDescriptor};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Output schema every test step shares: a summary, a numeric score, and an
/// optional artifact list.
pub fn step_schema() -> Schema {
    Schema::object(
        [
            ("summary", Schema::string()),
            ("score", Schema::number_range(0.0, 100.0)),
            (
                "artifacts",
                Schema::array(Schema::object(
                    [("path", Schema::string()), ("format", Schema::string())],
                    &["path", "format"],
                )),
            ),
        ],
        &["summary", "score"],
    )
}

fn step_descriptor(
    name: &str,
    title: &str,
    ctx: &mut RunContext,
) -> HarnessResult<TaskDescriptor> {
    Ok(TaskDescriptor::agent(
        ctx.next_step_id(name),
        title,
        "test-agent",
        PromptPayload::new("a test persona", format!("Produce the {} result", name)),
        step_schema(),
    ))
}

pub fn collect(_: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    step_descriptor("collect", "Collect", ctx)
}

pub fn refine(args: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    // Later steps read earlier results, mirroring real factories.
    let _ = args.require_result("collect")?;
    step_descriptor("refine", "Refine", ctx)
}

pub fn polish(_: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    step_descriptor("polish", "Polish", ctx)
}

pub fn publish(_: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    step_descriptor("publish", "Publish", ctx)
}

pub fn finalize(_: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    step_descriptor("finalize", "Finalize", ctx)
}

pub fn assemble(_: &FactoryArgs, ctx: &mut RunContext) -> HarnessResult<TaskDescriptor> {
    step_descriptor("assemble", "Assemble", ctx)
}

/// `{collect [fatal gate: score >= 40], assemble}`: the canonical
/// short-circuit scenario.
pub fn gated_plan() -> WorkflowPlan {
    WorkflowPlan {
        id: "gated",
        name: "Gated",
        description: "Two steps with a fatal gate on the first",
        entries: vec![
            PlanEntry::gated(
                "collect",
                "Collect",
                collect,
                vec![QualityGate::fatal(
                    "score_floor",
                    "score",
                    40.0,
                    "Collected score below floor",
                )],
            ),
            PlanEntry::step("assemble", "Assemble", assemble),
        ],
    }
}

/// Five sequential steps with a fatal gate on the third.
pub fn five_step_plan() -> WorkflowPlan {
    WorkflowPlan {
        id: "five",
        name: "Five Steps",
        description: "Fatal gate at step three",
        entries: vec![
            PlanEntry::step("collect", "Collect", collect),
            PlanEntry::step("refine", "Refine", refine),
            PlanEntry::gated(
                "polish",
                "Polish",
                polish,
                vec![QualityGate::fatal(
                    "polish_floor",
                    "score",
                    40.0,
                    "Polish score below floor",
                )],
            ),
            PlanEntry::step("publish", "Publish", publish),
            PlanEntry::step("finalize", "Finalize", finalize),
        ],
    }
}

/// `{collect, breakpoint, assemble}`.
pub fn breakpoint_plan() -> WorkflowPlan {
    WorkflowPlan {
        id: "reviewed",
        name: "Reviewed",
        description: "One breakpoint between two steps",
        entries: vec![
            PlanEntry::step("collect", "Collect", collect),
            PlanEntry::breakpoint(
                "review",
                "Collection Review",
                "Is the collected data good enough to continue?",
                vec!["collect"],
            ),
            PlanEntry::step("assemble", "Assemble", assemble),
        ],
    }
}

/// Three plain steps, no gates or breakpoints.
pub fn success_plan() -> WorkflowPlan {
    WorkflowPlan {
        id: "plain",
        name: "Plain",
        description: "Three sequential steps",
        entries: vec![
            PlanEntry::step("collect", "Collect", collect),
            PlanEntry::step("refine", "Refine", refine),
            PlanEntry::step("assemble", "Assemble", assemble),
        ],
    }
}

/// Canned step response with the given score and optional declared artifact.
pub fn response(score: f64, artifact: Option<&str>) -> String {
    let artifacts = match artifact {
        Some(path) => json!([{"path": path, "format": "markdown"}]),
        None => json!([]),
    };
    json!({
        "summary": format!("scored {}", score),
        "score": score,
        "artifacts": artifacts,
    })
    .to_string()
}

pub fn empty_inputs() -> BTreeMap<String, Value> {
    BTreeMap::new()
}

pub struct Fixture {
    // Kept so the temp directory outlives the store
    _dir: tempfile::TempDir,
    pub store: TaskStore,
    pub agent: Arc<ScriptedAgent>,
}

impl Fixture {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path());
        let agent = Arc::new(ScriptedAgent::new(responses));
        Self {
            _dir: dir,
            store,
            agent,
        }
    }

    pub fn executor(&self) -> StepExecutor {
        StepExecutor::new(self.store.clone(), self.agent.clone())
    }

    /// Runner that auto-approves every breakpoint.
    pub fn runner(&self) -> WorkflowRunner {
        WorkflowRunner::new(self.executor(), Arc::new(AutoApprove))
    }

    pub fn runner_with_gate(&self, gate: Arc<dyn BreakpointGate>) -> WorkflowRunner {
        WorkflowRunner::new(self.executor(), gate)
    }
}
