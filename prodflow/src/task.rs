//! Task descriptors: the declarative specification of one workflow step
//!
//! A descriptor bundles everything the step executor needs: the target agent,
//! the prompt payload, the expected output schema, and the persistence paths.
//! It is produced by a pure factory from the workflow inputs and prior step
//! results, and immutable once built.

use crate::errors::{HarnessError, HarnessResult};
use crate::run::StepRecord;
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Kind of work a step delegates. Currently every step is agent-delegated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Agent,
}

/// Prompt payload sent to the agent capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptPayload {
    /// Persona the agent should adopt ("senior product manager", ...)
    pub role: String,
    /// The concrete ask for this step
    pub task: String,
    /// Structured context bundle (workflow inputs, prior step results)
    pub context: Value,
    /// Step-specific instructions, one per line
    pub instructions: Vec<String>,
    /// Description of the expected response format
    pub output_format: String,
}

impl PromptPayload {
    pub fn new(role: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            task: task.into(),
            context: Value::Null,
            instructions: Vec::new(),
            output_format: "A single JSON object, no surrounding prose.".to_string(),
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_instructions(mut self, instructions: &[&str]) -> Self {
        self.instructions = instructions.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = output_format.into();
        self
    }
}

/// Reference to a document produced as a side effect of a step.
///
/// Purely descriptive: the harness records the reference and never loads the
/// content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Artifact {
    pub fn new(path: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: format.into(),
            label: None,
            language: None,
        }
    }

    pub fn labeled(path: impl Into<String>, format: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: format.into(),
            label: Some(label.into()),
            language: None,
        }
    }
}

/// Immutable specification of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub kind: TaskKind,
    pub step_id: String,
    pub title: String,
    /// Target agent identity
    pub agent: String,
    pub prompt: PromptPayload,
    pub output_schema: Schema,
    /// Path of the persisted request, relative to the run directory
    pub input_path: String,
    /// Path of the persisted validated response, relative to the run directory
    pub output_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl TaskDescriptor {
    /// Agent-delegated step with the standard persistence path convention.
    pub fn agent(
        step_id: impl Into<String>,
        title: impl Into<String>,
        agent: impl Into<String>,
        prompt: PromptPayload,
        output_schema: Schema,
    ) -> Self {
        let step_id = step_id.into();
        Self {
            kind: TaskKind::Agent,
            input_path: format!("tasks/{}/input.json", step_id),
            output_path: format!("tasks/{}/result.json", step_id),
            step_id,
            title: title.into(),
            agent: agent.into(),
            prompt,
            output_schema,
            labels: Vec::new(),
        }
    }

    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.labels = labels.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Per-run context handed to descriptor factories.
///
/// The only mutable piece is the step counter: calling [`next_step_id`]
/// in the same order always yields the same identifiers, which keeps
/// factories deterministic across replays of the same plan.
///
/// [`next_step_id`]: RunContext::next_step_id
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    next_index: usize,
}

impl RunContext {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            next_index: 1,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Allocate the next step identifier, e.g. `03_user_stories`.
    pub fn next_step_id(&mut self, name: &str) -> String {
        let id = format!("{:02}_{}", self.next_index, name);
        self.next_index += 1;
        id
    }
}

/// Read-only view a factory gets over the workflow inputs and everything
/// produced so far. Step N+1 can only see results of steps <= N because the
/// runner appends each record before building the next descriptor.
pub struct FactoryArgs<'a> {
    pub inputs: &'a BTreeMap<String, Value>,
    pub records: &'a [StepRecord],
}

impl<'a> FactoryArgs<'a> {
    pub fn new(inputs: &'a BTreeMap<String, Value>, records: &'a [StepRecord]) -> Self {
        Self { inputs, records }
    }

    /// Required string input; missing or non-string is a caller error.
    pub fn require_str(&self, key: &str) -> HarnessResult<&str> {
        match self.inputs.get(key) {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => Err(HarnessError::invalid(
                "inputs",
                format!("'{}' must be a string, got {}", key, other),
            )),
            None => Err(HarnessError::invalid(
                "inputs",
                format!("missing required input '{}'", key),
            )),
        }
    }

    pub fn str_or(&self, key: &str, default: &'a str) -> &'a str {
        match self.inputs.get(key) {
            Some(Value::String(s)) => s.as_str(),
            _ => default,
        }
    }

    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.inputs
            .get(key)
            .and_then(|v| v.as_f64())
            .unwrap_or(default)
    }

    /// Validated result of an earlier step, addressed by its bare name
    /// (without the positional prefix).
    pub fn result_of(&self, name: &str) -> Option<&Value> {
        self.records
            .iter()
            .rev()
            .find(|r| {
                r.step_id
                    .split_once('_')
                    .map(|(_, rest)| rest == name)
                    .unwrap_or(false)
            })
            .map(|r| &r.value)
    }

    /// Like [`result_of`] but missing results are a harness bug surfaced as an
    /// invalid-argument error (factories for late steps depend on earlier
    /// steps the plan guarantees have run).
    ///
    /// [`result_of`]: FactoryArgs::result_of
    pub fn require_result(&self, name: &str) -> HarnessResult<&Value> {
        self.result_of(name).ok_or_else(|| {
            HarnessError::invalid(
                "run state",
                format!("no result recorded for step '{}'", name),
            )
        })
    }
}
