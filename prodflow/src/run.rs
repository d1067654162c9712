//! Run state: one end-to-end execution of a workflow
//!
//! A run accumulates validated step results and artifact references in strict
//! step order. Records are append-only; nothing is ever removed or reordered,
//! so a failed run still carries everything produced before the failure.

use crate::task::Artifact;
use chrono::{DateTime, Local};
use prodflow_sdk::RunStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Validated output of one completed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    pub value: Value,
}

/// One execution of a workflow, from invocation to terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub workflow_id: String,
    pub started_at: DateTime<Local>,
    pub status: RunStatus,
    pub records: Vec<StepRecord>,
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concerns: Vec<String>,
}

impl Run {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), workflow_id)
    }

    pub fn with_id(id: Uuid, workflow_id: impl Into<String>) -> Self {
        Self {
            id,
            workflow_id: workflow_id.into(),
            started_at: Local::now(),
            status: RunStatus::Pending,
            records: Vec::new(),
            artifacts: Vec::new(),
            reason: None,
            concerns: Vec::new(),
        }
    }

    /// Append a step's validated result. Records are never replaced: a
    /// duplicate step id is a harness bug and is kept visible rather than
    /// silently merged.
    pub fn append(&mut self, step_id: impl Into<String>, value: Value) {
        self.records.push(StepRecord {
            step_id: step_id.into(),
            value,
        });
    }

    pub fn record_artifacts(&mut self, artifacts: impl IntoIterator<Item = Artifact>) {
        self.artifacts.extend(artifacts);
    }

    /// Result of a completed step by exact step id.
    pub fn result(&self, step_id: &str) -> Option<&Value> {
        self.records
            .iter()
            .find(|r| r.step_id == step_id)
            .map(|r| &r.value)
    }

    pub fn step_count(&self) -> usize {
        self.records.len()
    }
}

/// Metadata attached to every workflow outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Workflow identifier ("prd", "roadmap", ...)
    pub process_id: String,
    pub run_id: Uuid,
    pub timestamp: DateTime<Local>,
    pub duration_ms: u64,
}

/// What a workflow invocation returns, success or not.
///
/// Partial results are valuable: a failed run still returns every artifact
/// and record accumulated up to the failure point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concerns: Vec<String>,
    pub artifacts: Vec<Artifact>,
    pub results: Vec<StepRecord>,
    pub metadata: RunMetadata,
}
