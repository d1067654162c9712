//! Step executor: one agent invocation per step, persisted on both sides
//!
//! Execution order is fixed: persist the resolved request, invoke the agent
//! exactly once, validate the response against the declared schema, persist
//! the validated result, then append it to the run. Exactly two files are
//! written per step under a deterministic naming convention, so a crashed run
//! can be diagnosed or resumed from its task directory alone.

use crate::agent::{extract_json, AgentCapability};
use crate::errors::{HarnessError, HarnessResult};
use crate::run::Run;
use crate::schema;
use crate::storage::TaskStore;
use crate::task::{Artifact, TaskDescriptor};
use prodflow_sdk::{log_artifact, log_step_complete, log_step_failed};
use serde_json::Value;
use std::sync::Arc;

/// Validated output of one step invocation, plus the artifacts it declared.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step_id: String,
    pub value: Value,
    pub artifacts: Vec<Artifact>,
}

pub struct StepExecutor {
    store: TaskStore,
    agent: Arc<dyn AgentCapability>,
}

impl StepExecutor {
    pub fn new(store: TaskStore, agent: Arc<dyn AgentCapability>) -> Self {
        Self { store, agent }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Execute one step and append its result to the run.
    pub async fn run_step(
        &self,
        descriptor: &TaskDescriptor,
        run: &mut Run,
    ) -> HarnessResult<StepResult> {
        // 1. Persist the resolved request before invoking anything.
        self.store
            .write_json(&run.id, &descriptor.input_path, descriptor)
            .await?;

        // 2. Invoke the agent capability exactly once. No retry here: agent
        //    calls are costly and non-idempotent in their side effects.
        let raw = match self.agent.invoke(&descriptor.agent, &descriptor.prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                log_step_failed!(&descriptor.step_id, e);
                return Err(e);
            }
        };

        // 3. Validate, fail-closed on unparseable JSON.
        let value = match schema::validate_text(&extract_json(&raw), &descriptor.output_schema) {
            Ok(value) => value,
            Err(violations) => {
                let err = HarnessError::SchemaViolation {
                    step: descriptor.step_id.clone(),
                    violations,
                };
                log_step_failed!(&descriptor.step_id, err);
                return Err(err);
            }
        };

        // 4. Persist the validated result.
        self.store
            .write_json(&run.id, &descriptor.output_path, &value)
            .await?;

        let result = self.record(descriptor, value, run).await?;
        log_step_complete!(&descriptor.step_id, &descriptor.title);
        Ok(result)
    }

    /// Replay a previously persisted result without invoking the agent.
    ///
    /// Used when re-entering a run after a crash: a step whose `result.json`
    /// still validates against the descriptor's schema is taken as done.
    /// Returns `Ok(None)` when there is nothing (valid) to replay.
    pub async fn try_replay(
        &self,
        descriptor: &TaskDescriptor,
        run: &mut Run,
    ) -> HarnessResult<Option<StepResult>> {
        if !self.store.exists(&run.id, &descriptor.output_path).await {
            return Ok(None);
        }
        let value: Value = self.store.read_json(&run.id, &descriptor.output_path).await?;
        if schema::validate(&value, &descriptor.output_schema).is_err() {
            return Ok(None);
        }
        let result = self.record(descriptor, value, run).await?;
        log_step_complete!(&descriptor.step_id, "replayed from persisted result");
        Ok(Some(result))
    }

    async fn record(
        &self,
        descriptor: &TaskDescriptor,
        value: Value,
        run: &mut Run,
    ) -> HarnessResult<StepResult> {
        let artifacts = declared_artifacts(&value);
        for artifact in &artifacts {
            log_artifact!(&descriptor.step_id, artifact.path, artifact.format);
        }

        run.append(&descriptor.step_id, value.clone());
        run.record_artifacts(artifacts.clone());
        // Durable before the next step begins.
        self.store.save_run(run).await?;

        Ok(StepResult {
            step_id: descriptor.step_id.clone(),
            value,
            artifacts,
        })
    }
}

/// Artifacts a step declares via the optional `artifacts` array of its
/// validated output. Declarations the schema did not cover are ignored rather
/// than failing a step that already validated.
fn declared_artifacts(value: &Value) -> Vec<Artifact> {
    value
        .get("artifacts")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_declared_artifacts_parses_list() {
        let value = json!({
            "summary": "ok",
            "artifacts": [
                {"path": "docs/prd.md", "format": "markdown", "label": "PRD draft"}
            ]
        });
        let artifacts = declared_artifacts(&value);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, "docs/prd.md");
        assert_eq!(artifacts[0].label.as_deref(), Some("PRD draft"));
    }

    #[test]
    fn test_declared_artifacts_absent_or_malformed() {
        assert!(declared_artifacts(&json!({"summary": "ok"})).is_empty());
        assert!(declared_artifacts(&json!({"artifacts": "nope"})).is_empty());
    }
}
