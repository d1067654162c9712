//! Data-driven workflow runner
//!
//! A workflow is an ordered list of plan entries (agent steps and human
//! breakpoints) consumed by one generic runner, instead of bespoke control
//! flow per workflow. The runner threads the accumulated run state through
//! the step executor, evaluates quality gates after each step, and
//! short-circuits on fatal failures while keeping every artifact produced so
//! far.
//!
//! Per-run state machine:
//! `Pending -> Running -> {Paused <-> Running} -> {Succeeded | Failed}`

use crate::breakpoint::{BreakpointContext, BreakpointGate, BreakpointRequest, ResumeSignal};
use crate::database::Database;
use crate::errors::{HarnessError, HarnessResult};
use crate::executor::{StepExecutor, StepResult};
use crate::run::{Run, RunMetadata, WorkflowOutcome};
use crate::task::{FactoryArgs, RunContext, TaskDescriptor};
use chrono::Local;
use prodflow_sdk::{
    log_breakpoint_raised, log_breakpoint_resolved, log_gate, log_run_finished, log_run_start,
    log_step_start, RunStatus,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// How a failed gate affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSeverity {
    /// Short-circuit the run, keeping partial results
    Fatal,
    /// Raise a breakpoint and let a human decide
    Advisory,
}

/// Threshold check on a numeric score field of a step's validated output.
#[derive(Debug, Clone)]
pub struct QualityGate {
    pub id: &'static str,
    pub description: &'static str,
    /// Dot path into the step output, e.g. `scores.clarity`
    pub score_path: &'static str,
    pub threshold: f64,
    pub severity: GateSeverity,
}

/// Outcome of evaluating one gate. A derived value, never persisted.
#[derive(Debug, Clone, Copy)]
pub struct GateVerdict {
    pub score: Option<f64>,
    pub passed: bool,
}

impl QualityGate {
    pub fn fatal(
        id: &'static str,
        score_path: &'static str,
        threshold: f64,
        description: &'static str,
    ) -> Self {
        Self {
            id,
            description,
            score_path,
            threshold,
            severity: GateSeverity::Fatal,
        }
    }

    pub fn advisory(
        id: &'static str,
        score_path: &'static str,
        threshold: f64,
        description: &'static str,
    ) -> Self {
        Self {
            id,
            description,
            score_path,
            threshold,
            severity: GateSeverity::Advisory,
        }
    }

    /// Score at or above the threshold passes. A missing or non-numeric
    /// score fails: a gate that cannot read its score must not wave the run
    /// through.
    pub fn evaluate(&self, value: &Value) -> GateVerdict {
        let score = lookup_score(value, self.score_path);
        GateVerdict {
            score,
            passed: score.map(|s| s >= self.threshold).unwrap_or(false),
        }
    }
}

fn lookup_score(value: &Value, path: &str) -> Option<f64> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    current.as_f64()
}

/// Factory producing the descriptor for one step.
pub type StepFactory = fn(&FactoryArgs, &mut RunContext) -> HarnessResult<TaskDescriptor>;

pub struct StepPlan {
    /// Bare step name; the run context prefixes it with the position
    pub name: &'static str,
    pub title: &'static str,
    pub factory: StepFactory,
    pub gates: Vec<QualityGate>,
}

pub struct BreakpointPlan {
    pub name: &'static str,
    pub title: &'static str,
    pub question: &'static str,
    /// Bare names of steps whose summaries go into the reviewer context
    pub summary_steps: Vec<&'static str>,
}

pub enum PlanEntry {
    Step(StepPlan),
    Breakpoint(BreakpointPlan),
}

impl PlanEntry {
    pub fn step(name: &'static str, title: &'static str, factory: StepFactory) -> Self {
        PlanEntry::Step(StepPlan {
            name,
            title,
            factory,
            gates: Vec::new(),
        })
    }

    pub fn gated(
        name: &'static str,
        title: &'static str,
        factory: StepFactory,
        gates: Vec<QualityGate>,
    ) -> Self {
        PlanEntry::Step(StepPlan {
            name,
            title,
            factory,
            gates,
        })
    }

    pub fn breakpoint(
        name: &'static str,
        title: &'static str,
        question: &'static str,
        summary_steps: Vec<&'static str>,
    ) -> Self {
        PlanEntry::Breakpoint(BreakpointPlan {
            name,
            title,
            question,
            summary_steps,
        })
    }
}

/// Ordered workflow definition consumed by the runner.
pub struct WorkflowPlan {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub entries: Vec<PlanEntry>,
}

impl WorkflowPlan {
    pub fn step_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, PlanEntry::Step(_)))
            .count()
    }
}

pub struct WorkflowRunner {
    executor: StepExecutor,
    gate: Arc<dyn BreakpointGate>,
    registry: Option<Arc<Mutex<Database>>>,
    /// Replay persisted step results instead of re-invoking the agent
    replay: bool,
}

impl WorkflowRunner {
    pub fn new(executor: StepExecutor, gate: Arc<dyn BreakpointGate>) -> Self {
        Self {
            executor,
            gate,
            registry: None,
            replay: false,
        }
    }

    pub fn with_registry(mut self, registry: Arc<Mutex<Database>>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_replay(mut self, replay: bool) -> Self {
        self.replay = replay;
        self
    }

    /// Execute the plan to a terminal outcome.
    ///
    /// Agent failures, schema violations, fatal gates, and operator aborts
    /// all fold into a failure outcome that keeps the partial results;
    /// only infrastructure errors (storage, malformed plans) propagate as
    /// `Err`.
    pub async fn run(
        &self,
        plan: &WorkflowPlan,
        inputs: BTreeMap<String, Value>,
        mut run: Run,
    ) -> HarnessResult<WorkflowOutcome> {
        let started = Instant::now();
        let total_steps = plan.step_count();

        log_run_start!(run.id, plan.id, total_steps);
        self.transition(&mut run, RunStatus::Running).await?;

        let mut ctx = RunContext::new(run.id);
        let mut step_index = 0usize;

        for entry in &plan.entries {
            match entry {
                PlanEntry::Step(step) => {
                    step_index += 1;

                    let descriptor = {
                        let args = FactoryArgs::new(&inputs, &run.records);
                        (step.factory)(&args, &mut ctx)?
                    };

                    log_step_start!(run.id, descriptor.step_id, step.title, step_index, total_steps);

                    let result = match self.execute_step(&descriptor, &mut run).await {
                        Ok(result) => result,
                        Err(
                            e @ (HarnessError::AgentInvocation { .. }
                            | HarnessError::SchemaViolation { .. }),
                        ) => {
                            let concerns = concerns_from(&e);
                            return self
                                .finish(plan, run, started, Err((e.to_string(), concerns)))
                                .await;
                        }
                        Err(other) => return Err(other),
                    };

                    for gate in &step.gates {
                        let verdict = gate.evaluate(&result.value);
                        log_gate!(
                            descriptor.step_id,
                            gate.id,
                            verdict.score,
                            gate.threshold,
                            verdict.passed
                        );
                        if verdict.passed {
                            continue;
                        }

                        match gate.severity {
                            GateSeverity::Fatal => {
                                let reason = format!("Quality gate failed: {}", gate.description);
                                let concerns = vec![gate_concern(gate, &verdict, &descriptor)];
                                return self
                                    .finish(plan, run, started, Err((reason, concerns)))
                                    .await;
                            }
                            GateSeverity::Advisory => {
                                run.concerns.push(gate_concern(gate, &verdict, &descriptor));
                                let request = BreakpointRequest {
                                    id: format!("bp_gate_{}", gate.id),
                                    title: format!("Advisory gate '{}' failed", gate.id),
                                    question: format!("{}; continue anyway?", gate.description),
                                    context: self.breakpoint_context(&run, &[]),
                                };
                                if let Some(reason) = self.pause_at(&request, &mut run).await? {
                                    return self
                                        .finish(plan, run, started, Err((reason, Vec::new())))
                                        .await;
                                }
                            }
                        }
                    }
                }

                PlanEntry::Breakpoint(breakpoint) => {
                    let request = BreakpointRequest {
                        id: format!("bp_{}", breakpoint.name),
                        title: breakpoint.title.to_string(),
                        question: breakpoint.question.to_string(),
                        context: self.breakpoint_context(&run, &breakpoint.summary_steps),
                    };
                    if let Some(reason) = self.pause_at(&request, &mut run).await? {
                        return self
                            .finish(plan, run, started, Err((reason, Vec::new())))
                            .await;
                    }
                }
            }
        }

        self.finish(plan, run, started, Ok(())).await
    }

    async fn execute_step(
        &self,
        descriptor: &TaskDescriptor,
        run: &mut Run,
    ) -> HarnessResult<StepResult> {
        if self.replay {
            if let Some(result) = self.executor.try_replay(descriptor, run).await? {
                return Ok(result);
            }
        }
        self.executor.run_step(descriptor, run).await
    }

    /// Raise a breakpoint and wait for the operator. Returns `Some(reason)`
    /// when the run must stop (operator abort).
    async fn pause_at(
        &self,
        request: &BreakpointRequest,
        run: &mut Run,
    ) -> HarnessResult<Option<String>> {
        log_breakpoint_raised!(run.id, request.id, request.title);
        self.transition(run, RunStatus::Paused).await?;
        if let Some(registry) = &self.registry {
            let registry = registry.lock().unwrap();
            registry
                .insert_breakpoint(&run.id, &request.id, &request.title, &request.question)
                .map_err(HarnessError::Other)?;
        }

        let signal = self.gate.pause(request).await?;
        log_breakpoint_resolved!(request.id, signal.decision());

        if let Some(registry) = &self.registry {
            let registry = registry.lock().unwrap();
            let note = match &signal {
                ResumeSignal::Resume { note } | ResumeSignal::Abort { note } => note.as_deref(),
            };
            registry
                .resolve_breakpoint(&run.id, &request.id, signal.decision(), note)
                .map_err(HarnessError::Other)?;
        }

        match signal {
            ResumeSignal::Resume { note } => {
                if let Some(note) = note {
                    run.concerns.push(format!("reviewer note: {}", note));
                }
                self.transition(run, RunStatus::Running).await?;
                Ok(None)
            }
            ResumeSignal::Abort { note } => {
                let err = HarnessError::AbortedAtBreakpoint {
                    breakpoint: request.id.clone(),
                    note,
                };
                Ok(Some(err.to_string()))
            }
        }
    }

    fn breakpoint_context(&self, run: &Run, summary_steps: &[&str]) -> BreakpointContext {
        let mut summary = BTreeMap::new();
        summary.insert("workflow".to_string(), run.workflow_id.clone());
        summary.insert("steps_completed".to_string(), run.step_count().to_string());
        for name in summary_steps {
            if let Some(record) = run
                .records
                .iter()
                .rev()
                .find(|r| r.step_id.ends_with(&format!("_{}", name)))
            {
                let excerpt = record
                    .value
                    .get("summary")
                    .and_then(|v| v.as_str())
                    .unwrap_or("(no summary field)");
                summary.insert(name.to_string(), excerpt.to_string());
            }
        }
        BreakpointContext {
            run_id: run.id,
            summary,
            artifacts: run.artifacts.clone(),
        }
    }

    async fn transition(&self, run: &mut Run, status: RunStatus) -> HarnessResult<()> {
        run.status = status;
        self.executor.store().save_run(run).await?;
        if let Some(registry) = &self.registry {
            let registry = registry.lock().unwrap();
            let ended_at = status.is_terminal().then(Local::now);
            registry
                .update_run_status(&run.id, status, ended_at, run.reason.as_deref())
                .map_err(HarnessError::Other)?;
        }
        Ok(())
    }

    async fn finish(
        &self,
        plan: &WorkflowPlan,
        mut run: Run,
        started: Instant,
        verdict: Result<(), (String, Vec<String>)>,
    ) -> HarnessResult<WorkflowOutcome> {
        let (status, reason) = match &verdict {
            Ok(()) => (RunStatus::Succeeded, None),
            Err((reason, concerns)) => {
                run.concerns.extend(concerns.iter().cloned());
                (RunStatus::Failed, Some(reason.clone()))
            }
        };

        run.reason = reason.clone();
        self.transition(&mut run, status).await?;

        match &reason {
            Some(reason) => log_run_finished!(run.id, status, reason),
            None => log_run_finished!(run.id, status),
        }

        Ok(WorkflowOutcome {
            success: status == RunStatus::Succeeded,
            reason,
            concerns: run.concerns.clone(),
            artifacts: run.artifacts.clone(),
            results: run.records.clone(),
            metadata: RunMetadata {
                process_id: plan.id.to_string(),
                run_id: run.id,
                timestamp: run.started_at,
                duration_ms: started.elapsed().as_millis() as u64,
            },
        })
    }
}

fn gate_concern(gate: &QualityGate, verdict: &GateVerdict, descriptor: &TaskDescriptor) -> String {
    match verdict.score {
        Some(score) => format!(
            "{} at step '{}': score {} below threshold {}",
            gate.description, descriptor.step_id, score, gate.threshold
        ),
        None => format!(
            "{} at step '{}': score field '{}' missing",
            gate.description, descriptor.step_id, gate.score_path
        ),
    }
}

fn concerns_from(error: &HarnessError) -> Vec<String> {
    match error {
        HarnessError::SchemaViolation { violations, .. } => {
            violations.iter().map(|v| v.to_string()).collect()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_score_dot_path() {
        let value = json!({"scores": {"clarity": 62.5}, "flat": 10});
        assert_eq!(lookup_score(&value, "scores.clarity"), Some(62.5));
        assert_eq!(lookup_score(&value, "flat"), Some(10.0));
        assert_eq!(lookup_score(&value, "scores.missing"), None);
        assert_eq!(lookup_score(&value, "scores"), None);
    }

    #[test]
    fn test_gate_evaluation() {
        let gate = QualityGate::fatal("clarity", "scores.clarity", 40.0, "Problem clarity too low");
        let pass = gate.evaluate(&json!({"scores": {"clarity": 40}}));
        assert!(pass.passed);
        let fail = gate.evaluate(&json!({"scores": {"clarity": 39.9}}));
        assert!(!fail.passed);
        assert_eq!(fail.score, Some(39.9));
    }

    #[test]
    fn test_gate_fails_on_missing_score() {
        let gate = QualityGate::advisory("evidence", "scores.evidence", 50.0, "Evidence weak");
        let verdict = gate.evaluate(&json!({"scores": {}}));
        assert!(!verdict.passed);
        assert!(verdict.score.is_none());
    }

    #[test]
    fn test_plan_step_count_ignores_breakpoints() {
        fn noop(_: &FactoryArgs, _: &mut RunContext) -> HarnessResult<TaskDescriptor> {
            unreachable!()
        }
        let plan = WorkflowPlan {
            id: "t",
            name: "t",
            description: "t",
            entries: vec![
                PlanEntry::step("a", "A", noop),
                PlanEntry::breakpoint("review", "Review", "Ok?", vec![]),
                PlanEntry::step("b", "B", noop),
            ],
        };
        assert_eq!(plan.step_count(), 2);
    }
}
