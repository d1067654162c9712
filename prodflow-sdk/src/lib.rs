// Re-export the derive macro
pub use prodflow_macros::WorkflowDefinition;

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export async trait for convenience
pub use async_trait::async_trait;

/// Workflow metadata (id, name, description)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Complete workflow metadata with input fields (for JSON export)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullWorkflowMetadata {
    #[serde(flatten)]
    pub metadata: WorkflowMetadata,
    pub fields: Vec<FieldSchema>,
}

/// Input field schema definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    pub label: String,
    pub description: String,
    pub cli_arg: String,
    pub required: bool,
    pub default: Option<String>,
}

/// Input field type enum
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    FilePath {
        #[serde(skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Select {
        options: Vec<String>,
    },
}

/// Trait that workflow input definitions implement (auto-implemented by derive macro)
pub trait WorkflowDefinition {
    fn metadata() -> WorkflowMetadata;
    fn fields() -> Vec<FieldSchema>;
    fn print_metadata(&self);
}

/// Lifecycle of a single run.
///
/// `Paused` is the only state expected to outlive the hosting process: a run
/// parked at a breakpoint keeps this status in durable storage until an
/// operator resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Paused,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "paused" => Some(RunStatus::Paused),
            "succeeded" => Some(RunStatus::Succeeded),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured logging events emitted by running workflows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowLog {
    /// Run started
    RunStarted {
        run_id: String,
        workflow_id: String,
        total_steps: usize,
    },
    /// Step started
    StepStarted {
        run_id: String,
        step_id: String,
        title: String,
        index: usize,
        total: usize,
    },
    /// Step completed, response validated and persisted
    StepCompleted {
        step_id: String,
        summary: Option<String>,
    },
    /// Step failed
    StepFailed {
        step_id: String,
        error: String,
    },
    /// Quality gate evaluated against a step's validated output
    GateEvaluated {
        step_id: String,
        gate: String,
        score: Option<f64>,
        threshold: f64,
        passed: bool,
    },
    /// Breakpoint raised, run is paused awaiting an operator
    BreakpointRaised {
        run_id: String,
        breakpoint_id: String,
        title: String,
    },
    /// Breakpoint resolved by an operator
    BreakpointResolved {
        breakpoint_id: String,
        decision: String,
    },
    /// Artifact declared by a completed step
    ArtifactRecorded {
        step_id: String,
        path: String,
        format: String,
    },
    /// Run reached a terminal state
    RunFinished {
        run_id: String,
        status: RunStatus,
        reason: Option<String>,
    },
}

impl WorkflowLog {
    /// Emit this log event to stderr for host/monitor parsing
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            use std::io::Write;
            eprintln!("__WF_EVENT__:{}", json);
            // Force flush stderr in async contexts
            let _ = std::io::stderr().flush();
        }
    }
}

/// Helper macros for workflow logging
#[macro_export]
macro_rules! log_run_start {
    ($run_id:expr, $workflow_id:expr, $total:expr) => {
        $crate::WorkflowLog::RunStarted {
            run_id: $run_id.to_string(),
            workflow_id: $workflow_id.to_string(),
            total_steps: $total,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_step_start {
    ($run_id:expr, $step_id:expr, $title:expr, $index:expr, $total:expr) => {
        $crate::WorkflowLog::StepStarted {
            run_id: $run_id.to_string(),
            step_id: $step_id.to_string(),
            title: $title.to_string(),
            index: $index,
            total: $total,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_step_complete {
    ($step_id:expr) => {
        $crate::WorkflowLog::StepCompleted {
            step_id: $step_id.to_string(),
            summary: None,
        }
        .emit();
    };
    ($step_id:expr, $summary:expr) => {
        $crate::WorkflowLog::StepCompleted {
            step_id: $step_id.to_string(),
            summary: Some($summary.to_string()),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_step_failed {
    ($step_id:expr, $error:expr) => {
        $crate::WorkflowLog::StepFailed {
            step_id: $step_id.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_gate {
    ($step_id:expr, $gate:expr, $score:expr, $threshold:expr, $passed:expr) => {
        $crate::WorkflowLog::GateEvaluated {
            step_id: $step_id.to_string(),
            gate: $gate.to_string(),
            score: $score,
            threshold: $threshold,
            passed: $passed,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_breakpoint_raised {
    ($run_id:expr, $breakpoint_id:expr, $title:expr) => {
        $crate::WorkflowLog::BreakpointRaised {
            run_id: $run_id.to_string(),
            breakpoint_id: $breakpoint_id.to_string(),
            title: $title.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_breakpoint_resolved {
    ($breakpoint_id:expr, $decision:expr) => {
        $crate::WorkflowLog::BreakpointResolved {
            breakpoint_id: $breakpoint_id.to_string(),
            decision: $decision.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_artifact {
    ($step_id:expr, $path:expr, $format:expr) => {
        $crate::WorkflowLog::ArtifactRecorded {
            step_id: $step_id.to_string(),
            path: $path.to_string(),
            format: $format.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_run_finished {
    ($run_id:expr, $status:expr) => {
        $crate::WorkflowLog::RunFinished {
            run_id: $run_id.to_string(),
            status: $status,
            reason: None,
        }
        .emit();
    };
    ($run_id:expr, $status:expr, $reason:expr) => {
        $crate::WorkflowLog::RunFinished {
            run_id: $run_id.to_string(),
            status: $status,
            reason: Some($reason.to_string()),
        }
        .emit();
    };
}

// ============================================================================
// Console Logging Macros
// ============================================================================
// Colored human-readable console output, complementing the structured
// WorkflowLog events above.
// ============================================================================

/// Logs an informational message.
///
/// # Example
/// ```
/// use prodflow_sdk::log_info;
/// log_info!("run {} started", "b41c");
/// ```
///
/// Outputs:
/// ```text
/// ℹ run b41c started
/// ```
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs that a file has been saved.
#[macro_export]
macro_rules! log_file_saved {
    ($path:expr) => {
        println!("\x1b[32m✓ Saved: {}\x1b[0m", $path);
    };
}
