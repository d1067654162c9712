//! Typed error hierarchy for the orchestration harness.
//!
//! Workflow and CLI code uses `anyhow` on top of these; the harness itself
//! keeps the taxonomy typed so callers can branch on what went wrong.

use crate::schema::Violation;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the orchestration harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A task descriptor factory received a malformed arguments mapping.
    /// Not retryable; a caller error.
    #[error("Invalid arguments for {scope}: {message}")]
    InvalidArgument { scope: String, message: String },

    /// The external agent capability failed or timed out.
    #[error("Agent '{agent}' invocation failed: {message}")]
    AgentInvocation { agent: String, message: String },

    /// The agent response did not conform to the declared output schema.
    /// Carries every violation found, not just the first.
    #[error("Step '{step}' response violated its output schema ({n} violation(s))", n = .violations.len())]
    SchemaViolation {
        step: String,
        violations: Vec<Violation>,
    },

    /// An operator terminated a paused run.
    #[error("Run aborted at breakpoint '{breakpoint}'")]
    AbortedAtBreakpoint {
        breakpoint: String,
        note: Option<String>,
    },

    #[error("Storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HarnessError {
    pub fn invalid(scope: impl Into<String>, message: impl Into<String>) -> Self {
        HarnessError::InvalidArgument {
            scope: scope.into(),
            message: message.into(),
        }
    }

    pub fn agent(agent: impl Into<String>, message: impl Into<String>) -> Self {
        HarnessError::AgentInvocation {
            agent: agent.into(),
            message: message.into(),
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
