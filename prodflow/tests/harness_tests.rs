//! Integration tests for the orchestration harness
//!
//! Covers the end-to-end properties of the harness:
//! - Step execution, persistence, and replay
//! - Quality gates and short-circuiting with partial results
//! - Breakpoint suspension, resume, and abort
//! - The built-in workflow catalog

mod harness {
    mod common;
    mod test_breakpoints;
    mod test_executor;
    mod test_runner;
    mod test_workflows;
}
