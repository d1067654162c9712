//! Human-approval breakpoints
//!
//! A breakpoint suspends a run until an operator resolves it. There is no
//! timeout: this is an approval gate, not a liveness-bounded operation. The
//! durable implementation writes the request under the run directory and
//! polls for a resolution file, so the pause survives a restart of the
//! hosting process and the resolution can come from a different process
//! entirely (`prodflow resolve`).

use crate::errors::{HarnessError, HarnessResult};
use crate::storage::TaskStore;
use crate::task::Artifact;
use prodflow_sdk::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

/// Context bundle shown to the reviewer alongside the question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakpointContext {
    pub run_id: Uuid,
    /// Short named facts pulled from the run so far
    pub summary: BTreeMap<String, String>,
    /// Everything produced up to this point
    pub artifacts: Vec<Artifact>,
}

/// What gets presented to a human reviewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakpointRequest {
    pub id: String,
    pub title: String,
    pub question: String,
    pub context: BreakpointContext,
}

/// The operator's answer. `Abort` is deliberately distinct from `Resume` so a
/// paused run can be terminated cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ResumeSignal {
    Resume {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    Abort {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
}

impl ResumeSignal {
    pub fn decision(&self) -> &'static str {
        match self {
            ResumeSignal::Resume { .. } => "resume",
            ResumeSignal::Abort { .. } => "abort",
        }
    }
}

/// Suspension point between workflow steps.
#[async_trait]
pub trait BreakpointGate: Send + Sync {
    /// Suspend until an operator resolves the request. May pend forever.
    async fn pause(&self, request: &BreakpointRequest) -> HarnessResult<ResumeSignal>;
}

/// Gate that approves everything immediately (non-interactive runs).
pub struct AutoApprove;

#[async_trait]
impl BreakpointGate for AutoApprove {
    async fn pause(&self, _request: &BreakpointRequest) -> HarnessResult<ResumeSignal> {
        Ok(ResumeSignal::Resume { note: None })
    }
}

/// Durable gate: request and resolution are JSON files under the run
/// directory, discovered by polling.
pub struct StoreGate {
    store: TaskStore,
    poll_interval: Duration,
}

impl StoreGate {
    pub fn new(store: TaskStore, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }
}

#[async_trait]
impl BreakpointGate for StoreGate {
    async fn pause(&self, request: &BreakpointRequest) -> HarnessResult<ResumeSignal> {
        let run_id = request.context.run_id;
        let request_rel = TaskStore::breakpoint_request_rel(&request.id);
        let resolution_rel = TaskStore::breakpoint_resolution_rel(&request.id);

        self.store.write_json(&run_id, &request_rel, request).await?;

        loop {
            if self.store.exists(&run_id, &resolution_rel).await {
                return self.store.read_json(&run_id, &resolution_rel).await;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

type PendingBreakpoint = (BreakpointRequest, oneshot::Sender<ResumeSignal>);

/// In-process gate for embedding and tests: each pause surfaces on the paired
/// [`ChannelOperator`] and suspends until it answers.
pub struct ChannelGate {
    tx: mpsc::UnboundedSender<PendingBreakpoint>,
}

pub struct ChannelOperator {
    rx: Mutex<mpsc::UnboundedReceiver<PendingBreakpoint>>,
}

/// One pending request the operator can answer.
pub struct PendingResolution {
    pub request: BreakpointRequest,
    responder: oneshot::Sender<ResumeSignal>,
}

impl PendingResolution {
    pub fn resolve(self, signal: ResumeSignal) {
        let _ = self.responder.send(signal);
    }
}

impl ChannelOperator {
    /// Next pending breakpoint, if any run is currently paused on this gate.
    pub async fn next(&self) -> Option<PendingResolution> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.map(|(request, responder)| PendingResolution {
            request,
            responder,
        })
    }
}

pub fn channel_gate() -> (ChannelGate, ChannelOperator) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelGate { tx }, ChannelOperator { rx: Mutex::new(rx) })
}

#[async_trait]
impl BreakpointGate for ChannelGate {
    async fn pause(&self, request: &BreakpointRequest) -> HarnessResult<ResumeSignal> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send((request.clone(), tx))
            .map_err(|_| HarnessError::Other(anyhow::anyhow!("breakpoint operator disconnected")))?;
        rx.await
            .map_err(|_| HarnessError::Other(anyhow::anyhow!("breakpoint operator disconnected")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request(id: &str, run_id: Uuid) -> BreakpointRequest {
        BreakpointRequest {
            id: id.to_string(),
            title: "Review user stories".to_string(),
            question: "Do the stories cover the launch scope?".to_string(),
            context: BreakpointContext {
                run_id,
                summary: BTreeMap::new(),
                artifacts: vec![Artifact::new("docs/stories.md", "markdown")],
            },
        }
    }

    #[tokio::test]
    async fn test_auto_approve_resumes() {
        let gate = AutoApprove;
        let signal = gate
            .pause(&sample_request("bp_review", Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(signal, ResumeSignal::Resume { note: None });
    }

    #[tokio::test]
    async fn test_channel_gate_roundtrip() {
        let (gate, operator) = channel_gate();
        let request = sample_request("bp_review", Uuid::new_v4());

        let pause = tokio::spawn(async move { gate.pause(&request).await });

        let pending = operator.next().await.unwrap();
        assert_eq!(pending.request.id, "bp_review");
        pending.resolve(ResumeSignal::Abort {
            note: Some("scope creep".to_string()),
        });

        let signal = pause.await.unwrap().unwrap();
        assert_eq!(signal.decision(), "abort");
    }

    #[tokio::test]
    async fn test_store_gate_waits_for_resolution_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path());
        let run_id = Uuid::new_v4();
        let gate = StoreGate::new(store.clone(), Duration::from_millis(10));
        let request = sample_request("bp_review", run_id);

        let pause = tokio::spawn(async move { gate.pause(&request).await });

        // The request file appears, then stays unresolved for a few polls.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pause.is_finished());
        assert!(
            store
                .exists(&run_id, &TaskStore::breakpoint_request_rel("bp_review"))
                .await
        );

        store
            .write_json(
                &run_id,
                &TaskStore::breakpoint_resolution_rel("bp_review"),
                &ResumeSignal::Resume { note: None },
            )
            .await
            .unwrap();

        let signal = pause.await.unwrap().unwrap();
        assert_eq!(signal.decision(), "resume");
    }

    #[test]
    fn test_resume_signal_serde() {
        let json = serde_json::to_string(&ResumeSignal::Abort {
            note: Some("stop".to_string()),
        })
        .unwrap();
        assert!(json.contains("\"decision\":\"abort\""));
        let parsed: ResumeSignal = serde_json::from_str("{\"decision\":\"resume\"}").unwrap();
        assert_eq!(parsed, ResumeSignal::Resume { note: None });
    }
}
