//! Scripted agent backend for tests and dry runs
//!
//! Replays a fixed queue of canned responses and records every invocation, so
//! tests can assert exactly how many agent calls a workflow made and with
//! which prompts.

use super::AgentCapability;
use crate::errors::{HarnessError, HarnessResult};
use crate::task::PromptPayload;
use prodflow_sdk::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct ScriptedAgent {
    responses: Mutex<VecDeque<String>>,
    invocations: Mutex<Vec<(String, PromptPayload)>>,
}

impl ScriptedAgent {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push_back(response.into());
    }

    /// Number of `invoke` calls seen so far.
    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    /// Agent names in invocation order.
    pub fn invoked_agents(&self) -> Vec<String> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|(agent, _)| agent.clone())
            .collect()
    }

    pub fn invocations(&self) -> Vec<(String, PromptPayload)> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentCapability for ScriptedAgent {
    async fn invoke(&self, agent: &str, prompt: &PromptPayload) -> HarnessResult<String> {
        self.invocations
            .lock()
            .unwrap()
            .push((agent.to_string(), prompt.clone()));

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| HarnessError::agent(agent, "scripted responses exhausted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_responses_in_order() {
        let agent = ScriptedAgent::new(["{\"a\": 1}", "{\"b\": 2}"]);
        let payload = PromptPayload::new("tester", "first");

        assert_eq!(agent.invoke("x", &payload).await.unwrap(), "{\"a\": 1}");
        assert_eq!(agent.invoke("y", &payload).await.unwrap(), "{\"b\": 2}");
        assert_eq!(agent.invocation_count(), 2);
        assert_eq!(agent.invoked_agents(), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_agent_error() {
        let agent = ScriptedAgent::new(Vec::<String>::new());
        let payload = PromptPayload::new("tester", "anything");
        let err = agent.invoke("x", &payload).await.unwrap_err();
        assert!(matches!(err, HarnessError::AgentInvocation { .. }));
        // The failed call is still recorded.
        assert_eq!(agent.invocation_count(), 1);
    }
}
