//! The external agent capability boundary
//!
//! The harness treats the generative agent as an opaque, slow, costly
//! dependency: one `invoke` per step, no retries, no rate limiting. Backends
//! return the raw response text; parsing and schema validation happen in the
//! step executor so every backend gets the same fail-closed treatment.

use crate::config::{AgentBackendKind, Config};
use crate::errors::HarnessResult;
use crate::task::PromptPayload;
use anyhow::Result;
use prodflow_sdk::async_trait;
use std::sync::Arc;

pub mod gateway;
pub mod process;
pub mod scripted;

pub use gateway::GatewayAgent;
pub use process::ProcessAgent;
pub use scripted::ScriptedAgent;

/// One call per step. Retries, if any, belong to the caller: agent calls are
/// costly and non-idempotent in side effects such as document writes.
#[async_trait]
pub trait AgentCapability: Send + Sync {
    async fn invoke(&self, agent: &str, prompt: &PromptPayload) -> HarnessResult<String>;
}

/// Build the configured backend.
pub fn from_config(config: &Config) -> Result<Arc<dyn AgentCapability>> {
    match config.agent_backend {
        AgentBackendKind::Process => Ok(Arc::new(ProcessAgent::new(
            &config.agent_cmd,
            &config.agent_args,
        ))),
        AgentBackendKind::Gateway => {
            let url = config.gateway_url.clone().ok_or_else(|| {
                anyhow::anyhow!("PRODFLOW_GATEWAY_URL is required for the gateway backend")
            })?;
            Ok(Arc::new(GatewayAgent::new(url, config.gateway_token.clone())))
        }
    }
}

/// Render a prompt payload as the flat text form CLI-style agents consume.
pub fn render_prompt(agent: &str, payload: &PromptPayload) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("You are {}, acting as: {}.\n\n", agent, payload.role));
    prompt.push_str("## TASK\n");
    prompt.push_str(&payload.task);
    prompt.push_str("\n\n");

    if !payload.context.is_null() {
        prompt.push_str("## CONTEXT\n");
        let rendered = serde_json::to_string_pretty(&payload.context)
            .unwrap_or_else(|_| payload.context.to_string());
        prompt.push_str(&rendered);
        prompt.push_str("\n\n");
    }

    if !payload.instructions.is_empty() {
        prompt.push_str("## INSTRUCTIONS\n");
        for (i, instruction) in payload.instructions.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, instruction));
        }
        prompt.push('\n');
    }

    prompt.push_str("## OUTPUT FORMAT\n");
    prompt.push_str(&payload.output_format);
    prompt.push('\n');
    prompt
}

/// Extract JSON content from markdown code blocks or raw text.
///
/// Handles ```json blocks, generic ``` blocks, and raw JSON text. Agents
/// routinely wrap structured output in fences even when told not to.
pub fn extract_json(text: &str) -> String {
    if let Some(start) = text.find("```json") {
        let json_start = start + 7;
        let json_end = text[json_start..]
            .find("```")
            .map(|pos| pos + json_start)
            .unwrap_or(text.len());
        text[json_start..json_end].trim().to_string()
    } else if let Some(start) = text.find("```") {
        let json_start = start + 3;
        let json_end = text[json_start..]
            .find("```")
            .map(|pos| pos + json_start)
            .unwrap_or(text.len());
        text[json_start..json_end].trim().to_string()
    } else {
        text.trim().to_string()
    }
}
