//! HTTP gateway agent backend
//!
//! Posts the prompt payload to an agent gateway service and returns the
//! `output` field of the JSON response as text. The gateway owns its own
//! timeout and retry policy; this client does neither.

use super::AgentCapability;
use crate::errors::{HarnessError, HarnessResult};
use crate::task::PromptPayload;
use prodflow_sdk::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct GatewayAgent {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct InvokeRequest<'a> {
    agent: &'a str,
    prompt: &'a PromptPayload,
}

#[derive(Deserialize)]
struct InvokeResponse {
    output: serde_json::Value,
}

impl GatewayAgent {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn invoke_url(&self) -> String {
        format!("{}/invoke", self.base_url)
    }
}

#[async_trait]
impl AgentCapability for GatewayAgent {
    async fn invoke(&self, agent: &str, prompt: &PromptPayload) -> HarnessResult<String> {
        let request = InvokeRequest { agent, prompt };

        let mut builder = self.client.post(self.invoke_url()).json(&request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HarnessError::agent(agent, format!("gateway request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarnessError::agent(
                agent,
                format!("gateway returned {}: {}", status, body),
            ));
        }

        let parsed: InvokeResponse = response
            .json()
            .await
            .map_err(|e| HarnessError::agent(agent, format!("malformed gateway response: {}", e)))?;

        Ok(parsed.output.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_url_normalizes_trailing_slash() {
        let agent = GatewayAgent::new("http://localhost:8700/", None);
        assert_eq!(agent.invoke_url(), "http://localhost:8700/invoke");
    }

    #[test]
    fn test_request_body_shape() {
        let payload = PromptPayload::new("analyst", "Summarize the cohort data");
        let request = InvokeRequest {
            agent: "pm-analyst",
            prompt: &payload,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["agent"], "pm-analyst");
        assert_eq!(json["prompt"]["role"], "analyst");
        assert_eq!(json["prompt"]["task"], "Summarize the cohort data");
    }
}
