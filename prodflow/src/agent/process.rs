//! Subprocess agent backend
//!
//! Spawns a configured agent CLI, writes the rendered prompt to its stdin,
//! and collects stdout line by line until the process exits. The agent name
//! is appended as the final argument so one binary can host several agent
//! personas.

use super::{render_prompt, AgentCapability};
use crate::errors::{HarnessError, HarnessResult};
use crate::task::PromptPayload;
use prodflow_sdk::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct ProcessAgent {
    command: String,
    args: Vec<String>,
}

impl ProcessAgent {
    pub fn new(command: impl Into<String>, args: &[String]) -> Self {
        Self {
            command: command.into(),
            args: args.to_vec(),
        }
    }
}

#[async_trait]
impl AgentCapability for ProcessAgent {
    async fn invoke(&self, agent: &str, prompt: &PromptPayload) -> HarnessResult<String> {
        let rendered = render_prompt(agent, prompt);

        let mut cmd = Command::new(&self.command);
        for arg in &self.args {
            cmd.arg(arg);
        }
        cmd.arg(agent);

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                HarnessError::agent(agent, format!("failed to spawn '{}': {}", self.command, e))
            })?;

        // Write prompt to stdin and close it
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(rendered.as_bytes())
                .await
                .map_err(|e| HarnessError::agent(agent, format!("failed to write prompt: {}", e)))?;
            stdin
                .shutdown()
                .await
                .map_err(|e| HarnessError::agent(agent, format!("failed to close stdin: {}", e)))?;
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HarnessError::agent(agent, "no stdout available"))?;
        let mut reader = BufReader::new(stdout).lines();

        let mut output = String::new();
        while let Some(line) = reader
            .next_line()
            .await
            .map_err(|e| HarnessError::agent(agent, format!("failed to read output: {}", e)))?
        {
            output.push_str(&line);
            output.push('\n');
        }

        let status = child
            .wait()
            .await
            .map_err(|e| HarnessError::agent(agent, format!("failed to wait for process: {}", e)))?;

        if !status.success() {
            return Err(HarnessError::agent(
                agent,
                format!("process exited with code {}", status.code().unwrap_or(-1)),
            ));
        }

        Ok(output)
    }
}
