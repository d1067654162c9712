//! Environment-driven configuration
//!
//! Loaded once at startup: `.env` first (if present), then process
//! environment, then platform defaults for anything unset.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Which agent backend to use for real runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentBackendKind {
    /// Spawn a local agent CLI per invocation
    Process,
    /// POST to an HTTP agent gateway
    Gateway,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the run storage area (`<root>/runs/<run-id>/...`)
    pub storage_root: PathBuf,
    /// Path of the sqlite run registry
    pub database_path: PathBuf,
    pub agent_backend: AgentBackendKind,
    /// Command for the process backend
    pub agent_cmd: String,
    pub agent_args: Vec<String>,
    pub gateway_url: Option<String>,
    pub gateway_token: Option<String>,
    /// How often a paused run polls for a breakpoint resolution
    pub poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let storage_root = match std::env::var("PRODFLOW_STORAGE_ROOT") {
            Ok(root) => PathBuf::from(root),
            Err(_) => default_storage_root().context("could not determine a data directory")?,
        };

        let database_path = std::env::var("PRODFLOW_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| storage_root.join("prodflow.db"));

        let agent_backend = match std::env::var("PRODFLOW_AGENT").as_deref() {
            Ok("gateway") => AgentBackendKind::Gateway,
            Ok("process") | Err(_) => AgentBackendKind::Process,
            Ok(other) => {
                anyhow::bail!("unknown PRODFLOW_AGENT '{}' (expected process|gateway)", other)
            }
        };

        let agent_cmd =
            std::env::var("PRODFLOW_AGENT_CMD").unwrap_or_else(|_| "claude".to_string());
        let agent_args = std::env::var("PRODFLOW_AGENT_ARGS")
            .map(|s| s.split_whitespace().map(|a| a.to_string()).collect())
            .unwrap_or_else(|_| vec!["-p".to_string()]);

        let gateway_url = std::env::var("PRODFLOW_GATEWAY_URL").ok();
        let gateway_token = std::env::var("PRODFLOW_GATEWAY_TOKEN").ok();

        let poll_interval = std::env::var("PRODFLOW_POLL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));

        Ok(Self {
            storage_root,
            database_path,
            agent_backend,
            agent_cmd,
            agent_args,
            gateway_url,
            gateway_token,
            poll_interval,
        })
    }
}

fn default_storage_root() -> Option<PathBuf> {
    use directories::ProjectDirs;

    ProjectDirs::from("com", "prodflow", "prodflow").map(|dirs| dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_storage_root_is_some_on_supported_platforms() {
        assert!(default_storage_root().is_some());
    }
}
