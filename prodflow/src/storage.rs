//! Path-addressed JSON blob store, namespaced per run
//!
//! Every run owns a directory under the storage root; step inputs and outputs
//! live at `tasks/<step_id>/input.json` and `tasks/<step_id>/result.json`,
//! the run record at `run.json`, and breakpoint request/resolution files under
//! `breakpoints/<id>/`. The area is append-only per run: no step ever deletes
//! or overwrites another step's output, so no locking is needed.

use crate::errors::{HarnessError, HarnessResult};
use crate::run::Run;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TaskStore {
    root: PathBuf,
}

impl TaskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owned by one run.
    pub fn run_dir(&self, run_id: &Uuid) -> PathBuf {
        self.root.join("runs").join(run_id.to_string())
    }

    pub fn breakpoint_request_rel(breakpoint_id: &str) -> String {
        format!("breakpoints/{}/request.json", breakpoint_id)
    }

    pub fn breakpoint_resolution_rel(breakpoint_id: &str) -> String {
        format!("breakpoints/{}/resolution.json", breakpoint_id)
    }

    /// Serialize `value` as pretty JSON at `rel` inside the run directory,
    /// creating parent directories as needed. Returns the absolute path.
    pub async fn write_json<T: Serialize>(
        &self,
        run_id: &Uuid,
        rel: &str,
        value: &T,
    ) -> HarnessResult<PathBuf> {
        let path = self.run_dir(run_id).join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|source| {
                HarnessError::Storage {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| HarnessError::Other(anyhow::anyhow!("serialization failed: {}", e)))?;
        fs::write(&path, bytes)
            .await
            .map_err(|source| HarnessError::Storage {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    pub async fn read_json<T: DeserializeOwned>(
        &self,
        run_id: &Uuid,
        rel: &str,
    ) -> HarnessResult<T> {
        let path = self.run_dir(run_id).join(rel);
        let content = fs::read_to_string(&path)
            .await
            .map_err(|source| HarnessError::Storage {
                path: path.clone(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|e| {
            HarnessError::Other(anyhow::anyhow!(
                "failed to parse {}: {}",
                path.display(),
                e
            ))
        })
    }

    pub async fn exists(&self, run_id: &Uuid, rel: &str) -> bool {
        fs::try_exists(self.run_dir(run_id).join(rel))
            .await
            .unwrap_or(false)
    }

    /// Persist the run record. Called after every mutation so the durable
    /// state is always current before the next step begins.
    pub async fn save_run(&self, run: &Run) -> HarnessResult<()> {
        self.write_json(&run.id, "run.json", run).await?;
        Ok(())
    }

    pub async fn load_run(&self, run_id: &Uuid) -> HarnessResult<Run> {
        self.read_json(run_id, "run.json").await
    }
}
