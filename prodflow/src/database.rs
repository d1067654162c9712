//! SQLite registry for run and breakpoint history
//!
//! Durable record of every run: status transitions, input parameters, and the
//! breakpoints raised along the way. The registry backs `prodflow status` and
//! `prodflow history`; the JSON files under the run directory remain the
//! source of truth for step payloads.
//!
//! Tables:
//!
//! 1. **runs** - run lifecycle (workflow id, status, timestamps, failure reason)
//! 2. **run_params** - input parameters used for each run
//! 3. **breakpoints** - raised/resolved breakpoints with operator decisions
//! 4. **schema_version** - schema version for migrations

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use prodflow_sdk::RunStatus;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

pub struct Database {
    conn: Connection,
}

/// One row of the `runs` table.
#[derive(Debug, Clone)]
pub struct RunRow {
    pub id: Uuid,
    pub workflow_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
    pub reason: Option<String>,
}

/// One row of the `breakpoints` table.
#[derive(Debug, Clone)]
pub struct BreakpointRow {
    pub id: String,
    pub run_id: Uuid,
    pub title: String,
    pub question: String,
    pub raised_at: DateTime<Local>,
    pub resolved_at: Option<DateTime<Local>>,
    pub decision: Option<String>,
    pub note: Option<String>,
}

/// Success/failure counts for one workflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

fn parse_time(s: &str) -> Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Local))
        .with_context(|| format!("invalid timestamp '{}'", s))
}

fn parse_status(s: &str) -> Result<RunStatus> {
    RunStatus::parse(s).ok_or_else(|| anyhow!("unknown run status '{}'", s))
}

impl Database {
    /// Open (creating if needed) the registry at the given path.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for better concurrent access across runs
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self { conn })
    }

    /// In-memory registry, used by tests and short-lived embeddings.
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    pub fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,

                workflow_id TEXT NOT NULL,

                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                reason TEXT,

                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_runs_workflow_id ON runs(workflow_id);
            CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status);
            CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at DESC);

            CREATE TABLE IF NOT EXISTS run_params (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                param_name TEXT NOT NULL,
                param_value TEXT NOT NULL,

                FOREIGN KEY(run_id) REFERENCES runs(id) ON DELETE CASCADE,
                UNIQUE(run_id, param_name)
            );

            CREATE INDEX IF NOT EXISTS idx_params_run_id ON run_params(run_id);

            CREATE TABLE IF NOT EXISTS breakpoints (
                id TEXT NOT NULL,
                run_id TEXT NOT NULL,
                title TEXT NOT NULL,
                question TEXT NOT NULL,
                raised_at TEXT NOT NULL,
                resolved_at TEXT,
                decision TEXT,
                note TEXT,

                PRIMARY KEY(run_id, id),
                FOREIGN KEY(run_id) REFERENCES runs(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_breakpoints_run_id ON breakpoints(run_id);

            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (1)",
            [],
        )?;

        Ok(())
    }

    pub fn insert_run(&self, run: &RunRow) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO runs (id, workflow_id, status, started_at, ended_at, reason)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                run.id.to_string(),
                run.workflow_id,
                run.status.as_str(),
                run.started_at.to_rfc3339(),
                run.ended_at.map(|t| t.to_rfc3339()),
                run.reason,
            ],
        )?;
        Ok(())
    }

    pub fn update_run_status(
        &self,
        run_id: &Uuid,
        status: RunStatus,
        ended_at: Option<DateTime<Local>>,
        reason: Option<&str>,
    ) -> Result<()> {
        let updated = self.conn.execute(
            r#"
            UPDATE runs
            SET status = ?2, ended_at = ?3, reason = ?4, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?1
            "#,
            params![
                run_id.to_string(),
                status.as_str(),
                ended_at.map(|t| t.to_rfc3339()),
                reason,
            ],
        )?;
        if updated == 0 {
            return Err(anyhow!("run {} not found", run_id));
        }
        Ok(())
    }

    pub fn get_run(&self, run_id: &Uuid) -> Result<Option<RunRow>> {
        let row: Option<(String, String, String, String, Option<String>, Option<String>)> = self
            .conn
            .query_row(
                r#"
                SELECT id, workflow_id, status, started_at, ended_at, reason
                FROM runs WHERE id = ?1
                "#,
                params![run_id.to_string()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(Self::run_from_columns).transpose()
    }

    pub fn list_runs(&self, limit: usize, workflow_id: Option<&str>) -> Result<Vec<RunRow>> {
        let mut rows = Vec::new();

        let collect = |raw: (String, String, String, String, Option<String>, Option<String>)| {
            Self::run_from_columns(raw)
        };

        match workflow_id {
            Some(workflow_id) => {
                let mut stmt = self.conn.prepare(
                    r#"
                    SELECT id, workflow_id, status, started_at, ended_at, reason
                    FROM runs WHERE workflow_id = ?1
                    ORDER BY started_at DESC LIMIT ?2
                    "#,
                )?;
                let mapped = stmt.query_map(params![workflow_id, limit], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                })?;
                for raw in mapped {
                    rows.push(collect(raw?)?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(
                    r#"
                    SELECT id, workflow_id, status, started_at, ended_at, reason
                    FROM runs ORDER BY started_at DESC LIMIT ?1
                    "#,
                )?;
                let mapped = stmt.query_map(params![limit], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                })?;
                for raw in mapped {
                    rows.push(collect(raw?)?);
                }
            }
        }

        Ok(rows)
    }

    fn run_from_columns(
        (id, workflow_id, status, started_at, ended_at, reason): (
            String,
            String,
            String,
            String,
            Option<String>,
            Option<String>,
        ),
    ) -> Result<RunRow> {
        Ok(RunRow {
            id: Uuid::parse_str(&id).with_context(|| format!("invalid run id '{}'", id))?,
            workflow_id,
            status: parse_status(&status)?,
            started_at: parse_time(&started_at)?,
            ended_at: ended_at.as_deref().map(parse_time).transpose()?,
            reason,
        })
    }

    pub fn insert_params(&self, run_id: &Uuid, param: &BTreeMap<String, String>) -> Result<()> {
        for (name, value) in param {
            self.conn.execute(
                r#"
                INSERT OR REPLACE INTO run_params (run_id, param_name, param_value)
                VALUES (?1, ?2, ?3)
                "#,
                params![run_id.to_string(), name, value],
            )?;
        }
        Ok(())
    }

    pub fn get_params(&self, run_id: &Uuid) -> Result<BTreeMap<String, String>> {
        let mut stmt = self.conn.prepare(
            "SELECT param_name, param_value FROM run_params WHERE run_id = ?1",
        )?;
        let mapped = stmt.query_map(params![run_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut params_map = BTreeMap::new();
        for pair in mapped {
            let (name, value) = pair?;
            params_map.insert(name, value);
        }
        Ok(params_map)
    }

    pub fn insert_breakpoint(
        &self,
        run_id: &Uuid,
        breakpoint_id: &str,
        title: &str,
        question: &str,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO breakpoints (id, run_id, title, question, raised_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                breakpoint_id,
                run_id.to_string(),
                title,
                question,
                Local::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn resolve_breakpoint(
        &self,
        run_id: &Uuid,
        breakpoint_id: &str,
        decision: &str,
        note: Option<&str>,
    ) -> Result<()> {
        let updated = self.conn.execute(
            r#"
            UPDATE breakpoints
            SET resolved_at = ?3, decision = ?4, note = ?5
            WHERE run_id = ?1 AND id = ?2
            "#,
            params![
                run_id.to_string(),
                breakpoint_id,
                Local::now().to_rfc3339(),
                decision,
                note,
            ],
        )?;
        if updated == 0 {
            return Err(anyhow!(
                "breakpoint '{}' not found for run {}",
                breakpoint_id,
                run_id
            ));
        }
        Ok(())
    }

    /// The unresolved breakpoint a paused run is waiting on, if any.
    pub fn pending_breakpoint(&self, run_id: &Uuid) -> Result<Option<BreakpointRow>> {
        let row: Option<(String, String, String, String, String)> = self
            .conn
            .query_row(
                r#"
                SELECT id, run_id, title, question, raised_at
                FROM breakpoints
                WHERE run_id = ?1 AND resolved_at IS NULL
                ORDER BY raised_at DESC LIMIT 1
                "#,
                params![run_id.to_string()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, run_id, title, question, raised_at)| {
            Ok(BreakpointRow {
                id,
                run_id: Uuid::parse_str(&run_id)?,
                title,
                question,
                raised_at: parse_time(&raised_at)?,
                resolved_at: None,
                decision: None,
                note: None,
            })
        })
        .transpose()
    }

    pub fn workflow_stats(&self, workflow_id: &str) -> Result<WorkflowStats> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM runs WHERE workflow_id = ?1 GROUP BY status",
        )?;
        let mapped = stmt.query_map(params![workflow_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?))
        })?;

        let mut stats = WorkflowStats::default();
        for pair in mapped {
            let (status, count) = pair?;
            stats.total += count;
            match status.as_str() {
                "succeeded" => stats.succeeded += count,
                "failed" => stats.failed += count,
                _ => {}
            }
        }
        Ok(stats)
    }
}
