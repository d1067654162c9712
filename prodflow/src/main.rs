//! prodflow CLI
//!
//! Invocation surface for the built-in workflows: list and describe them,
//! start runs, resolve breakpoints from a second terminal, and inspect run
//! history.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use prodflow::agent;
use prodflow::breakpoint::{AutoApprove, BreakpointGate, ResumeSignal, StoreGate};
use prodflow::config::Config;
use prodflow::database::{Database, RunRow};
use prodflow::executor::StepExecutor;
use prodflow::run::Run;
use prodflow::runner::WorkflowRunner;
use prodflow::storage::TaskStore;
use prodflow::workflows;
use prodflow_sdk::{log_file_saved, log_info, log_warning, RunStatus};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "prodflow", version, about = "Agent-driven product-management document workflows")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the available workflows
    List {
        /// Emit machine-readable metadata
        #[arg(long)]
        json: bool,
    },
    /// Show a workflow's inputs and step sequence
    Describe { id: String },
    /// Start (or re-enter) a workflow run
    Run {
        id: String,
        /// Workflow inputs as key=value, repeatable
        #[arg(long = "set", value_parser = parse_key_val)]
        set: Vec<(String, String)>,
        /// Approve every breakpoint automatically
        #[arg(long)]
        yes: bool,
        /// Re-enter an existing run, replaying persisted step results
        #[arg(long)]
        rerun: Option<Uuid>,
    },
    /// Resolve the pending breakpoint of a paused run
    Resolve {
        run_id: Uuid,
        /// Let the run continue
        #[arg(long)]
        approve: bool,
        /// Terminate the run
        #[arg(long)]
        abort: bool,
        /// Note for the run record
        #[arg(long)]
        note: Option<String>,
    },
    /// Show the persisted state of a run
    Status {
        run_id: Uuid,
        /// Render as YAML instead of a summary
        #[arg(long)]
        yaml: bool,
    },
    /// List recent runs from the registry
    History {
        #[arg(long)]
        workflow: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::List { json } => cmd_list(json),
        Command::Describe { id } => cmd_describe(&id),
        Command::Run { id, set, yes, rerun } => cmd_run(&id, set, yes, rerun).await,
        Command::Resolve {
            run_id,
            approve,
            abort,
            note,
        } => cmd_resolve(run_id, approve, abort, note).await,
        Command::Status { run_id, yaml } => cmd_status(run_id, yaml).await,
        Command::History { workflow, limit } => cmd_history(workflow.as_deref(), limit),
    }
}

fn cmd_list(json: bool) -> Result<()> {
    if json {
        let all: Vec<_> = workflows::catalog()
            .iter()
            .filter_map(|p| workflows::metadata(p.id))
            .collect();
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }

    for plan in workflows::catalog() {
        println!("{:<12} {} - {}", plan.id, plan.name, plan.description);
    }
    Ok(())
}

fn cmd_describe(id: &str) -> Result<()> {
    let Some(metadata) = workflows::metadata(id) else {
        bail!("unknown workflow '{}'", id);
    };
    let plan = workflows::find(id).expect("metadata implies a plan");

    println!("{} - {}", metadata.metadata.name, metadata.metadata.description);
    println!("\nInputs:");
    for field in &metadata.fields {
        let required = if field.required { "required" } else { "optional" };
        let default = field
            .default
            .as_deref()
            .map(|d| format!(", default: {}", d))
            .unwrap_or_default();
        println!(
            "  {:<18} {} ({}{})",
            field.name, field.description, required, default
        );
    }

    println!("\nSteps:");
    for entry in &plan.entries {
        match entry {
            prodflow::runner::PlanEntry::Step(step) => {
                let gates = if step.gates.is_empty() {
                    String::new()
                } else {
                    format!(
                        "  [gates: {}]",
                        step.gates
                            .iter()
                            .map(|g| g.id)
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                };
                println!("  step        {}{}", step.title, gates);
            }
            prodflow::runner::PlanEntry::Breakpoint(bp) => {
                println!("  breakpoint  {}", bp.title);
            }
        }
    }
    Ok(())
}

async fn cmd_run(
    id: &str,
    set: Vec<(String, String)>,
    yes: bool,
    rerun: Option<Uuid>,
) -> Result<()> {
    let Some(plan) = workflows::find(id) else {
        bail!("unknown workflow '{}' (see `prodflow list`)", id);
    };

    let raw: BTreeMap<String, String> = set.into_iter().collect();
    let inputs = workflows::validate_inputs(id, &raw)?;

    let config = Config::from_env()?;
    let store = TaskStore::new(&config.storage_root);
    let registry = Database::new(config.database_path.clone())?;
    registry.initialize_schema()?;

    let run = match rerun {
        Some(run_id) => {
            let previous = store
                .load_run(&run_id)
                .await
                .with_context(|| format!("no persisted run {}", run_id))?;
            if previous.workflow_id != id {
                bail!(
                    "run {} belongs to workflow '{}', not '{}'",
                    run_id,
                    previous.workflow_id,
                    id
                );
            }
            if registry.get_run(&run_id)?.is_none() {
                registry.insert_run(&RunRow {
                    id: run_id,
                    workflow_id: id.to_string(),
                    status: RunStatus::Pending,
                    started_at: previous.started_at,
                    ended_at: None,
                    reason: None,
                })?;
            }
            log_info!("re-entering run {}, replaying persisted steps", run_id);
            // Fresh record under the same id; replay repopulates it from the
            // persisted step results.
            Run::with_id(run_id, id)
        }
        None => {
            let run = Run::new(id);
            registry.insert_run(&RunRow {
                id: run.id,
                workflow_id: id.to_string(),
                status: RunStatus::Pending,
                started_at: run.started_at,
                ended_at: None,
                reason: None,
            })?;
            registry.insert_params(&run.id, &raw)?;
            run
        }
    };

    let run_id = run.id;
    log_info!("run {} started for workflow '{}'", run_id, id);

    let agent = agent::from_config(&config)?;
    let gate: Arc<dyn BreakpointGate> = if yes {
        Arc::new(AutoApprove)
    } else {
        log_info!(
            "breakpoints pause the run; resolve them with `prodflow resolve {} --approve`",
            run_id
        );
        Arc::new(StoreGate::new(store.clone(), config.poll_interval))
    };

    let executor = StepExecutor::new(store.clone(), agent);
    let runner = WorkflowRunner::new(executor, gate)
        .with_registry(Arc::new(Mutex::new(registry)))
        .with_replay(rerun.is_some());

    let outcome = runner.run(&plan, inputs, run).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if outcome.success {
        log_info!("run {} succeeded with {} artifact(s)", run_id, outcome.artifacts.len());
    } else {
        log_warning!(
            "run {} failed: {}",
            run_id,
            outcome.reason.as_deref().unwrap_or("unknown reason")
        );
    }
    log_file_saved!(store.run_dir(&run_id).join("run.json").display());
    Ok(())
}

async fn cmd_resolve(
    run_id: Uuid,
    approve: bool,
    abort: bool,
    note: Option<String>,
) -> Result<()> {
    if approve == abort {
        bail!("pass exactly one of --approve or --abort");
    }

    let config = Config::from_env()?;
    let store = TaskStore::new(&config.storage_root);
    let registry = Database::new(config.database_path.clone())?;
    registry.initialize_schema()?;

    let Some(pending) = registry.pending_breakpoint(&run_id)? else {
        bail!("run {} has no pending breakpoint", run_id);
    };

    let signal = if approve {
        ResumeSignal::Resume { note }
    } else {
        ResumeSignal::Abort { note }
    };

    let path = store
        .write_json(
            &run_id,
            &TaskStore::breakpoint_resolution_rel(&pending.id),
            &signal,
        )
        .await?;

    log_info!(
        "breakpoint '{}' ({}) resolved: {}",
        pending.id,
        pending.title,
        signal.decision()
    );
    log_file_saved!(path.display());
    Ok(())
}

async fn cmd_status(run_id: Uuid, yaml: bool) -> Result<()> {
    let config = Config::from_env()?;
    let store = TaskStore::new(&config.storage_root);

    let run = store
        .load_run(&run_id)
        .await
        .with_context(|| format!("no persisted run {}", run_id))?;

    if yaml {
        println!("{}", serde_yaml::to_string(&run)?);
        return Ok(());
    }

    println!("run:       {}", run.id);
    println!("workflow:  {}", run.workflow_id);
    println!("status:    {}", run.status);
    println!("started:   {}", run.started_at.format("%Y-%m-%d %H:%M:%S"));
    println!("steps:     {}", run.step_count());
    if let Some(reason) = &run.reason {
        println!("reason:    {}", reason);
    }
    if !run.artifacts.is_empty() {
        println!("artifacts:");
        for artifact in &run.artifacts {
            println!("  {} ({})", artifact.path, artifact.format);
        }
    }
    if !run.concerns.is_empty() {
        println!("concerns:");
        for concern in &run.concerns {
            println!("  {}", concern);
        }
    }
    Ok(())
}

fn cmd_history(workflow: Option<&str>, limit: usize) -> Result<()> {
    let config = Config::from_env()?;
    let registry = Database::new(config.database_path.clone())?;
    registry.initialize_schema()?;

    let runs = registry.list_runs(limit, workflow)?;
    if runs.is_empty() {
        log_info!("no runs recorded");
        return Ok(());
    }

    for run in runs {
        println!(
            "{}  {:<12} {:<10} {}",
            run.started_at.format("%Y-%m-%d %H:%M"),
            run.workflow_id,
            run.status.to_string(),
            run.id
        );
        if let Some(reason) = run.reason {
            println!("{:>18}{}", "", reason);
        }
    }
    Ok(())
}
