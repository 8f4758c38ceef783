//! `start_match_task` / `get_task_progress` / `stop_task` (§6, §4.6).
//!
//! This binary has no long-running server process to hold a
//! [`TaskRegistry`] across invocations, so `match-start` both runs the
//! task to completion *and* plays the role of the coordinator a server
//! would run in the background: it writes the live [`Progress`] snapshot
//! to `--progress-file` on an interval, and polls `--cancel-file` on the
//! same interval so that a concurrently-running `task-progress` / `stop-task`
//! invocation (pointed at the same files) can observe and cancel it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use linkage_core::{Error, MatchConfig};
use linkage_match::{AttributeGraph, InMemorySecondaryIndex, SecondaryIndex};
use linkage_store::{InMemoryLinkageStore, LinkageStore};
use linkage_tasks::{engine, validate_start, Progress, TaskMode, TaskRegistry, TaskStatus};

use crate::error::{CliError, CliResult};
use crate::fixtures;
use crate::output;

#[derive(Args, Debug)]
pub struct MatchStartArgs {
    /// JSON file holding the PRIMARY units (`Vec<Unit>`).
    #[arg(long)]
    pub primary: PathBuf,
    /// JSON file holding the SECONDARY units (`Vec<Unit>`).
    #[arg(long)]
    pub secondary: PathBuf,
    /// JSON file holding/receiving `linkage_results` (`Vec<LinkageResult>`).
    #[arg(long)]
    pub store: PathBuf,
    /// `incremental`, `update`, or `full`.
    #[arg(long)]
    pub mode: String,
    /// Clear the store before running, even outside `full` mode.
    #[arg(long)]
    pub clear_existing: bool,
    /// Where live progress is written, polled by `task-progress` (default:
    /// `<store>.progress.json`).
    #[arg(long)]
    pub progress_file: Option<PathBuf>,
    /// Sentinel file whose existence requests cancellation, written by
    /// `stop-task` (default: `<store>.cancel`).
    #[arg(long)]
    pub cancel_file: Option<PathBuf>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub workers_per_page: Option<usize>,
    #[arg(long)]
    pub theta1: Option<f64>,
    #[arg(long)]
    pub theta2: Option<f64>,
    #[arg(long)]
    pub name_core_hard_gate: Option<f64>,
    #[arg(long)]
    pub candidate_cap_k: Option<usize>,
    #[arg(long)]
    pub text_search_limit_t: Option<usize>,
    #[arg(long)]
    pub per_record_deadline_ms: Option<u64>,
    #[arg(long)]
    pub task_deadline_secs: Option<u64>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct TaskProgressArgs {
    /// Progress file written by a running `match-start` invocation.
    #[arg(long)]
    pub progress_file: PathBuf,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StopTaskArgs {
    /// Cancel sentinel polled by the running `match-start` invocation.
    #[arg(long)]
    pub cancel_file: PathBuf,
    /// Progress file, used only to reject stopping an already-terminal task.
    #[arg(long)]
    pub progress_file: PathBuf,
}

const POLL_INTERVAL: Duration = Duration::from_millis(500);

fn apply_overrides(mut config: MatchConfig, args: &MatchStartArgs) -> MatchConfig {
    if let Some(v) = args.batch_size {
        config.batch_size = v;
    }
    if let Some(v) = args.workers_per_page {
        config.workers_per_page = v;
    }
    if let Some(v) = args.theta1 {
        config.theta1 = v;
    }
    if let Some(v) = args.theta2 {
        config.theta2 = v;
    }
    if let Some(v) = args.name_core_hard_gate {
        config.name_core_hard_gate = v;
    }
    if let Some(v) = args.candidate_cap_k {
        config.candidate_cap_k = v;
    }
    if let Some(v) = args.text_search_limit_t {
        config.text_search_limit_t = v;
    }
    if let Some(v) = args.per_record_deadline_ms {
        config.per_record_deadline_ms = v;
    }
    if args.task_deadline_secs.is_some() {
        config.task_deadline_secs = args.task_deadline_secs;
    }
    config
}

fn default_sibling(store: &Path, suffix: &str) -> PathBuf {
    let mut path = store.as_os_str().to_os_string();
    path.push(suffix);
    PathBuf::from(path)
}

pub async fn run(args: MatchStartArgs) -> CliResult<()> {
    let primary = fixtures::load_units(&args.primary)?;
    let secondary = fixtures::load_units(&args.secondary)?;
    let existing_results = fixtures::load_results(&args.store)?;
    let progress_file = args.progress_file.clone().unwrap_or_else(|| default_sibling(&args.store, ".progress.json"));
    let cancel_file = args.cancel_file.clone().unwrap_or_else(|| default_sibling(&args.store, ".cancel"));
    let _ = std::fs::remove_file(&cancel_file);

    let config = apply_overrides(MatchConfig::default(), &args);
    let primary_source = linkage_tasks::InMemoryPrimarySource::new(primary);
    let secondary_index = InMemorySecondaryIndex::build(secondary);
    let linkage_store = InMemoryLinkageStore::new();
    for result in existing_results {
        linkage_store.upsert(result).await.map_err(linkage_core::Error::from)?;
    }
    let recent = secondary_index.recent(config.graph_build_limit).await.map_err(|e| {
        CliError::Domain(Error::Internal(format!("failed building L4 graph: {e}")))
    })?;
    let graph = AttributeGraph::build(recent.iter());

    let registry = TaskRegistry::new();
    let ctx = engine::EngineContext {
        primary_source: &primary_source,
        secondary_index: &secondary_index,
        graph: &graph,
        linkage_store: &linkage_store,
        config,
    };

    let (mode, total) = validate_start(&ctx, &args.mode).await?;
    if args.clear_existing && mode != TaskMode::Full {
        linkage_store.clear_all().await.map_err(linkage_core::Error::from)?;
    }
    let task_id = format!("task-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%.6f"));
    let state = registry.register(task_id.clone(), mode, total)?;
    tracing::info!(task_id = %task_id, mode = mode.as_str(), total, "starting match task");

    let run_fut = engine::run_with_deadline(state.clone(), ctx);
    tokio::pin!(run_fut);
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.tick().await; // first tick fires immediately
    loop {
        tokio::select! {
            () = &mut run_fut => break,
            _ = ticker.tick() => {
                let _ = std::fs::write(&progress_file, serde_json::to_string_pretty(&state.progress())?);
                if cancel_file.exists() {
                    state.request_cancel();
                }
            }
        }
    }
    registry.release_slot_for(&task_id);

    let final_progress = state.progress();
    tracing::info!(task_id = %task_id, status = %final_progress.status, processed = final_progress.processed, "match task finished");
    std::fs::write(&progress_file, serde_json::to_string_pretty(&final_progress)?)
        .map_err(|source| CliError::WriteFile { path: progress_file.display().to_string(), source })?;

    let page = linkage_store
        .iter_pending(linkage_store::ResultFilter::default(), 0, usize::MAX)
        .await
        .map_err(linkage_core::Error::from)?;
    fixtures::save_results(&args.store, &page.items)?;

    output::json_or_table(args.json, &final_progress, || {
        output::success(&format!("task {task_id} finished: {}", final_progress.status));
        output::kv("processed", &final_progress.processed.to_string());
        output::kv("matched", &final_progress.matched.to_string());
        output::kv("skipped", &final_progress.skipped.to_string());
        output::kv("errored", &final_progress.errored.to_string());
    });
    Ok(())
}

pub fn progress(args: TaskProgressArgs) -> CliResult<()> {
    if !args.progress_file.exists() {
        return Err(CliError::Domain(Error::UnknownTask(args.progress_file.display().to_string())));
    }
    let text = std::fs::read_to_string(&args.progress_file)
        .map_err(|source| CliError::ReadFile { path: args.progress_file.display().to_string(), source })?;
    let snapshot: Progress = serde_json::from_str(&text)
        .map_err(|source| CliError::Parse { path: args.progress_file.display().to_string(), source })?;

    output::json_or_table(args.json, &snapshot, || {
        output::kv("task_id", &snapshot.task_id);
        output::kv("status", &snapshot.status);
        output::kv("progress_percent", &format!("{:.1}", snapshot.progress_percent));
        output::kv("processed", &format!("{}/{}", snapshot.processed, snapshot.total));
        output::kv("matched", &snapshot.matched.to_string());
        output::kv("match_rate", &format!("{:.2}", snapshot.match_rate));
        if let Some(eta) = snapshot.estimated_remaining_seconds {
            output::kv("eta_seconds", &format!("{eta:.1}"));
        }
    });
    Ok(())
}

pub fn stop(args: StopTaskArgs) -> CliResult<()> {
    if !args.progress_file.exists() {
        return Err(CliError::Domain(Error::UnknownTask(args.progress_file.display().to_string())));
    }
    let text = std::fs::read_to_string(&args.progress_file)
        .map_err(|source| CliError::ReadFile { path: args.progress_file.display().to_string(), source })?;
    let snapshot: Progress = serde_json::from_str(&text)
        .map_err(|source| CliError::Parse { path: args.progress_file.display().to_string(), source })?;
    if snapshot.status != TaskStatus::Running.as_str() {
        return Err(CliError::Domain(Error::TaskNotRunning(snapshot.task_id)));
    }
    std::fs::write(&args.cancel_file, b"")
        .map_err(|source| CliError::WriteFile { path: args.cancel_file.display().to_string(), source })?;
    output::success(&format!("cancellation requested for {}", snapshot.task_id));
    Ok(())
}
