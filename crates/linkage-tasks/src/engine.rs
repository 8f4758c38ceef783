//! Execution contract for a single batch task (§4.6).

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use linkage_core::{Error, LinkageResult, MatchConfig, MatchType, Result, ReviewStatus, Unit};
use linkage_match::{match_record, AttributeGraph, SecondaryIndex};
use linkage_store::retry::with_backoff;
use linkage_store::{LinkageStore, StoreError};
use tracing::{info, warn};

use crate::primary_source::PrimarySource;
use crate::task::{TaskMode, TaskState, TaskStatus};

/// The handful of read/write collaborators a task needs; borrowed for the
/// duration of one `run` call (§9: workers return to a coordinator that
/// owns flush and counter updates, no shared mutable state beyond the
/// cancellation flag).
pub struct EngineContext<'a> {
    pub primary_source: &'a dyn PrimarySource,
    pub secondary_index: &'a dyn SecondaryIndex,
    pub graph: &'a AttributeGraph,
    pub linkage_store: &'a dyn LinkageStore,
    pub config: MatchConfig,
}

/// Snapshot the `total` counter for the chosen mode (§4.6 step 1):
/// `full`/`update` count every PRIMARY record, `incremental` counts only
/// those without an existing `LinkageResult`.
pub async fn snapshot_total(ctx: &EngineContext<'_>, mode: TaskMode) -> Result<u64> {
    match mode {
        TaskMode::Full | TaskMode::Update => Ok(ctx.primary_source.total_count().await? as u64),
        TaskMode::Incremental => {
            let mut total = 0u64;
            let mut cursor: Option<String> = None;
            loop {
                let page = ctx.primary_source.page(cursor.as_deref(), 1000).await?;
                if page.is_empty() {
                    break;
                }
                for unit in &page {
                    if !ctx.linkage_store.has_result(&unit.id).await.map_err(linkage_core::Error::from)? {
                        total += 1;
                    }
                }
                cursor = page.last().map(|u| u.id.clone());
            }
            Ok(total)
        }
    }
}

/// Build the `LinkageResult` for one primary record, preserving a prior
/// human review across `update`-mode reprocessing (§9 Open Questions: the
/// conservative choice is to preserve `review_status`/`review_notes`/
/// `reviewer`/`review_timestamp` across `update`, and to overwrite them in
/// `full`, where no prior row can exist because `clear_all` already ran).
fn build_result(
    primary: Unit,
    outcome: &linkage_match::MatchOutcome,
    existing: Option<&LinkageResult>,
    now: chrono::DateTime<Utc>,
) -> LinkageResult {
    let matched_id = outcome.matched.as_ref().map(|m| m.id.clone());
    let match_id = LinkageResult::derive_match_id(&primary.id, matched_id.as_deref());
    let created_time = existing.map_or(now, |e| e.created_time);

    let (review_status, review_notes, reviewer, review_timestamp) = match existing {
        Some(e) if e.review_status != ReviewStatus::Pending => {
            (e.review_status, e.review_notes.clone(), e.reviewer.clone(), e.review_timestamp)
        }
        _ => (ReviewStatus::Pending, None, None, None),
    };

    LinkageResult {
        match_id,
        primary_id: primary.id.clone(),
        primary_snapshot: primary,
        matched_id,
        matched_snapshot: outcome.matched.clone(),
        match_type: outcome.match_type,
        similarity_score: outcome.score,
        match_confidence: outcome.confidence,
        match_explanation: outcome.explanation.clone(),
        review_status,
        review_notes,
        reviewer,
        review_timestamp,
        created_time,
        updated_time: now,
    }
}

/// Process one PRIMARY record: incremental dedup check, existing-result
/// read, and the deadline-bounded match itself, each wrapped in
/// [`with_backoff`] since the store is an external collaborator subject to
/// transient failure (§7). Returns `None` when the record contributes no
/// row to this page's `bulk_upsert` (skipped, or a non-retryable store
/// failure) — every branch calls `record_processed` exactly once before
/// returning, so `processed` always counts every record the engine
/// attempted, skip and error outcomes included (§8 invariant 3).
async fn process_one(
    ctx: &EngineContext<'_>,
    state: &TaskState,
    primary: Unit,
    per_record_deadline: Duration,
) -> Option<LinkageResult> {
    if state.is_cancel_requested() {
        state.record_processed(Duration::ZERO);
        state.record_skipped();
        return None;
    }

    if state.mode == TaskMode::Incremental {
        let has_result = with_backoff(StoreError::is_retryable, |_attempt| {
            ctx.linkage_store.has_result(&primary.id)
        })
        .await;
        match has_result {
            Ok(true) => {
                state.record_processed(Duration::ZERO);
                state.record_skipped();
                return None;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(primary_id = %primary.id, error = %e, "has_result check failed after retries");
                state.record_processed(Duration::ZERO);
                state.record_errored();
                return None;
            }
        }
    }

    let existing = match with_backoff(StoreError::is_retryable, |_attempt| ctx.linkage_store.get(&primary.id)).await
    {
        Ok(existing) => existing,
        Err(e) => {
            warn!(primary_id = %primary.id, error = %e, "existing result read failed after retries");
            state.record_processed(Duration::ZERO);
            state.record_errored();
            return None;
        }
    };

    let started = Instant::now();
    let primary_id = primary.id.clone();
    let outcome_result = tokio::time::timeout(
        per_record_deadline,
        match_record(ctx.secondary_index, ctx.graph, &primary, &ctx.config),
    )
    .await;
    let elapsed = started.elapsed();
    state.record_processed(elapsed);

    Some(match outcome_result {
        Ok(outcome) => {
            if outcome.match_type != MatchType::None {
                state.record_matched();
            }
            if existing.is_some() {
                state.record_updated();
            }
            build_result(primary, &outcome, existing.as_ref(), Utc::now())
        }
        Err(_timeout) => {
            warn!(primary_id = %primary_id, "per-record match deadline exceeded");
            state.record_errored();
            let mut fallback = existing.unwrap_or_else(|| {
                LinkageResult::none(primary.clone(), linkage_core::MatchExplanation::default(), Utc::now())
            });
            fallback.review_notes = Some("transient error".to_string());
            fallback.updated_time = Utc::now();
            fallback
        }
    })
}

/// Run one task to completion (or until cancelled / erroring), mutating
/// `state` as it goes. Intended to be driven from a spawned task; the
/// caller retains `state` to poll progress or request cancellation
/// concurrently.
pub async fn run(state: Arc<TaskState>, ctx: EngineContext<'_>) {
    if state.mode == TaskMode::Full {
        if let Err(e) = ctx.linkage_store.clear_all().await {
            state.set_error(format!("clear_all failed: {e}"));
            return;
        }
    }

    let mut cursor = state.last_processed_primary_id();
    let batch_size = ctx.config.batch_size.max(1);
    let per_record_deadline = Duration::from_millis(ctx.config.per_record_deadline_ms);
    let workers = ctx.config.workers_per_page.max(1);

    loop {
        if state.is_cancel_requested() {
            state.set_status(TaskStatus::Stopped);
            return;
        }

        let page = match with_backoff(Error::is_retryable, |_attempt| {
            ctx.primary_source.page(cursor.as_deref(), batch_size)
        })
        .await
        {
            Ok(page) => page,
            Err(e) => {
                state.set_error(format!("primary source read failed after retries: {e}"));
                return;
            }
        };
        if page.is_empty() {
            state.set_status(TaskStatus::Completed);
            return;
        }
        let page_cursor = page.last().map(|u| u.id.clone());

        // Page records are matched by a small worker pool (§4.6: "internally
        // pages are processed with a small worker pool") fanned out with
        // bounded concurrency rather than one record at a time.
        let page_results: Vec<LinkageResult> = stream::iter(
            page.into_iter()
                .map(|primary| process_one(&ctx, &state, primary, per_record_deadline)),
        )
        .buffer_unordered(workers)
        .filter_map(std::future::ready)
        .collect()
        .await;

        if let Err(e) = with_backoff(StoreError::is_retryable, |_attempt| {
            ctx.linkage_store.bulk_upsert(page_results.clone())
        })
        .await
        {
            state.set_error(format!("bulk upsert failed after retries: {e}"));
            return;
        }
        state.advance_batch();
        cursor = page_cursor.or(cursor);
        if let Some(id) = &cursor {
            state.set_last_processed_primary_id(id.clone());
        }
        info!(task_id = %state.task_id, processed = state.processed_count(), "flushed page");

        if state.is_cancel_requested() {
            state.set_status(TaskStatus::Stopped);
            return;
        }
    }
}

/// Start a task under a global (per-task) deadline, if configured (§4.6,
/// §9 "soft and optional global deadlines via `tokio::time::timeout`").
pub async fn run_with_deadline(state: Arc<TaskState>, ctx: EngineContext<'_>) {
    let deadline = ctx.config.task_deadline_secs;
    match deadline {
        None => run(state, ctx).await,
        Some(secs) => {
            if tokio::time::timeout(Duration::from_secs(secs), run(state.clone(), ctx))
                .await
                .is_err()
            {
                state.set_error("task deadline exceeded");
            }
        }
    }
}

/// Validate the mode string and reject an empty PRIMARY source before any
/// task state is created (§6, §8 boundary case).
pub async fn validate_start(ctx: &EngineContext<'_>, mode_str: &str) -> Result<(TaskMode, u64)> {
    let mode = TaskMode::parse(mode_str)?;
    let total = snapshot_total(ctx, mode).await?;
    if ctx.primary_source.total_count().await? == 0 {
        return Err(Error::EmptyPrimary);
    }
    Ok((mode, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkage_match::InMemorySecondaryIndex;
    use linkage_store::InMemoryLinkageStore;
    use linkage_test_helpers::unit;

    #[tokio::test]
    async fn full_run_produces_one_result_per_primary() {
        let primaries = vec![unit("P1", "Alpha"), unit("P2", "Beta"), unit("P3", "Gamma")];
        let source = InMemoryPrimarySource::new(primaries);
        let index = InMemorySecondaryIndex::build(vec![]);
        let graph = AttributeGraph::build(std::iter::empty());
        let store = InMemoryLinkageStore::new();
        let config = MatchConfig::default();

        let ctx = EngineContext {
            primary_source: &source,
            secondary_index: &index,
            graph: &graph,
            linkage_store: &store,
            config,
        };
        let (mode, total) = validate_start(&ctx, "full").await.unwrap();
        let state = Arc::new(TaskState::new("T1".into(), mode, total));
        run(state.clone(), ctx).await;

        assert_eq!(state.status(), TaskStatus::Completed);
        assert_eq!(state.processed_count(), 3);
        let stats = store.statistics().await.unwrap();
        assert_eq!(*stats.by_match_type.get("none").unwrap(), 3);
    }

    #[tokio::test]
    async fn cancellation_stops_after_in_flight_page() {
        let primaries: Vec<Unit> = (0..10).map(|i| unit(&format!("P{i:02}"), "Name")).collect();
        let source = InMemoryPrimarySource::new(primaries);
        let index = InMemorySecondaryIndex::build(vec![]);
        let graph = AttributeGraph::build(std::iter::empty());
        let store = InMemoryLinkageStore::new();
        let mut config = MatchConfig::default();
        config.batch_size = 3;

        let ctx = EngineContext {
            primary_source: &source,
            secondary_index: &index,
            graph: &graph,
            linkage_store: &store,
            config,
        };
        let (mode, total) = validate_start(&ctx, "full").await.unwrap();
        let state = Arc::new(TaskState::new("T1".into(), mode, total));
        state.request_cancel();
        run(state.clone(), ctx).await;

        assert_eq!(state.status(), TaskStatus::Stopped);
        assert!(state.processed_count() <= 3);
    }

    #[tokio::test]
    async fn incremental_mode_skips_existing_results() {
        let primaries = vec![unit("P1", "Alpha"), unit("P2", "Beta")];
        let source = InMemoryPrimarySource::new(primaries.clone());
        let index = InMemorySecondaryIndex::build(vec![]);
        let graph = AttributeGraph::build(std::iter::empty());
        let store = InMemoryLinkageStore::new();
        store
            .upsert(LinkageResult::none(
                primaries[0].clone(),
                linkage_core::MatchExplanation::default(),
                Utc::now(),
            ))
            .await
            .unwrap();
        let config = MatchConfig::default();

        let ctx = EngineContext {
            primary_source: &source,
            secondary_index: &index,
            graph: &graph,
            linkage_store: &store,
            config,
        };
        let (mode, total) = validate_start(&ctx, "incremental").await.unwrap();
        assert_eq!(total, 1);
        let state = Arc::new(TaskState::new("T1".into(), mode, total));
        run(state.clone(), ctx).await;

        assert_eq!(state.status(), TaskStatus::Completed);
        assert_eq!(state.progress().skipped, 1);
        // Both primaries pass through the engine (P1 skipped, P2 matched),
        // so `processed` counts the skip too.
        assert_eq!(state.processed_count(), 2);
    }

    #[tokio::test]
    async fn concurrent_page_processing_counts_every_record_once() {
        let primaries: Vec<Unit> = (0..6).map(|i| unit(&format!("P{i}"), "Name")).collect();
        let source = InMemoryPrimarySource::new(primaries);
        let index = InMemorySecondaryIndex::build(vec![]);
        let graph = AttributeGraph::build(std::iter::empty());
        let store = InMemoryLinkageStore::new();
        let mut config = MatchConfig::default();
        config.workers_per_page = 3;

        let ctx = EngineContext {
            primary_source: &source,
            secondary_index: &index,
            graph: &graph,
            linkage_store: &store,
            config,
        };
        let (mode, total) = validate_start(&ctx, "full").await.unwrap();
        let state = Arc::new(TaskState::new("T1".into(), mode, total));
        run(state.clone(), ctx).await;

        assert_eq!(state.status(), TaskStatus::Completed);
        assert_eq!(state.processed_count(), 6);
        let stats = store.statistics().await.unwrap();
        assert_eq!(*stats.by_match_type.get("none").unwrap(), 6);
    }
}
