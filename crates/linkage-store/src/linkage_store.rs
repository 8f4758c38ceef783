//! The Result Store Adapter (§4.5): idempotent upsert of `LinkageResult`
//! records keyed by `primary_id`, plus the in-memory reference
//! implementation used by tests and small deployments.
//!
//! The real backing store is a document database (assumed external, per
//! §1) — this module only defines the contract it must satisfy and a
//! faithful in-memory stand-in. A production deployment swaps in an
//! adapter that talks to that database without changing any caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use linkage_core::{LinkageResult, MatchType, ReviewStatus};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::indexes::{Index, IndexRegistry};

/// Counts returned by a bulk upsert (§4.5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkUpsertCounts {
    pub matched: usize,
    pub modified: usize,
    pub inserted: usize,
}

/// Optional filters for [`LinkageStore::iter_pending`].
#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    pub match_type: Option<MatchType>,
    pub review_status: Option<ReviewStatus>,
    pub name_query: Option<String>,
}

/// A single page of results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

/// Aggregate counts for `get_statistics` (§6).
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub by_match_type: std::collections::BTreeMap<&'static str, usize>,
    pub by_confidence: std::collections::BTreeMap<&'static str, usize>,
    pub by_review_status: std::collections::BTreeMap<&'static str, usize>,
}

/// The Result Store Adapter contract (§4.5).
#[async_trait]
pub trait LinkageStore: Send + Sync {
    /// Insert-or-replace keyed by `primary_id`. Must be atomic per record
    /// (Invariant 1).
    async fn upsert(&self, result: LinkageResult) -> StoreResult<()>;

    /// Bulk upsert: one native batch operation, one logical write per
    /// record, reporting `{matched, modified, inserted}` (§4.5, §5
    /// "at most one upsert per `primary_id` per page").
    async fn bulk_upsert(&self, results: Vec<LinkageResult>) -> StoreResult<BulkUpsertCounts>;

    /// Read one result by `primary_id`.
    async fn get(&self, primary_id: &str) -> StoreResult<Option<LinkageResult>>;

    /// Read one result by `match_id`.
    async fn get_by_match_id(&self, match_id: &str) -> StoreResult<Option<LinkageResult>>;

    /// Whether a result already exists for `primary_id` — used by
    /// `incremental` mode to select the unmatched input set.
    async fn has_result(&self, primary_id: &str) -> StoreResult<bool>;

    /// Validate and apply a review-state transition (§3 Invariant 5).
    /// `expected_updated_time`, when given, must match the stored
    /// `updated_time` or the call fails with [`StoreError::StaleReview`]
    /// (§5 shared-resource policy).
    async fn set_review(
        &self,
        primary_id: &str,
        status: ReviewStatus,
        notes: Option<String>,
        reviewer: String,
        expected_updated_time: Option<DateTime<Utc>>,
    ) -> StoreResult<LinkageResult>;

    /// Delete every result. Used only by `full`-mode tasks.
    async fn clear_all(&self) -> StoreResult<usize>;

    /// Paginated, filtered read.
    async fn iter_pending(
        &self,
        filter: ResultFilter,
        page: usize,
        page_size: usize,
    ) -> StoreResult<Page<LinkageResult>>;

    /// Aggregate counts by match type / confidence / review status.
    async fn statistics(&self) -> StoreResult<Statistics>;
}

/// In-memory reference implementation of [`LinkageStore`].
///
/// Backed by an `IndexMap` so that `created_time`-ordered iteration is
/// stable without a secondary sort pass, guarded by a single `RwLock` —
/// the in-memory analogue of "bulk upserts within a page are applied in
/// one atomic batch" (§5).
pub struct InMemoryLinkageStore {
    rows: RwLock<IndexMap<String, LinkageResult>>,
    indexes: IndexRegistry,
}

impl Default for InMemoryLinkageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLinkageStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(IndexMap::new()),
            indexes: IndexRegistry::default(),
        }
    }

    fn matches_filter(result: &LinkageResult, filter: &ResultFilter) -> bool {
        if let Some(mt) = filter.match_type {
            if result.match_type != mt {
                return false;
            }
        }
        if let Some(rs) = filter.review_status {
            if result.review_status != rs {
                return false;
            }
        }
        if let Some(q) = &filter.name_query {
            let q = q.to_uppercase();
            let hay = format!(
                "{} {}",
                result.primary_snapshot.name.to_uppercase(),
                result
                    .matched_snapshot
                    .as_ref()
                    .map(|u| u.name.to_uppercase())
                    .unwrap_or_default()
            );
            if !hay.contains(&q) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl LinkageStore for InMemoryLinkageStore {
    async fn upsert(&self, result: LinkageResult) -> StoreResult<()> {
        self.indexes.require(Index::PrimaryIdUnique)?;
        let mut rows = self.rows.write().await;
        rows.insert(result.primary_id.clone(), result);
        Ok(())
    }

    async fn bulk_upsert(&self, results: Vec<LinkageResult>) -> StoreResult<BulkUpsertCounts> {
        self.indexes.require(Index::PrimaryIdUnique)?;
        let mut rows = self.rows.write().await;
        let mut counts = BulkUpsertCounts::default();
        for result in results {
            counts.matched += 1;
            if rows.contains_key(&result.primary_id) {
                counts.modified += 1;
            } else {
                counts.inserted += 1;
            }
            rows.insert(result.primary_id.clone(), result);
        }
        Ok(counts)
    }

    async fn get(&self, primary_id: &str) -> StoreResult<Option<LinkageResult>> {
        self.indexes.require(Index::PrimaryIdUnique)?;
        Ok(self.rows.read().await.get(primary_id).cloned())
    }

    async fn get_by_match_id(&self, match_id: &str) -> StoreResult<Option<LinkageResult>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|r| r.match_id == match_id)
            .cloned())
    }

    async fn has_result(&self, primary_id: &str) -> StoreResult<bool> {
        Ok(self.rows.read().await.contains_key(primary_id))
    }

    async fn set_review(
        &self,
        primary_id: &str,
        status: ReviewStatus,
        notes: Option<String>,
        reviewer: String,
        expected_updated_time: Option<DateTime<Utc>>,
    ) -> StoreResult<LinkageResult> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(primary_id) else {
            return Err(StoreError::NotFound {
                entity: "LinkageResult",
                identifier: primary_id.to_string(),
            });
        };
        if let Some(expected) = expected_updated_time {
            if row.updated_time != expected {
                return Err(StoreError::StaleReview(primary_id.to_string()));
            }
        }
        row.review_status = status;
        row.review_notes = notes;
        row.reviewer = Some(reviewer);
        row.review_timestamp = Some(Utc::now());
        row.updated_time = Utc::now();
        Ok(row.clone())
    }

    async fn clear_all(&self) -> StoreResult<usize> {
        let mut rows = self.rows.write().await;
        let count = rows.len();
        rows.clear();
        Ok(count)
    }

    async fn iter_pending(
        &self,
        filter: ResultFilter,
        page: usize,
        page_size: usize,
    ) -> StoreResult<Page<LinkageResult>> {
        let rows = self.rows.read().await;
        let filtered: Vec<LinkageResult> = rows
            .values()
            .filter(|r| Self::matches_filter(r, &filter))
            .cloned()
            .collect();
        let total = filtered.len();
        let start = page.saturating_mul(page_size).min(total);
        let end = (start + page_size).min(total);
        Ok(Page {
            items: filtered[start..end].to_vec(),
            page,
            page_size,
            total,
        })
    }

    async fn statistics(&self) -> StoreResult<Statistics> {
        let rows = self.rows.read().await;
        let mut stats = Statistics::default();
        for row in rows.values() {
            *stats.by_match_type.entry(row.match_type.as_str()).or_default() += 1;
            *stats
                .by_confidence
                .entry(match row.match_confidence {
                    linkage_core::MatchConfidence::High => "high",
                    linkage_core::MatchConfidence::Medium => "medium",
                    linkage_core::MatchConfidence::Low => "low",
                    linkage_core::MatchConfidence::None => "none",
                })
                .or_default() += 1;
            *stats
                .by_review_status
                .entry(row.review_status.as_str())
                .or_default() += 1;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkage_core::{MatchConfidence, MatchExplanation, Unit};

    fn sample(primary_id: &str) -> LinkageResult {
        let now = Utc::now();
        let unit = Unit {
            id: primary_id.to_string(),
            name: "Acme".into(),
            credit_code: None,
            address: None,
            legal_representative: None,
            safety_manager: None,
            contact_phone: None,
        };
        LinkageResult {
            match_id: LinkageResult::derive_match_id(primary_id, None),
            primary_id: primary_id.to_string(),
            primary_snapshot: unit,
            matched_id: None,
            matched_snapshot: None,
            match_type: MatchType::None,
            similarity_score: 0.0,
            match_confidence: MatchConfidence::None,
            match_explanation: MatchExplanation::default(),
            review_status: ReviewStatus::Pending,
            review_notes: None,
            reviewer: None,
            review_timestamp: None,
            created_time: now,
            updated_time: now,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_not_duplicates() {
        let store = InMemoryLinkageStore::new();
        store.upsert(sample("P1")).await.unwrap();
        store.upsert(sample("P1")).await.unwrap();
        let page = store
            .iter_pending(ResultFilter::default(), 0, 10)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn bulk_upsert_reports_inserted_and_modified() {
        let store = InMemoryLinkageStore::new();
        store.upsert(sample("P1")).await.unwrap();
        let counts = store
            .bulk_upsert(vec![sample("P1"), sample("P2")])
            .await
            .unwrap();
        assert_eq!(counts.matched, 2);
        assert_eq!(counts.modified, 1);
        assert_eq!(counts.inserted, 1);
    }

    #[tokio::test]
    async fn set_review_rejects_stale_updated_time() {
        let store = InMemoryLinkageStore::new();
        store.upsert(sample("P1")).await.unwrap();
        let wrong_time = Utc::now() - chrono::Duration::days(1);
        let result = store
            .set_review(
                "P1",
                ReviewStatus::Approved,
                None,
                "alice".into(),
                Some(wrong_time),
            )
            .await;
        assert!(matches!(result, Err(StoreError::StaleReview(_))));
    }

    #[tokio::test]
    async fn set_review_transitions_and_stamps_reviewer() {
        let store = InMemoryLinkageStore::new();
        store.upsert(sample("P1")).await.unwrap();
        let updated = store
            .set_review("P1", ReviewStatus::Approved, None, "alice".into(), None)
            .await
            .unwrap();
        assert_eq!(updated.review_status, ReviewStatus::Approved);
        assert_eq!(updated.reviewer.as_deref(), Some("alice"));
        assert!(updated.review_timestamp.is_some());
    }

    #[tokio::test]
    async fn clear_all_returns_deleted_count() {
        let store = InMemoryLinkageStore::new();
        store.upsert(sample("P1")).await.unwrap();
        store.upsert(sample("P2")).await.unwrap();
        assert_eq!(store.clear_all().await.unwrap(), 2);
        assert_eq!(store.clear_all().await.unwrap(), 0);
    }
}
