//! Read access to the PRIMARY source (§4.6): paginated iteration over
//! PRIMARY units in `primary_id` ascending order. Treated as an external
//! collaborator, like [`linkage_match::SecondaryIndex`] — this crate only
//! defines the contract and an in-memory reference implementation.

use async_trait::async_trait;
use linkage_core::{Result, Unit};

/// Paginated read access to the PRIMARY source, in stable `primary_id`
/// ascending order (§4.6 execution contract, step 2).
#[async_trait]
pub trait PrimarySource: Send + Sync {
    /// Total PRIMARY record count, snapshotted once at task start.
    async fn total_count(&self) -> Result<usize>;

    /// One page of PRIMARY units, `primary_id` ascending, strictly after
    /// `after_id` (`None` starts from the beginning). Returns fewer than
    /// `limit` items only on the final page.
    async fn page(&self, after_id: Option<&str>, limit: usize) -> Result<Vec<Unit>>;
}

/// In-memory reference implementation, holding a fixed snapshot of
/// PRIMARY units sorted by `id` at construction time.
pub struct InMemoryPrimarySource {
    units: Vec<Unit>,
}

impl InMemoryPrimarySource {
    #[must_use]
    pub fn new(mut units: Vec<Unit>) -> Self {
        units.sort_by(|a, b| a.id.cmp(&b.id));
        Self { units }
    }
}

#[async_trait]
impl PrimarySource for InMemoryPrimarySource {
    async fn total_count(&self) -> Result<usize> {
        Ok(self.units.len())
    }

    async fn page(&self, after_id: Option<&str>, limit: usize) -> Result<Vec<Unit>> {
        let start = match after_id {
            None => 0,
            Some(id) => self
                .units
                .iter()
                .position(|u| u.id.as_str() > id)
                .unwrap_or(self.units.len()),
        };
        Ok(self.units[start..].iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkage_test_helpers::unit;

    #[tokio::test]
    async fn pages_in_id_order_and_resumes_after_cursor() {
        let source = InMemoryPrimarySource::new(vec![unit("P3", "X"), unit("P1", "X"), unit("P2", "X")]);
        assert_eq!(source.total_count().await.unwrap(), 3);
        let first = source.page(None, 2).await.unwrap();
        assert_eq!(first.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(), ["P1", "P2"]);
        let second = source.page(Some("P2"), 2).await.unwrap();
        assert_eq!(second.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(), ["P3"]);
    }
}
