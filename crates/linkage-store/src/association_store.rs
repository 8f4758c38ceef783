//! Store for `EnhancedAssociation` documents (§4.7): "Results are written
//! to the `EnhancedAssociation` store with upsert on `association_id`."

use async_trait::async_trait;
use indexmap::IndexMap;
use linkage_core::EnhancedAssociation;
use tokio::sync::RwLock;

use crate::error::StoreResult;

/// The `EnhancedAssociation` store contract.
#[async_trait]
pub trait AssociationStore: Send + Sync {
    async fn upsert(&self, association: EnhancedAssociation) -> StoreResult<()>;
    async fn bulk_upsert(&self, associations: Vec<EnhancedAssociation>) -> StoreResult<usize>;
    async fn get(&self, primary_id: &str) -> StoreResult<Option<EnhancedAssociation>>;
    async fn clear_all(&self) -> StoreResult<usize>;
    async fn all(&self) -> StoreResult<Vec<EnhancedAssociation>>;
}

/// In-memory reference implementation, keyed by `association_id`.
pub struct InMemoryAssociationStore {
    rows: RwLock<IndexMap<String, EnhancedAssociation>>,
}

impl Default for InMemoryAssociationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAssociationStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(IndexMap::new()),
        }
    }
}

#[async_trait]
impl AssociationStore for InMemoryAssociationStore {
    async fn upsert(&self, association: EnhancedAssociation) -> StoreResult<()> {
        self.rows
            .write()
            .await
            .insert(association.association_id.clone(), association);
        Ok(())
    }

    async fn bulk_upsert(&self, associations: Vec<EnhancedAssociation>) -> StoreResult<usize> {
        let mut rows = self.rows.write().await;
        let count = associations.len();
        for association in associations {
            rows.insert(association.association_id.clone(), association);
        }
        Ok(count)
    }

    async fn get(&self, primary_id: &str) -> StoreResult<Option<EnhancedAssociation>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|a| a.primary_id == primary_id)
            .cloned())
    }

    async fn clear_all(&self) -> StoreResult<usize> {
        let mut rows = self.rows.write().await;
        let count = rows.len();
        rows.clear();
        Ok(count)
    }

    async fn all(&self) -> StoreResult<Vec<EnhancedAssociation>> {
        Ok(self.rows.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkage_core::{AssociationStrategy, Unit};

    fn sample(primary_id: &str) -> EnhancedAssociation {
        EnhancedAssociation {
            association_id: EnhancedAssociation::derive_association_id(
                primary_id,
                AssociationStrategy::Hybrid,
            ),
            primary_id: primary_id.to_string(),
            primary_snapshot: Unit {
                id: primary_id.to_string(),
                name: "Acme".into(),
                credit_code: None,
                address: None,
                legal_representative: None,
                safety_manager: None,
                contact_phone: None,
            },
            associated_records: Vec::new(),
            association_strategy: AssociationStrategy::Hybrid,
            association_confidence: 0.0,
            data_quality_score: 0.0,
            regenerated_time: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_association_id() {
        let store = InMemoryAssociationStore::new();
        store.upsert(sample("P1")).await.unwrap();
        store.upsert(sample("P1")).await.unwrap();
        assert_eq!(store.all().await.unwrap().len(), 1);
    }
}
