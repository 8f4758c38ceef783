//! Index declarations for the `linkage_results` collection (§4.5).
//!
//! The adapter must refuse queries that presuppose an index that has not
//! been declared present, and must not attach query hints unless the
//! index is known to exist. This module is the single source of truth
//! for "known to exist".

use crate::error::StoreError;

/// An index the Result Store Adapter may rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    /// unique on `primary_id`
    PrimaryIdUnique,
    /// on `matched_id`
    MatchedId,
    /// on `match_type`
    MatchType,
    /// on `similarity_score` descending
    SimilarityScoreDesc,
    /// on `created_time` descending
    CreatedTimeDesc,
    /// compound `(primary_id, match_type)`
    PrimaryIdMatchType,
    /// compound `(matched_id, similarity_score desc)`
    MatchedIdSimilarityDesc,
}

impl Index {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PrimaryIdUnique => "primary_id_unique",
            Self::MatchedId => "matched_id",
            Self::MatchType => "match_type",
            Self::SimilarityScoreDesc => "similarity_score_desc",
            Self::CreatedTimeDesc => "created_time_desc",
            Self::PrimaryIdMatchType => "primary_id_match_type",
            Self::MatchedIdSimilarityDesc => "matched_id_similarity_desc",
        }
    }

    /// All indexes §4.5 requires the adapter to have declared.
    #[must_use]
    pub const fn required() -> [Self; 7] {
        [
            Self::PrimaryIdUnique,
            Self::MatchedId,
            Self::MatchType,
            Self::SimilarityScoreDesc,
            Self::CreatedTimeDesc,
            Self::PrimaryIdMatchType,
            Self::MatchedIdSimilarityDesc,
        ]
    }
}

/// Tracks which indexes an adapter instance has declared present.
#[derive(Debug, Clone)]
pub struct IndexRegistry {
    declared: Vec<Index>,
}

impl Default for IndexRegistry {
    /// A fresh registry declares every index §4.5 requires; this is the
    /// shape a correctly migrated store always presents.
    fn default() -> Self {
        Self {
            declared: Index::required().to_vec(),
        }
    }
}

impl IndexRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self { declared: Vec::new() }
    }

    #[must_use]
    pub fn has(&self, index: Index) -> bool {
        self.declared.contains(&index)
    }

    /// Refuse to proceed if `index` has not been declared present.
    pub fn require(&self, index: Index) -> Result<(), StoreError> {
        if self.has(index) {
            Ok(())
        } else {
            Err(StoreError::MissingIndex(index.name()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_declares_all_required_indexes() {
        let reg = IndexRegistry::default();
        for idx in Index::required() {
            assert!(reg.require(idx).is_ok());
        }
    }

    #[test]
    fn empty_registry_refuses_every_index() {
        let reg = IndexRegistry::empty();
        assert!(reg.require(Index::MatchType).is_err());
    }
}
