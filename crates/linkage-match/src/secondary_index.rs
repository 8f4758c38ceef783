//! Indexed read access to the SECONDARY source (§2, §4.3). The real
//! backing store is a document database with the indexes §4.5 declares;
//! this trait is the narrow read surface the Prefilter needs from it.
//! Treated as an external collaborator per §1 — this crate only defines
//! the contract and an in-memory reference implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use linkage_core::{normalizer, NormalizedUnit, Unit};

use crate::error::IndexResult;

/// Indexed lookups over the SECONDARY source, backing the Prefilter's
/// five query strategies (§4.3).
#[async_trait]
pub trait SecondaryIndex: Send + Sync {
    /// Exact `credit_code` lookup.
    async fn by_credit_code(&self, credit_code: &str) -> IndexResult<Vec<Unit>>;

    /// Exact `name_canonical` lookup.
    async fn by_name_canonical(&self, name_canonical: &str) -> IndexResult<Vec<Unit>>;

    /// Union of candidates whose `name_slices` intersect the given
    /// slices.
    async fn by_name_slices(&self, slices: &[String]) -> IndexResult<Vec<Unit>>;

    /// Full-text search over name tokens, capped at `limit` hits.
    async fn text_search(&self, name_canonical: &str, limit: usize) -> IndexResult<Vec<Unit>>;

    /// Address-keyword intersection, capped at `limit` hits.
    async fn by_address_keywords(&self, keywords: &[String], limit: usize) -> IndexResult<Vec<Unit>>;

    /// The `limit` most-recently-seen SECONDARY units, used to build the
    /// L4 attribute graph eagerly at task start (§9).
    async fn recent(&self, limit: usize) -> IndexResult<Vec<Unit>>;
}

/// In-memory reference implementation, indexing a fixed snapshot of
/// SECONDARY units by the same keys the Prefilter queries by.
pub struct InMemorySecondaryIndex {
    units: Vec<Unit>,
    normalized: Vec<NormalizedUnit>,
    by_credit_code: HashMap<String, Vec<usize>>,
    by_name_canonical: HashMap<String, Vec<usize>>,
    by_slice: HashMap<String, Vec<usize>>,
}

impl InMemorySecondaryIndex {
    #[must_use]
    pub fn build(units: Vec<Unit>) -> Self {
        let normalized: Vec<NormalizedUnit> = units.iter().map(normalizer::normalize_unit).collect();
        let mut by_credit_code: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_name_canonical: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_slice: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, (unit, norm)) in units.iter().zip(normalized.iter()).enumerate() {
            if let Some(code) = &unit.credit_code {
                let code = normalizer::normalize_credit_code(code);
                if !code.is_empty() {
                    by_credit_code.entry(code).or_default().push(i);
                }
            }
            if !norm.name_canonical.is_empty() {
                by_name_canonical
                    .entry(norm.name_canonical.clone())
                    .or_default()
                    .push(i);
            }
            for slice in &norm.name_slices {
                by_slice.entry(slice.clone()).or_default().push(i);
            }
        }

        Self {
            units,
            normalized,
            by_credit_code,
            by_name_canonical,
            by_slice,
        }
    }

    fn gather(&self, indices: impl IntoIterator<Item = usize>) -> Vec<Unit> {
        indices.into_iter().map(|i| self.units[i].clone()).collect()
    }
}

#[async_trait]
impl SecondaryIndex for InMemorySecondaryIndex {
    async fn by_credit_code(&self, credit_code: &str) -> IndexResult<Vec<Unit>> {
        let code = normalizer::normalize_credit_code(credit_code);
        Ok(self
            .by_credit_code
            .get(&code)
            .map(|idxs| self.gather(idxs.iter().copied()))
            .unwrap_or_default())
    }

    async fn by_name_canonical(&self, name_canonical: &str) -> IndexResult<Vec<Unit>> {
        Ok(self
            .by_name_canonical
            .get(name_canonical)
            .map(|idxs| self.gather(idxs.iter().copied()))
            .unwrap_or_default())
    }

    async fn by_name_slices(&self, slices: &[String]) -> IndexResult<Vec<Unit>> {
        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        for slice in slices {
            if let Some(idxs) = self.by_slice.get(slice) {
                for &i in idxs {
                    if seen.insert(i) {
                        out.push(self.units[i].clone());
                    }
                }
            }
        }
        Ok(out)
    }

    async fn text_search(&self, name_canonical: &str, limit: usize) -> IndexResult<Vec<Unit>> {
        let tokens: std::collections::BTreeSet<char> = name_canonical.chars().collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let mut hits: Vec<Unit> = self
            .normalized
            .iter()
            .zip(self.units.iter())
            .filter(|(norm, _)| {
                !norm.name_canonical.is_empty()
                    && norm.name_canonical.chars().any(|c| tokens.contains(&c))
            })
            .map(|(_, unit)| unit.clone())
            .collect();
        hits.truncate(limit);
        Ok(hits)
    }

    async fn by_address_keywords(&self, keywords: &[String], limit: usize) -> IndexResult<Vec<Unit>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: std::collections::BTreeSet<&String> = keywords.iter().collect();
        let mut hits: Vec<Unit> = self
            .normalized
            .iter()
            .zip(self.units.iter())
            .filter(|(norm, _)| norm.address_keywords.iter().any(|k| wanted.contains(k)))
            .map(|(_, unit)| unit.clone())
            .collect();
        hits.truncate(limit);
        Ok(hits)
    }

    async fn recent(&self, limit: usize) -> IndexResult<Vec<Unit>> {
        Ok(self.units.iter().rev().take(limit).cloned().collect())
    }
}
