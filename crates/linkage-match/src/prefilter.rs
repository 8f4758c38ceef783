//! Candidate Prefilter (§4.3): produces, for one PRIMARY record, a
//! candidate list of at most `K` SECONDARY records highly likely to
//! contain the true match.

use std::collections::BTreeSet;

use linkage_core::{MatchConfig, NormalizedUnit, Unit};

use crate::secondary_index::SecondaryIndex;

/// Result of a prefilter pass: the deduplicated candidate list, in the
/// order higher-precision signals were consulted, plus whether the
/// underlying store degraded during the pass.
#[derive(Debug, Clone, Default)]
pub struct PrefilterOutcome {
    pub candidates: Vec<Unit>,
    pub store_unavailable: bool,
}

/// Produce up to `config.candidate_cap_k` candidates for `primary`,
/// short-circuiting once enough candidates have accumulated. Never
/// raises: any index failure degrades to an empty remaining step and
/// sets `store_unavailable` (§4.3 "Error conditions").
pub async fn prefilter(
    index: &dyn SecondaryIndex,
    primary: &Unit,
    normalized: &NormalizedUnit,
    config: &MatchConfig,
) -> PrefilterOutcome {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut candidates: Vec<Unit> = Vec::new();
    let mut store_unavailable = false;
    let cap = config.candidate_cap_k;

    let mut push_all = |units: Vec<Unit>, candidates: &mut Vec<Unit>, seen: &mut BTreeSet<String>| {
        for unit in units {
            if candidates.len() >= cap {
                break;
            }
            if seen.insert(unit.id.clone()) {
                candidates.push(unit);
            }
        }
    };

    // Step 1: exact credit_code lookup.
    if let Some(code) = &primary.credit_code {
        if !code.trim().is_empty() {
            match index.by_credit_code(code).await {
                Ok(units) => push_all(units, &mut candidates, &mut seen),
                Err(_) => store_unavailable = true,
            }
        }
    }
    if candidates.len() >= cap {
        return PrefilterOutcome { candidates, store_unavailable };
    }

    // Step 2: exact name_canonical lookup.
    if !normalized.name_canonical.is_empty() {
        match index.by_name_canonical(&normalized.name_canonical).await {
            Ok(units) => push_all(units, &mut candidates, &mut seen),
            Err(_) => store_unavailable = true,
        }
    }
    if candidates.len() >= cap {
        return PrefilterOutcome { candidates, store_unavailable };
    }

    // Step 3: name prefix/slice lookup.
    if !normalized.name_slices.is_empty() {
        match index.by_name_slices(&normalized.name_slices).await {
            Ok(units) => push_all(units, &mut candidates, &mut seen),
            Err(_) => store_unavailable = true,
        }
    }
    if candidates.len() >= cap {
        return PrefilterOutcome { candidates, store_unavailable };
    }

    // Step 4: full-text search on name tokens, limited to T hits.
    if !normalized.name_canonical.is_empty() {
        match index
            .text_search(&normalized.name_canonical, config.text_search_limit_t)
            .await
        {
            Ok(units) => push_all(units, &mut candidates, &mut seen),
            Err(_) => store_unavailable = true,
        }
    }
    if candidates.len() >= cap {
        return PrefilterOutcome { candidates, store_unavailable };
    }

    // Step 5: address-keyword intersection, only when name-based
    // candidates are fewer than K/2, limited to 30 hits.
    if candidates.len() < cap / 2 && !normalized.address_keywords.is_empty() {
        match index
            .by_address_keywords(&normalized.address_keywords, config.address_keyword_limit)
            .await
        {
            Ok(units) => push_all(units, &mut candidates, &mut seen),
            Err(_) => store_unavailable = true,
        }
    }

    PrefilterOutcome { candidates, store_unavailable }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secondary_index::InMemorySecondaryIndex;
    use linkage_core::normalizer::normalize_unit;
    use linkage_test_helpers::UnitBuilder;

    fn unit(id: &str, name: &str, code: Option<&str>) -> Unit {
        let mut b = UnitBuilder::new(id, name);
        if let Some(c) = code {
            b = b.credit_code(c);
        }
        b.build()
    }

    #[tokio::test]
    async fn credit_code_short_circuits_remaining_steps() {
        let index = InMemorySecondaryIndex::build(vec![
            unit("S1", "Foo Trading", Some("91000000MA1ABCDE0X")),
            unit("S2", "Unrelated", None),
        ]);
        let primary = unit("P1", "Foo Trading Co., Ltd.", Some("91000000MA1ABCDE0X"));
        let normalized = normalize_unit(&primary);
        let cfg = MatchConfig::default();
        let outcome = prefilter(&index, &primary, &normalized, &cfg).await;
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].id, "S1");
        assert!(!outcome.store_unavailable);
    }

    #[tokio::test]
    async fn dedups_candidates_across_steps() {
        let index = InMemorySecondaryIndex::build(vec![unit("S1", "Foo Trading", None)]);
        let primary = unit("P1", "Foo Trading", None);
        let normalized = normalize_unit(&primary);
        let cfg = MatchConfig::default();
        let outcome = prefilter(&index, &primary, &normalized, &cfg).await;
        assert_eq!(outcome.candidates.len(), 1);
    }
}
