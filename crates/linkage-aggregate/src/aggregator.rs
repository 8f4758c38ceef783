//! Enhanced Association Aggregator (§4.7): the 1:N grouping of SECONDARY
//! records under a PRIMARY unit.
//!
//! The historical client-side loop over every primary record to compute
//! this view is explicitly disallowed (§9 Design Notes) — it is the
//! single largest source of out-of-memory incidents in the source
//! history. This module computes one group at a time from indexed reads,
//! and [`regenerate_all`] drives that one-group-at-a-time computation
//! directly from the PRIMARY source rather than materializing every
//! group in memory before writing.

use chrono::Utc;
use linkage_core::normalizer::normalize_unit;
use linkage_core::{
    kernels, AssociatedRecord, AssociationStrategy, EnhancedAssociation, MatchType, Result, Unit,
};
use linkage_match::SecondaryIndex;
use linkage_store::{AssociationStore, LinkageStore};

/// A candidate SECONDARY member before dedup/ranking.
struct Candidate {
    unit: Unit,
    match_type: MatchType,
    similarity_score: f64,
    building_based: bool,
}

/// Minimum `similarity_score` for a member to count toward
/// `association_confidence` (§4.7).
const CONFIDENCE_FLOOR: f64 = 0.70;

/// The 6 non-identifier logical fields compared for `field_consistency`.
/// `id` is excluded: it is unique per record by construction, so including
/// it would always contribute zero agreement across distinct members and
/// distort the score.
fn consistency_key(unit: &Unit, field: usize) -> Option<String> {
    match field {
        0 => Some(unit.name.trim().to_uppercase()).filter(|s| !s.is_empty()),
        1 => unit
            .credit_code
            .as_deref()
            .map(linkage_core::normalizer::normalize_credit_code)
            .filter(|s| !s.is_empty()),
        2 => unit.address.as_deref().map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()),
        3 => unit
            .legal_representative
            .as_deref()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty()),
        4 => unit.safety_manager.as_deref().map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()),
        5 => unit
            .contact_phone
            .as_deref()
            .map(linkage_core::normalizer::normalize_phone)
            .filter(|s| !s.is_empty()),
        _ => unreachable!("only 6 non-identifier fields"),
    }
}

async fn building_based_candidates(
    secondary_index: &dyn SecondaryIndex,
    primary: &Unit,
) -> Vec<Candidate> {
    let primary_norm = normalize_unit(primary);
    if primary_norm.address_keywords.is_empty() {
        return Vec::new();
    }
    let hits = secondary_index
        .by_address_keywords(&primary_norm.address_keywords, 50)
        .await
        .unwrap_or_default();
    hits.into_iter()
        .filter(|u| u.id != primary.id)
        .filter_map(|unit| {
            let norm = normalize_unit(&unit);
            if norm.address_keywords.is_empty() || norm.address_keywords != primary_norm.address_keywords {
                return None;
            }
            let similarity_score = kernels::name_similarity(&primary_norm, &norm);
            Some(Candidate {
                unit,
                match_type: MatchType::FuzzyPrefiltered,
                similarity_score,
                building_based: true,
            })
        })
        .collect()
}

async fn unit_based_candidates(
    linkage_store: &dyn LinkageStore,
    secondary_index: &dyn SecondaryIndex,
    primary: &Unit,
) -> Result<Vec<Candidate>> {
    let primary_norm = normalize_unit(primary);
    let mut out = Vec::new();

    if let Some(existing) = linkage_store.get(&primary.id).await.map_err(linkage_core::Error::from)? {
        if let Some(matched) = existing.matched_snapshot {
            out.push(Candidate {
                unit: matched,
                match_type: existing.match_type,
                similarity_score: existing.similarity_score,
                building_based: false,
            });
        }
    }

    if let Some(code) = primary.credit_code.as_deref().filter(|c| !c.trim().is_empty()) {
        for unit in secondary_index.by_credit_code(code).await.unwrap_or_default() {
            if unit.id != primary.id {
                out.push(Candidate {
                    unit,
                    match_type: MatchType::ExactCreditCode,
                    similarity_score: 1.0,
                    building_based: false,
                });
            }
        }
    }
    if !primary_norm.name_canonical.is_empty() {
        for unit in secondary_index
            .by_name_canonical(&primary_norm.name_canonical)
            .await
            .unwrap_or_default()
        {
            if unit.id != primary.id {
                out.push(Candidate {
                    unit,
                    match_type: MatchType::ExactNameCanonical,
                    similarity_score: 1.0,
                    building_based: false,
                });
            }
        }
    }
    Ok(out)
}

/// Deduplicate by SECONDARY id, keeping the highest score and the
/// building-based flag if any instance of the id was building-based.
fn dedup(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut by_id: indexmap::IndexMap<String, Candidate> = indexmap::IndexMap::new();
    for candidate in candidates {
        by_id
            .entry(candidate.unit.id.clone())
            .and_modify(|existing| {
                existing.building_based |= candidate.building_based;
                if candidate.similarity_score > existing.similarity_score {
                    existing.similarity_score = candidate.similarity_score;
                    existing.match_type = candidate.match_type;
                }
            })
            .or_insert(candidate);
    }
    by_id.into_values().collect()
}

fn field_consistency(primary: &Unit, members: &[Candidate]) -> f64 {
    if members.is_empty() {
        return 0.0;
    }
    let mut agreeing = 0usize;
    for field in 0..6 {
        let primary_key = consistency_key(primary, field);
        let Some(primary_key) = primary_key else { continue };
        if members
            .iter()
            .all(|m| consistency_key(&m.unit, field).as_deref() == Some(primary_key.as_str()))
        {
            agreeing += 1;
        }
    }
    agreeing as f64 / 6.0
}

/// Build one `EnhancedAssociation` for `primary` under `strategy`. Does
/// not write it — callers batch writes via [`regenerate_all`] or their own
/// upsert loop.
pub async fn aggregate_for_primary(
    linkage_store: &dyn LinkageStore,
    secondary_index: &dyn SecondaryIndex,
    primary: &Unit,
    strategy: AssociationStrategy,
) -> Result<EnhancedAssociation> {
    let building = building_based_candidates(secondary_index, primary).await;
    let unit_based = unit_based_candidates(linkage_store, secondary_index, primary).await?;

    let mut candidates = match strategy {
        AssociationStrategy::BuildingBased => building,
        AssociationStrategy::UnitBased => unit_based,
        AssociationStrategy::Hybrid => {
            let mut all = building;
            all.extend(unit_based);
            all
        }
    };
    candidates = dedup(candidates);
    // Building-based members ranked first (§4.7), then by descending
    // similarity; `inspection_timestamp` is not tracked by any source in
    // this engine, so it never breaks a tie in practice.
    candidates.sort_by(|a, b| {
        b.building_based
            .cmp(&a.building_based)
            .then(b.similarity_score.partial_cmp(&a.similarity_score).unwrap_or(std::cmp::Ordering::Equal))
            .then(a.unit.id.cmp(&b.unit.id))
    });

    let scored: Vec<f64> = candidates.iter().map(|c| c.similarity_score).filter(|s| *s >= CONFIDENCE_FLOOR).collect();
    let association_confidence = if scored.is_empty() {
        0.0
    } else {
        kernels::round4(scored.iter().sum::<f64>() / scored.len() as f64)
    };

    let completeness = primary.field_completeness();
    let consistency = field_consistency(primary, &candidates);
    let data_quality_score = kernels::round4(0.6 * completeness + 0.4 * consistency);

    let associated_records = candidates
        .into_iter()
        .map(|c| AssociatedRecord {
            secondary_id: c.unit.id.clone(),
            match_type: c.match_type,
            similarity_score: c.similarity_score,
            snapshot: c.unit,
            inspection_timestamp: None,
        })
        .collect();

    Ok(EnhancedAssociation {
        association_id: EnhancedAssociation::derive_association_id(&primary.id, strategy),
        primary_id: primary.id.clone(),
        primary_snapshot: primary.clone(),
        associated_records,
        association_strategy: strategy,
        association_confidence,
        data_quality_score,
        regenerated_time: Utc::now(),
    })
}

/// Regenerate associations for every PRIMARY unit in `primaries`,
/// optionally clearing the store first (`clear_existing`), and upsert each
/// group as it is computed rather than materializing the full set before
/// writing (§9 Design Notes, §4.7 "single server-side pipeline").
pub async fn regenerate_all(
    linkage_store: &dyn LinkageStore,
    secondary_index: &dyn SecondaryIndex,
    association_store: &dyn AssociationStore,
    primaries: &[Unit],
    strategy: AssociationStrategy,
    clear_existing: bool,
) -> Result<usize> {
    if clear_existing {
        association_store.clear_all().await.map_err(linkage_core::Error::from)?;
    }
    let mut written = 0usize;
    for primary in primaries {
        let association = aggregate_for_primary(linkage_store, secondary_index, primary, strategy).await?;
        association_store.upsert(association).await.map_err(linkage_core::Error::from)?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkage_match::InMemorySecondaryIndex;
    use linkage_store::{InMemoryAssociationStore, InMemoryLinkageStore};
    use linkage_test_helpers::UnitBuilder;

    fn unit(
        id: &str,
        name: &str,
        code: Option<&str>,
        address: Option<&str>,
    ) -> Unit {
        let mut b = UnitBuilder::new(id, name);
        if let Some(c) = code {
            b = b.credit_code(c);
        }
        if let Some(a) = address {
            b = b.address(a);
        }
        b.build()
    }

    #[tokio::test]
    async fn unit_based_pulls_in_existing_linkage_result() {
        let primary = unit("P1", "Acme Trading Co., Ltd.", None, None);
        let matched = unit("S1", "Acme Trading", None, None);
        let store = InMemoryLinkageStore::new();
        let result = linkage_core::LinkageResult {
            match_id: linkage_core::LinkageResult::derive_match_id("P1", Some("S1")),
            primary_id: "P1".into(),
            primary_snapshot: primary.clone(),
            matched_id: Some("S1".into()),
            matched_snapshot: Some(matched.clone()),
            match_type: MatchType::FuzzyPrefiltered,
            similarity_score: 0.88,
            match_confidence: linkage_core::MatchConfidence::High,
            match_explanation: linkage_core::MatchExplanation::default(),
            review_status: linkage_core::ReviewStatus::Pending,
            review_notes: None,
            reviewer: None,
            review_timestamp: None,
            created_time: Utc::now(),
            updated_time: Utc::now(),
        };
        store.upsert(result).await.unwrap();
        let index = InMemorySecondaryIndex::build(vec![matched]);

        let association = aggregate_for_primary(&store, &index, &primary, AssociationStrategy::UnitBased)
            .await
            .unwrap();
        assert_eq!(association.associated_records.len(), 1);
        assert_eq!(association.associated_records[0].secondary_id, "S1");
        assert!((association.association_confidence - 0.88).abs() < 1e-9);
    }

    #[tokio::test]
    async fn building_based_ranked_first_in_hybrid() {
        let primary = unit("P1", "Acme Trading Co., Ltd.", Some("91000000MA1ABCDE0X"), Some("Shanghai Pudong District Main Street 1"));
        let building_mate = unit("S1", "Totally Unrelated Name", None, Some("Shanghai Pudong District Main Street 1"));
        let credit_mate = unit("S2", "Different Name Entirely", Some("91000000MA1ABCDE0X"), None);
        let store = InMemoryLinkageStore::new();
        let index = InMemorySecondaryIndex::build(vec![building_mate, credit_mate]);

        let association = aggregate_for_primary(&store, &index, &primary, AssociationStrategy::Hybrid)
            .await
            .unwrap();
        assert_eq!(association.associated_records.len(), 2);
        assert_eq!(association.associated_records[0].secondary_id, "S1");
    }

    #[tokio::test]
    async fn empty_group_has_zero_confidence() {
        let primary = unit("P1", "Acme Trading Co., Ltd.", None, None);
        let store = InMemoryLinkageStore::new();
        let index = InMemorySecondaryIndex::build(vec![]);
        let association = aggregate_for_primary(&store, &index, &primary, AssociationStrategy::Hybrid)
            .await
            .unwrap();
        assert_eq!(association.association_confidence, 0.0);
        assert_eq!(association.data_quality_score, kernels::round4(0.6 * primary.field_completeness()));
    }

    #[tokio::test]
    async fn regenerate_all_writes_one_association_per_primary() {
        let primaries = vec![
            unit("P1", "Acme Trading Co., Ltd.", None, None),
            unit("P2", "Beta Holdings", None, None),
        ];
        let linkage = InMemoryLinkageStore::new();
        let index = InMemorySecondaryIndex::build(vec![]);
        let assoc_store = InMemoryAssociationStore::new();
        let written = regenerate_all(&linkage, &index, &assoc_store, &primaries, AssociationStrategy::Hybrid, false)
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(assoc_store.all().await.unwrap().len(), 2);
    }
}
