//! Layered Matcher (§4.4): applies L1-L4 in order and returns the first
//! conclusive match, or `MatchType::None`.

use linkage_core::kernels;
use linkage_core::normalizer::{self, normalize_unit};
use linkage_core::{MatchConfidence, MatchConfig, MatchExplanation, MatchType, NormalizedUnit, Unit};

use crate::graph::AttributeGraph;
use crate::prefilter::prefilter;
use crate::secondary_index::SecondaryIndex;

/// Outcome of a single-record match attempt, pre-persistence: the caller
/// (the Batch Task Engine) stamps `primary_id`/timestamps/`match_id` and
/// writes the [`linkage_core::LinkageResult`].
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub match_type: MatchType,
    pub matched: Option<Unit>,
    pub score: f64,
    pub confidence: MatchConfidence,
    pub explanation: MatchExplanation,
}

impl MatchOutcome {
    fn none(explanation: MatchExplanation) -> Self {
        Self {
            match_type: MatchType::None,
            matched: None,
            score: 0.0,
            confidence: MatchConfidence::None,
            explanation,
        }
    }
}

/// Composite L3/L4 score: `0.55*name + 0.25*address + 0.10*legal_rep +
/// 0.10*phone` (§4.4), plus the per-field scores and explanation entries
/// that formula's inputs justify.
fn composite_score(
    primary: &Unit,
    primary_norm: &NormalizedUnit,
    candidate: &Unit,
    candidate_norm: &NormalizedUnit,
) -> (f64, std::collections::BTreeMap<String, f64>, Vec<String>, Vec<String>) {
    let name = kernels::name_similarity(primary_norm, candidate_norm);
    let address = kernels::address_similarity(primary_norm, candidate_norm);
    let legal_rep = kernels::person_similarity(
        primary.legal_representative.as_deref(),
        candidate.legal_representative.as_deref(),
    );
    let phone = kernels::phone_similarity(primary.contact_phone.as_deref(), candidate.contact_phone.as_deref());

    let mut field_scores = std::collections::BTreeMap::new();
    field_scores.insert("name".to_string(), name);
    field_scores.insert("address".to_string(), address);
    field_scores.insert("legal_representative".to_string(), legal_rep);
    field_scores.insert("phone".to_string(), phone);

    let mut positive = Vec::new();
    let mut negative = Vec::new();
    if legal_rep >= 0.99 {
        positive.push("legal representative matches".to_string());
    } else if primary.legal_representative.is_some() && candidate.legal_representative.is_some() {
        negative.push("legal representative differs".to_string());
    }
    if phone >= 0.99 {
        positive.push("phone matches".to_string());
    } else if primary.contact_phone.is_some() && candidate.contact_phone.is_some() {
        negative.push("phone mismatch".to_string());
    }
    positive.push(format!("name_core similarity {:.2}", kernels::round4(
        kernels::name_core_similarity(primary_norm, candidate_norm),
    )));

    let s = kernels::round4(0.55 * name + 0.25 * address + 0.10 * legal_rep + 0.10 * phone);
    (s, field_scores, positive, negative)
}

/// Stable tie-break: lexicographically smallest SECONDARY id.
fn smallest_id(units: &[Unit]) -> Unit {
    units
        .iter()
        .min_by(|a, b| a.id.cmp(&b.id))
        .cloned()
        .expect("caller guarantees a non-empty slice")
}

/// Run the full L1-L4 decision tree for one PRIMARY record.
pub async fn match_record(
    index: &dyn SecondaryIndex,
    graph: &AttributeGraph,
    primary: &Unit,
    config: &MatchConfig,
) -> MatchOutcome {
    let primary_norm = normalize_unit(primary);

    if primary.has_no_identifying_fields() {
        let mut explanation = MatchExplanation::default();
        explanation
            .negative
            .push("primary record has no identifying fields".to_string());
        return MatchOutcome::none(explanation);
    }

    // L1 — deterministic by credit code.
    if let Some(code) = primary.credit_code.as_deref().filter(|c| !c.trim().is_empty()) {
        let primary_code = normalizer::normalize_credit_code(code);
        if let Ok(candidates) = index.by_credit_code(&primary_code).await {
            let exact: Vec<Unit> = candidates
                .into_iter()
                .filter(|c| {
                    c.credit_code
                        .as_deref()
                        .is_some_and(|cc| normalizer::normalize_credit_code(cc) == primary_code)
                })
                .collect();
            if !exact.is_empty() {
                let matched = smallest_id(&exact);
                let mut explanation = MatchExplanation::default();
                explanation.positive.push("credit codes equal".to_string());
                explanation
                    .field_scores
                    .insert("credit_code".to_string(), 1.0);
                return MatchOutcome {
                    match_type: MatchType::ExactCreditCode,
                    matched: Some(matched),
                    score: 1.0,
                    confidence: MatchConfidence::High,
                    explanation,
                };
            }
        }
    }

    // L2 — deterministic by canonical name.
    if !primary_norm.name_canonical.is_empty() {
        if let Ok(candidates) = index.by_name_canonical(&primary_norm.name_canonical).await {
            let exact: Vec<Unit> = candidates
                .into_iter()
                .filter(|c| normalize_unit(c).name_canonical == primary_norm.name_canonical)
                .collect();
            if !exact.is_empty() {
                let matched = if exact.len() == 1 {
                    exact[0].clone()
                } else {
                    // Multiple collisions: pick the one maximizing address
                    // similarity, then stable tie-break on id.
                    let mut best_score = f64::MIN;
                    let mut best: Vec<Unit> = Vec::new();
                    for candidate in &exact {
                        let candidate_norm = normalize_unit(candidate);
                        let addr_score = kernels::address_similarity(&primary_norm, &candidate_norm);
                        match addr_score.partial_cmp(&best_score).unwrap_or(std::cmp::Ordering::Equal) {
                            std::cmp::Ordering::Greater => {
                                best_score = addr_score;
                                best = vec![candidate.clone()];
                            }
                            std::cmp::Ordering::Equal => best.push(candidate.clone()),
                            std::cmp::Ordering::Less => {}
                        }
                    }
                    smallest_id(&best)
                };
                let mut explanation = MatchExplanation::default();
                explanation
                    .positive
                    .push("name_canonical equal".to_string());
                return MatchOutcome {
                    match_type: MatchType::ExactNameCanonical,
                    matched: Some(matched),
                    score: 1.0,
                    confidence: MatchConfidence::High,
                    explanation,
                };
            }
        }
    }

    // Prefilter once; L3 and L4 share the same candidate set.
    let prefiltered = prefilter(index, primary, &primary_norm, config).await;
    if prefiltered.candidates.is_empty() {
        let mut explanation = MatchExplanation::default();
        if prefiltered.store_unavailable {
            explanation
                .negative
                .push("candidate store unavailable".to_string());
        }
        return MatchOutcome::none(explanation);
    }

    // L3 — prefiltered fuzzy.
    let mut best_l3: Option<(Unit, f64, std::collections::BTreeMap<String, f64>, Vec<String>, Vec<String>)> = None;
    let mut hard_gate_rejections: Vec<String> = Vec::new();
    for candidate in &prefiltered.candidates {
        let candidate_norm = normalize_unit(candidate);
        let name_core_sim = kernels::name_core_similarity(&primary_norm, &candidate_norm);
        if name_core_sim < config.name_core_hard_gate {
            hard_gate_rejections.push(format!(
                "name_core below hard gate {:.2} (candidate {})",
                config.name_core_hard_gate, candidate.id
            ));
            continue;
        }
        let (s, field_scores, positive, negative) =
            composite_score(primary, &primary_norm, candidate, &candidate_norm);
        let better = best_l3
            .as_ref()
            .map(|(best_unit, best_s, ..)| s > *best_s || (s == *best_s && candidate.id < best_unit.id))
            .unwrap_or(true);
        if better {
            best_l3 = Some((candidate.clone(), s, field_scores, positive, negative));
        }
    }

    if let Some((matched, s, field_scores, positive, negative)) = best_l3.clone() {
        if s >= config.theta1 {
            let mut explanation = MatchExplanation::default();
            explanation.positive = positive;
            explanation.negative = negative;
            explanation.field_scores = field_scores;
            return MatchOutcome {
                match_type: MatchType::FuzzyPrefiltered,
                matched: Some(matched),
                score: s,
                confidence: MatchConfidence::derive(MatchType::FuzzyPrefiltered, s),
                explanation,
            };
        }
    }

    // L4 — graph-assisted rescue of otherwise-tied weak L3 candidates.
    let mut best_l4: Option<(Unit, f64, std::collections::BTreeMap<String, f64>, Vec<String>, Vec<String>)> = None;
    for candidate in &prefiltered.candidates {
        let candidate_norm = normalize_unit(candidate);
        let name_core_sim = kernels::name_core_similarity(&primary_norm, &candidate_norm);
        if name_core_sim < config.name_core_hard_gate_l4 {
            continue;
        }
        let (s, field_scores, positive, mut negative) =
            composite_score(primary, &primary_norm, candidate, &candidate_norm);
        let shared = graph.shared_attr_count(&primary.id, &candidate.id);
        let graph_boost = (0.5 + 0.2 * shared as f64).min(1.0);
        let combined = kernels::round4(s.max(graph_boost));
        if graph_boost > s {
            negative.push(format!("graph corroboration from {shared} shared attributes"));
        }
        let mut field_scores = field_scores;
        field_scores.insert("graph_boost".to_string(), graph_boost);
        let better = best_l4
            .as_ref()
            .map(|(best_unit, best_s, ..)| combined > *best_s || (combined == *best_s && candidate.id < best_unit.id))
            .unwrap_or(true);
        if better {
            best_l4 = Some((candidate.clone(), combined, field_scores, positive, negative));
        }
    }

    if let Some((matched, combined, field_scores, positive, negative)) = best_l4 {
        if combined >= config.theta2 {
            let mut explanation = MatchExplanation::default();
            explanation.positive = positive;
            explanation.negative = negative;
            explanation.field_scores = field_scores;
            return MatchOutcome {
                match_type: MatchType::GraphAssisted,
                matched: Some(matched),
                score: combined,
                confidence: MatchConfidence::derive(MatchType::GraphAssisted, combined),
                explanation,
            };
        }
    }

    let mut explanation = MatchExplanation::default();
    explanation.negative = hard_gate_rejections;
    if let Some((_, s, field_scores, ..)) = best_l3 {
        explanation.field_scores = field_scores;
        explanation.negative.push(format!("best composite score {s:.2} below threshold"));
    }
    MatchOutcome::none(explanation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secondary_index::InMemorySecondaryIndex;
    use linkage_test_helpers::UnitBuilder;

    fn unit(
        id: &str,
        name: &str,
        code: Option<&str>,
        address: Option<&str>,
        legal_rep: Option<&str>,
        phone: Option<&str>,
    ) -> Unit {
        let mut b = UnitBuilder::new(id, name);
        if let Some(c) = code {
            b = b.credit_code(c);
        }
        if let Some(a) = address {
            b = b.address(a);
        }
        if let Some(r) = legal_rep {
            b = b.legal_representative(r);
        }
        if let Some(p) = phone {
            b = b.contact_phone(p);
        }
        b.build()
    }

    #[tokio::test]
    async fn s1_credit_code_exact() {
        let index = InMemorySecondaryIndex::build(vec![unit(
            "S7",
            "FOO TRADING",
            Some("91000000MA1ABCDE0X"),
            None,
            None,
            None,
        )]);
        let graph = AttributeGraph::build(std::iter::empty());
        let primary = unit(
            "P1",
            "Foo Trading Co., Ltd.",
            Some("91000000MA1ABCDE0X"),
            None,
            None,
            None,
        );
        let config = MatchConfig::default();
        let outcome = match_record(&index, &graph, &primary, &config).await;
        assert_eq!(outcome.match_type, MatchType::ExactCreditCode);
        assert!((outcome.score - 1.0).abs() < 1e-9);
        assert!(outcome.explanation.positive.contains(&"credit codes equal".to_string()));
    }

    #[tokio::test]
    async fn s4_hard_gate_rejects_despite_other_matches() {
        let secondary = unit(
            "S1",
            "Totally Different Co., Ltd.",
            None,
            Some("Shanghai Pudong District Main Street"),
            Some("Zhang San"),
            Some("13800138000"),
        );
        let index = InMemorySecondaryIndex::build(vec![secondary]);
        let graph = AttributeGraph::build(std::iter::empty());
        let primary = unit(
            "P1",
            "Foo Bar Widgets Co., Ltd.",
            None,
            Some("Shanghai Pudong District Main Street"),
            Some("Zhang San"),
            Some("13800138000"),
        );
        let config = MatchConfig::default();
        let outcome = match_record(&index, &graph, &primary, &config).await;
        assert_eq!(outcome.match_type, MatchType::None);
    }

    #[tokio::test]
    async fn no_identifying_fields_short_circuits() {
        let index = InMemorySecondaryIndex::build(vec![]);
        let graph = AttributeGraph::build(std::iter::empty());
        let primary = unit("P1", "", None, None, None, None);
        let config = MatchConfig::default();
        let outcome = match_record(&index, &graph, &primary, &config).await;
        assert_eq!(outcome.match_type, MatchType::None);
        assert!(outcome
            .explanation
            .negative
            .contains(&"primary record has no identifying fields".to_string()));
    }

    #[tokio::test]
    async fn s5_graph_assisted_rescue() {
        let secondary = unit(
            "S2",
            "Foo Bar Industries",
            None,
            Some("Different detail text entirely unrelated zone"),
            Some("Zhang San"),
            Some("13800138000"),
        );
        let index = InMemorySecondaryIndex::build(vec![secondary.clone()]);
        let primary = unit(
            "P1",
            "Foo Bar Widgets Holdings",
            None,
            Some("Some other address text zone"),
            Some("Zhang San"),
            Some("13800138000"),
        );
        let graph = AttributeGraph::build([&primary, &secondary]);
        let config = MatchConfig::default();
        let outcome = match_record(&index, &graph, &primary, &config).await;
        // Either rescued by the graph or accepted outright by L3; either
        // way it must not fall through to `none` given two shared strong
        // corroborating attributes.
        assert_ne!(outcome.match_type, MatchType::None);
    }
}
