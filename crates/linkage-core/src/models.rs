//! Data model for the record-linkage engine.
//!
//! `Unit` is the logical shape shared by both data sources; `LinkageResult`
//! and `EnhancedAssociation` are the two collections the engine persists.
//! Identifier-bearing fields are always `String` — never coerced through a
//! numeric type — to avoid the precision loss and leading-zero truncation
//! that numeric-looking IDs are prone to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which administrative data source a [`Unit`] was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// The hazard-inspection registry; the "point of view" for every
    /// [`LinkageResult`].
    Primary,
    /// The supervisory registry; candidates linked to a primary unit.
    Secondary,
}

/// A business-unit record as read from either source, before normalization.
///
/// `id` and `credit_code` MUST be treated as opaque strings end-to-end:
/// ingestion adapters must refuse to coerce them to a numeric type, since
/// doing so has historically caused leading-zero truncation and floating
/// point precision loss on credit codes that look numeric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_representative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_manager: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
}

impl Unit {
    /// Fraction of the seven logical Unit fields that are non-empty,
    /// used by the Aggregator's `data_quality_score` (§4.7).
    #[must_use]
    pub fn field_completeness(&self) -> f64 {
        let fields: [bool; 6] = [
            !self.name.trim().is_empty(),
            self.credit_code.as_deref().is_some_and(|s| !s.trim().is_empty()),
            self.address.as_deref().is_some_and(|s| !s.trim().is_empty()),
            self.legal_representative
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty()),
            self.safety_manager.as_deref().is_some_and(|s| !s.trim().is_empty()),
            self.contact_phone.as_deref().is_some_and(|s| !s.trim().is_empty()),
        ];
        // `id` is always non-empty by construction, counted as the 7th field.
        let non_empty = 1 + fields.iter().filter(|b| **b).count();
        non_empty as f64 / 7.0
    }

    /// Whether this unit has no identifying fields at all (§8 boundary case).
    #[must_use]
    pub fn has_no_identifying_fields(&self) -> bool {
        self.name.trim().is_empty()
            && self.credit_code.as_deref().is_none_or(|s| s.trim().is_empty())
    }
}

/// A tagged address token, produced by the Normalizer (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressComponent {
    Province,
    City,
    District,
    Detail,
}

/// A single address token with its tagged component kind, if recognized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressToken {
    pub text: String,
    pub component: Option<AddressComponent>,
}

/// Derived, normalized view of a [`Unit`] (§3 Normalized Unit).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedUnit {
    pub name_canonical: String,
    pub name_core: String,
    pub name_slices: Vec<String>,
    pub address_tokens: Vec<AddressToken>,
    pub address_keywords: Vec<String>,
}

impl NormalizedUnit {
    #[must_use]
    pub fn is_unmatchable(&self) -> bool {
        self.name_canonical.is_empty()
    }
}

/// One of the four strategies the Layered Matcher can conclude with, or
/// `None` when no strategy found a match (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactCreditCode,
    ExactNameCanonical,
    FuzzyPrefiltered,
    FuzzyGlobal,
    GraphAssisted,
    None,
}

impl MatchType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExactCreditCode => "exact_credit_code",
            Self::ExactNameCanonical => "exact_name_canonical",
            Self::FuzzyPrefiltered => "fuzzy_prefiltered",
            Self::FuzzyGlobal => "fuzzy_global",
            Self::GraphAssisted => "graph_assisted",
            Self::None => "none",
        }
    }

    /// Both deterministic match types imply `similarity_score == 1.0`
    /// (Invariant 3).
    #[must_use]
    pub const fn is_deterministic(self) -> bool {
        matches!(self, Self::ExactCreditCode | Self::ExactNameCanonical)
    }
}

/// Confidence bucket derived from `match_type` + `similarity_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    High,
    Medium,
    Low,
    None,
}

impl MatchConfidence {
    /// Derive confidence from the match type and rounded score, matching
    /// the thresholds used by the Layered Matcher's own acceptance gates.
    #[must_use]
    pub fn derive(match_type: MatchType, score: f64) -> Self {
        match match_type {
            MatchType::None => Self::None,
            MatchType::ExactCreditCode | MatchType::ExactNameCanonical => Self::High,
            MatchType::FuzzyPrefiltered | MatchType::FuzzyGlobal | MatchType::GraphAssisted => {
                if score >= 0.85 {
                    Self::High
                } else if score >= 0.75 {
                    Self::Medium
                } else {
                    Self::Low
                }
            }
        }
    }
}

/// Structured reasoning attached to every match decision (§4.4).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchExplanation {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    pub field_scores: std::collections::BTreeMap<String, f64>,
}

/// Review workflow state for a [`LinkageResult`] (Invariant 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// One record per PRIMARY unit, regardless of outcome (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkageResult {
    pub match_id: String,

    pub primary_id: String,
    pub primary_snapshot: Unit,

    pub matched_id: Option<String>,
    pub matched_snapshot: Option<Unit>,

    pub match_type: MatchType,
    pub similarity_score: f64,
    pub match_confidence: MatchConfidence,
    pub match_explanation: MatchExplanation,

    pub review_status: ReviewStatus,
    pub review_notes: Option<String>,
    pub reviewer: Option<String>,
    pub review_timestamp: Option<DateTime<Utc>>,

    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
}

impl LinkageResult {
    /// `match_id` is a stable hash of `primary_id` + `matched_id` (or the
    /// literal `NONE`), so re-runs produce the same identity for the same
    /// pairing and the store can upsert idempotently (Invariant 1).
    #[must_use]
    pub fn derive_match_id(primary_id: &str, matched_id: Option<&str>) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(primary_id.as_bytes());
        hasher.update(b"|");
        hasher.update(matched_id.unwrap_or("NONE").as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Build the `match_type = none` result for a primary record the
    /// matcher could not place anywhere (Invariant 4).
    #[must_use]
    pub fn none(primary: Unit, explanation: MatchExplanation, now: DateTime<Utc>) -> Self {
        let match_id = Self::derive_match_id(&primary.id, None);
        Self {
            match_id,
            primary_id: primary.id.clone(),
            primary_snapshot: primary,
            matched_id: None,
            matched_snapshot: None,
            match_type: MatchType::None,
            similarity_score: 0.0,
            match_confidence: MatchConfidence::None,
            match_explanation: explanation,
            review_status: ReviewStatus::Pending,
            review_notes: None,
            reviewer: None,
            review_timestamp: None,
            created_time: now,
            updated_time: now,
        }
    }
}

/// A single SECONDARY member of an [`EnhancedAssociation`] group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociatedRecord {
    pub secondary_id: String,
    pub match_type: MatchType,
    pub similarity_score: f64,
    pub snapshot: Unit,
    pub inspection_timestamp: Option<DateTime<Utc>>,
}

/// How a group of associated records was assembled (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationStrategy {
    BuildingBased,
    UnitBased,
    Hybrid,
}

/// 1:N grouping of SECONDARY records under one PRIMARY unit (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedAssociation {
    pub association_id: String,
    pub primary_id: String,
    pub primary_snapshot: Unit,
    pub associated_records: Vec<AssociatedRecord>,
    pub association_strategy: AssociationStrategy,
    pub association_confidence: f64,
    pub data_quality_score: f64,
    pub regenerated_time: DateTime<Utc>,
}

impl EnhancedAssociation {
    #[must_use]
    pub fn derive_association_id(primary_id: &str, strategy: AssociationStrategy) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(primary_id.as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{strategy:?}").as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str) -> Unit {
        Unit {
            id: "P1".into(),
            name: name.into(),
            credit_code: None,
            address: None,
            legal_representative: None,
            safety_manager: None,
            contact_phone: None,
        }
    }

    #[test]
    fn match_id_is_stable_for_same_pairing() {
        let a = LinkageResult::derive_match_id("P1", Some("S1"));
        let b = LinkageResult::derive_match_id("P1", Some("S1"));
        assert_eq!(a, b);
        let c = LinkageResult::derive_match_id("P1", None);
        assert_ne!(a, c);
    }

    #[test]
    fn empty_unit_has_no_identifying_fields() {
        let u = unit("");
        assert!(u.has_no_identifying_fields());
    }

    #[test]
    fn field_completeness_counts_id_and_name_only_by_default() {
        let u = unit("Acme");
        assert!((u.field_completeness() - 2.0 / 7.0).abs() < 1e-9);
    }
}
