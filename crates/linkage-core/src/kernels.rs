//! Similarity Kernels (§4.2): pure, total functions computing similarity
//! for the three field kinds the matcher composes. All kernels return a
//! score in `[0.0, 1.0]` and are defined even on empty inputs.

use std::collections::BTreeSet;

use crate::models::NormalizedUnit;

/// Round a score to 4 decimals, the stored precision used by every kernel
/// so that strictly-less-than comparisons are stable across runs.
#[must_use]
pub fn round4(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

/// Levenshtein edit distance between two character sequences.
fn edit_distance(a: &[char], b: &[char]) -> usize {
    let (n, m) = (a.len(), b.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];
    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

/// Normalized edit distance similarity: `1 - distance / max_len`.
fn edit_similarity(a: &str, b: &str) -> f64 {
    let ac: Vec<char> = a.chars().collect();
    let bc: Vec<char> = b.chars().collect();
    let max_len = ac.len().max(bc.len());
    if max_len == 0 {
        return 0.0;
    }
    let dist = edit_distance(&ac, &bc);
    1.0 - (dist as f64 / max_len as f64)
}

fn char_token_set(s: &str) -> BTreeSet<String> {
    s.chars().map(String::from).collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Common-prefix/suffix length ratio over `name_core`.
fn prefix_suffix_ratio(a: &str, b: &str) -> f64 {
    let ac: Vec<char> = a.chars().collect();
    let bc: Vec<char> = b.chars().collect();
    if ac.is_empty() || bc.is_empty() {
        return 0.0;
    }
    let prefix_len = ac.iter().zip(bc.iter()).take_while(|(x, y)| x == y).count();
    let suffix_len = ac
        .iter()
        .rev()
        .zip(bc.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let max_len = ac.len().max(bc.len());
    (prefix_len + suffix_len) as f64 / max_len as f64
}

/// Name similarity: weighted mean of edit distance (0.5), token-set
/// Jaccard (0.3), and prefix/suffix common-length ratio on `name_core`
/// (0.2).
#[must_use]
pub fn name_similarity(a: &NormalizedUnit, b: &NormalizedUnit) -> f64 {
    if a.name_canonical.is_empty() || b.name_canonical.is_empty() {
        return 0.0;
    }
    let edit = edit_similarity(&a.name_canonical, &b.name_canonical);
    let jac = jaccard(&char_token_set(&a.name_canonical), &char_token_set(&b.name_canonical));
    let affix = prefix_suffix_ratio(&a.name_core, &b.name_core);
    round4(0.5 * edit + 0.3 * jac + 0.2 * affix)
}

/// `name_core` similarity alone — the basis of the L3/L4 hard gates.
#[must_use]
pub fn name_core_similarity(a: &NormalizedUnit, b: &NormalizedUnit) -> f64 {
    if a.name_core.is_empty() || b.name_core.is_empty() {
        return 0.0;
    }
    round4(edit_similarity(&a.name_core, &b.name_core))
}

/// Jaccard overlap over whitespace-delimited tokens, falling back to
/// character tokens for scripts that never insert whitespace (the same
/// shape as `name_similarity`'s Jaccard term).
fn token_overlap_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let tokenize = |s: &str| -> BTreeSet<String> {
        let words: BTreeSet<String> = s.split_whitespace().map(str::to_string).collect();
        if words.len() > 1 {
            words
        } else {
            char_token_set(s)
        }
    };
    jaccard(&tokenize(a), &tokenize(b))
}

/// Address similarity: weighted sum over tagged components.
#[must_use]
pub fn address_similarity(a: &NormalizedUnit, b: &NormalizedUnit) -> f64 {
    use crate::models::AddressComponent as C;
    let extract = |unit: &NormalizedUnit, comp: C| -> String {
        unit.address_tokens
            .iter()
            .filter(|t| t.component == Some(comp))
            .map(|t| t.text.clone())
            .collect::<Vec<_>>()
            .join("")
    };
    let weights = [(C::Province, 0.2), (C::City, 0.3), (C::District, 0.3), (C::Detail, 0.2)];
    let score: f64 = weights
        .iter()
        .map(|(comp, w)| w * token_overlap_ratio(&extract(a, *comp), &extract(b, *comp)))
        .sum();
    round4(score)
}

/// Person (legal representative / safety manager) name similarity:
/// 1.0 on exact match, 0.5 on a proper prefix relationship (both length
/// >= 2), else 0.0.
#[must_use]
pub fn person_similarity(a: Option<&str>, b: Option<&str>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    let na = a.trim().to_uppercase();
    let nb = b.trim().to_uppercase();
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    if na == nb {
        return 1.0;
    }
    let both_long_enough = na.chars().count() >= 2 && nb.chars().count() >= 2;
    let is_proper_prefix = (na.starts_with(&nb) && na != nb) || (nb.starts_with(&na) && na != nb);
    if both_long_enough && is_proper_prefix {
        0.5
    } else {
        0.0
    }
}

/// Phone similarity: 1.0 on equality after stripping non-digits and a
/// leading country code, 0.0 otherwise.
#[must_use]
pub fn phone_similarity(a: Option<&str>, b: Option<&str>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    let na = crate::normalizer::normalize_phone(a);
    let nb = crate::normalizer::normalize_phone(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    f64::from(u8::from(na == nb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize_unit;
    use crate::models::Unit;

    fn unit(name: &str, address: Option<&str>) -> Unit {
        Unit {
            id: "X".into(),
            name: name.into(),
            credit_code: None,
            address: address.map(String::from),
            legal_representative: None,
            safety_manager: None,
            contact_phone: None,
        }
    }

    #[test]
    fn name_similarity_is_one_for_identical_names() {
        let u = normalize_unit(&unit("Acme Technology Co., Ltd.", None));
        assert!((name_similarity(&u, &u) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn name_similarity_is_zero_for_empty_canonical() {
        let empty = normalize_unit(&unit("!!!", None));
        let other = normalize_unit(&unit("Acme", None));
        assert_eq!(name_similarity(&empty, &other), 0.0);
    }

    #[test]
    fn person_similarity_prefix_case() {
        assert_eq!(person_similarity(Some("Zhang"), Some("Zhang San")), 0.5);
        assert_eq!(person_similarity(Some("Zhang San"), Some("Zhang San")), 1.0);
        assert_eq!(person_similarity(Some("Zhang"), Some("Li")), 0.0);
        assert_eq!(person_similarity(None, Some("Li")), 0.0);
    }

    #[test]
    fn phone_similarity_equality_after_normalization() {
        assert_eq!(phone_similarity(Some("+86 13800138000"), Some("013800138000")), 0.0);
        assert_eq!(phone_similarity(Some("+86 13800138000"), Some("13800138000")), 1.0);
    }

    #[test]
    fn scores_are_within_unit_range() {
        let a = normalize_unit(&unit("Shanghai Acme Tech Co., Ltd.", Some("Shanghai Pudong District Main Street 1")));
        let b = normalize_unit(&unit("Acme Technology", Some("Pudong District")));
        let s = name_similarity(&a, &b);
        assert!((0.0..=1.0).contains(&s));
        let addr = address_similarity(&a, &b);
        assert!((0.0..=1.0).contains(&addr));
    }
}
