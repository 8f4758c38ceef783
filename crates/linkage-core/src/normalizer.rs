//! Text Normalizer (§4.1): deterministic normalization of names and
//! addresses so that two textual references can be compared.
//!
//! The pipeline never fails; pathological input simply normalizes to an
//! empty `name_canonical`, which downstream components treat as
//! un-matchable (see [`NormalizedUnit::is_unmatchable`]).

use std::sync::LazyLock;

use unicode_normalization::UnicodeNormalization;

use crate::models::{AddressComponent, AddressToken, NormalizedUnit, Unit};

/// Administrative-region prefixes, longest-match-first, applied greedily
/// from the left to derive `name_core`. Ordering matters: a later, shorter
/// prefix must never shadow an earlier, longer one.
const ADMIN_PREFIXES: &[&str] = &[
    "INNER MONGOLIA AUTONOMOUS REGION",
    "GUANGXI ZHUANG AUTONOMOUS REGION",
    "XINJIANG UYGUR AUTONOMOUS REGION",
    "NINGXIA HUI AUTONOMOUS REGION",
    "TIBET AUTONOMOUS REGION",
    "SHANGHAI MUNICIPALITY",
    "BEIJING MUNICIPALITY",
    "TIANJIN MUNICIPALITY",
    "CHONGQING MUNICIPALITY",
    "SHANGHAI",
    "BEIJING",
    "TIANJIN",
    "CHONGQING",
    "PROVINCE",
];

/// Organizational-suffix tokens, longest-match-first, applied from the
/// right to derive `name_core` from `name_canonical`.
const ORG_SUFFIXES: &[&str] = &[
    "CO., LTD.",
    "CO.,LTD.",
    "CO., LTD",
    "CO.,LTD",
    "COMPANY LIMITED",
    "LIMITED LIABILITY COMPANY",
    "JOINT STOCK COMPANY",
    "LIMITED COMPANY",
    "CORPORATION",
    "INCORPORATED",
    "LIMITED",
    "CORP",
    "CO",
    "LTD",
    "INC",
    "LLC",
    "GROUP",
    "FACTORY",
    "WORKSHOP",
    "ENTERPRISE",
    "COOPERATIVE",
    "STUDIO",
];

const STOPWORDS: &[&str] = &[
    "AND", "THE", "OF", "A", "AN", "FOR", "IN", "ON", "AT", "TO", "NO", "DISTRICT", "CITY",
    "PROVINCE", "STREET", "ROAD",
];

static PROVINCE_DICT: &[&str] = &[
    "ANHUI", "BEIJING", "CHONGQING", "FUJIAN", "GANSU", "GUANGDONG", "GUANGXI", "GUIZHOU",
    "HAINAN", "HEBEI", "HEILONGJIANG", "HENAN", "HUBEI", "HUNAN", "JIANGSU", "JIANGXI", "JILIN",
    "LIAONING", "NINGXIA", "QINGHAI", "SHAANXI", "SHANDONG", "SHANGHAI", "SHANXI", "SICHUAN",
    "TIANJIN", "TIBET", "XINJIANG", "YUNNAN", "ZHEJIANG",
];

static CITY_DICT: &[&str] = &["CITY", "PREFECTURE", "MUNICIPALITY"];
static DISTRICT_DICT: &[&str] = &["DISTRICT", "COUNTY", "TOWNSHIP", "BOROUGH"];

static BRACKET_ANNOTATION: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[(（][^)）]*[)）]").expect("static regex compiles"));
static PUNCTUATION: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[^\p{L}\p{N}\s]").expect("static regex compiles"));
static WHITESPACE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\s+").expect("static regex compiles"));

/// Unicode-normalize, width-fold, uppercase. Step 1-2 of the name pipeline,
/// reused for addresses.
fn canonicalize_base(input: &str) -> String {
    let decomposed: String = input.nfkc().collect();
    fold_width(&decomposed).to_uppercase()
}

/// Fold full-width ASCII forms (U+FF01..U+FF5E) down to their ASCII
/// equivalents. `NFKC` already handles most compatibility folding, but
/// full-width digits/letters are common enough in these registries to be
/// handled explicitly and defensively.
fn fold_width(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            let code = c as u32;
            if (0xFF01..=0xFF5E).contains(&code) {
                char::from_u32(code - 0xFEE0).unwrap_or(c)
            } else if c == '\u{3000}' {
                ' '
            } else {
                c
            }
        })
        .collect()
}

fn strip_bracket_annotations(input: &str) -> String {
    BRACKET_ANNOTATION.replace_all(input, "").into_owned()
}

fn strip_punctuation_and_collapse(input: &str) -> String {
    let no_punct = PUNCTUATION.replace_all(input, " ");
    WHITESPACE.replace_all(no_punct.trim(), " ").into_owned()
}

/// Remove the longest matching administrative prefix from the left.
fn strip_admin_prefix(input: &str) -> String {
    let mut best: Option<&str> = None;
    for prefix in ADMIN_PREFIXES {
        if input.starts_with(prefix) && best.is_none_or(|b| prefix.len() > b.len()) {
            best = Some(prefix);
        }
    }
    match best {
        Some(prefix) => input[prefix.len()..].trim_start().to_string(),
        None => input.to_string(),
    }
}

/// Remove the longest matching organizational suffix from the right.
fn strip_org_suffix(input: &str) -> String {
    let mut best: Option<&str> = None;
    for suffix in ORG_SUFFIXES {
        if input.ends_with(suffix) && best.is_none_or(|b| suffix.len() > b.len()) {
            best = Some(suffix);
        }
    }
    match best {
        Some(suffix) => input[..input.len() - suffix.len()].trim_end().to_string(),
        None => input.to_string(),
    }
}

/// Tokenize whitespace-delimited or CJK text. Latin runs split on
/// whitespace; CJK runs are segmented one character at a time, which is a
/// conservative stand-in for a real word segmenter and matches the
/// "language-appropriate segmentation" the pipeline calls for without
/// pulling in a dictionary-backed CJK tokenizer.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in input.chars() {
        if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        if is_cjk(c) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(c.to_string());
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn is_cjk(c: char) -> bool {
    let code = c as u32;
    (0x4E00..=0x9FFF).contains(&code) || (0x3400..=0x4DBF).contains(&code)
}

/// Normalize a name through the full pipeline (§4.1 steps 1-7), returning
/// `name_canonical`, `name_core`, and `name_slices`.
#[must_use]
pub fn normalize_name(raw: &str) -> (String, String, Vec<String>) {
    let base = canonicalize_base(raw);
    let stripped = strip_bracket_annotations(&base);
    let canonical = strip_punctuation_and_collapse(&stripped);
    let core = strip_org_suffix(&strip_admin_prefix(&canonical));
    let no_space_canonical: String = canonical.chars().filter(|c| !c.is_whitespace()).collect();
    let slices = name_slices(&no_space_canonical);
    (canonical, core, slices)
}

/// First `k` characters of `name_canonical` (whitespace removed) for
/// `k in {2,3,4}`, used as blocking keys by the Prefilter.
fn name_slices(no_space_canonical: &str) -> Vec<String> {
    let chars: Vec<char> = no_space_canonical.chars().collect();
    [2usize, 3, 4]
        .into_iter()
        .filter(|k| chars.len() >= *k)
        .map(|k| chars[..k].iter().collect::<String>())
        .collect()
}

/// Normalize an address into tagged tokens + keywords (§4.1).
#[must_use]
pub fn normalize_address(raw: &str) -> (Vec<AddressToken>, Vec<String>) {
    let base = canonicalize_base(raw);
    let stripped = strip_bracket_annotations(&base);
    let cleaned = strip_punctuation_and_collapse(&stripped);
    let raw_tokens = tokenize(&cleaned);

    let tokens: Vec<AddressToken> = raw_tokens
        .into_iter()
        .map(|text| {
            let component = tag_component(&text);
            AddressToken { text, component }
        })
        .collect();

    let keywords = tokens
        .iter()
        .filter(|t| t.text.chars().count() >= 2 && !STOPWORDS.contains(&t.text.as_str()))
        .map(|t| t.text.clone())
        .collect();

    (tokens, keywords)
}

fn tag_component(token: &str) -> Option<AddressComponent> {
    if PROVINCE_DICT.contains(&token) {
        Some(AddressComponent::Province)
    } else if CITY_DICT.contains(&token) {
        Some(AddressComponent::City)
    } else if DISTRICT_DICT.contains(&token) {
        Some(AddressComponent::District)
    } else if token.chars().count() >= 2 {
        Some(AddressComponent::Detail)
    } else {
        None
    }
}

/// Produce the full [`NormalizedUnit`] for a [`Unit`].
#[must_use]
pub fn normalize_unit(unit: &Unit) -> NormalizedUnit {
    let (name_canonical, name_core, name_slices) = normalize_name(&unit.name);
    let (address_tokens, address_keywords) = unit
        .address
        .as_deref()
        .map(normalize_address)
        .unwrap_or_default();
    NormalizedUnit {
        name_canonical,
        name_core,
        name_slices,
        address_tokens,
        address_keywords,
    }
}

/// Normalize a credit code to its canonical uppercase ASCII form.
#[must_use]
pub fn normalize_credit_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Strip non-digits and a leading country code (`86`/`+86`) from a phone
/// number, used by the phone similarity kernel.
#[must_use]
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits
        .strip_prefix("0086")
        .or_else(|| digits.strip_prefix("86"))
        .map_or(digits.clone(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let cases = [
            "Shanghai Acme Technology Co., Ltd.",
            "  messy   (parenthetical)  Name!! ",
            "",
            "福建某某有限公司",
        ];
        for raw in cases {
            let (c1, core1, slices1) = normalize_name(raw);
            let (c2, core2, _slices2) = normalize_name(&c1);
            // Re-normalizing canonical output must not change the core
            // derivation: no further prefixes/suffixes to strip, no further
            // punctuation to remove.
            assert_eq!(core1, core2, "core differs for {raw:?}");
            assert_eq!(c1, c2, "canonical differs for {raw:?}");
            let _ = slices1;
        }
    }

    #[test]
    fn strips_admin_prefix_and_org_suffix() {
        let (canonical, core, _) = normalize_name("Shanghai Acme Technology Co., Ltd.");
        assert!(canonical.contains("ACME"));
        assert_eq!(core, "ACME TECHNOLOGY");
    }

    #[test]
    fn pathological_input_yields_empty_canonical() {
        let (canonical, _, slices) = normalize_name("   !!! ((()))   ");
        assert!(canonical.is_empty());
        assert!(slices.is_empty());
    }

    #[test]
    fn phone_normalization_strips_country_code() {
        assert_eq!(normalize_phone("+86 138-0013-8000"), "13800138000");
        assert_eq!(normalize_phone("0086-13800138000"), "13800138000");
    }

    #[test]
    fn credit_code_canonical_is_uppercase() {
        assert_eq!(normalize_credit_code(" 91000000ma1abcde0x "), "91000000MA1ABCDE0X");
    }
}
