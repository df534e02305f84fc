// src/normalize/address.rs - Address canonicalization and the identity key
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Shortest normalized address (in chars) worth matching.
pub const MIN_MATCHABLE_ADDRESS_CHARS: usize = 8;

/// Number of leading tokens treated as coarse geography.
pub const GEO_TOKEN_COUNT: usize = 2;

/// Administrative-division long forms and their short forms. Matched as a
/// prefix of the leading address token, longest first.
const ADMIN_DIVISION_FORMS: &[(&str, &str)] = &[
    ("서울특별시", "서울"),
    ("서울시", "서울"),
    ("부산광역시", "부산"),
    ("부산시", "부산"),
    ("대구광역시", "대구"),
    ("대구시", "대구"),
    ("인천광역시", "인천"),
    ("인천시", "인천"),
    ("광주광역시", "광주"),
    ("대전광역시", "대전"),
    ("대전시", "대전"),
    ("울산광역시", "울산"),
    ("울산시", "울산"),
    ("세종특별자치시", "세종"),
    ("세종시", "세종"),
    ("경기도", "경기"),
    ("강원특별자치도", "강원"),
    ("강원도", "강원"),
    ("충청북도", "충북"),
    ("충청남도", "충남"),
    ("전북특별자치도", "전북"),
    ("전라북도", "전북"),
    ("전라남도", "전남"),
    ("경상북도", "경북"),
    ("경상남도", "경남"),
    ("제주특별자치도", "제주"),
    ("제주도", "제주"),
];

static PARENTHESIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)").expect("parenthesis pattern is valid"));

/// Returns `s` in NFC with any long-form division in the leading token
/// replaced by its short form. Whitespace is collapsed to single spaces.
pub fn canonicalize_admin_division(s: &str) -> String {
    let nfc: String = s.nfc().collect();
    let mut tokens = nfc.split_whitespace();
    let Some(first) = tokens.next() else {
        return String::new();
    };

    let replacement = ADMIN_DIVISION_FORMS
        .iter()
        .filter(|(long, _)| first.starts_with(long))
        .max_by_key(|(long, _)| long.len())
        .map(|(long, short)| format!("{}{}", short, &first[long.len()..]));

    let mut out = replacement.unwrap_or_else(|| first.to_string());
    for token in tokens {
        out.push(' ');
        out.push_str(token);
    }
    out
}

/// Matching form of an address: parenthesized detail removed, divisions
/// canonicalized, hyphens dropped, whitespace collapsed.
///
/// Returns `None` for blank, masked (`*`), or too-short addresses; those
/// records stay in the output but are never matched.
pub fn normalize_address(address: &str) -> Option<String> {
    let trimmed = address.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return None;
    }
    let without_detail = PARENTHESIZED.replace_all(trimmed, " ");
    let canonical = canonicalize_admin_division(&without_detail).replace('-', "");
    let normalized = canonical.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalized.contains('*') || normalized.chars().count() < MIN_MATCHABLE_ADDRESS_CHARS {
        return None;
    }
    Some(normalized)
}

/// Leading tokens of a normalized address (city / district level).
pub fn geo_tokens(normalized_address: &str) -> Vec<&str> {
    normalized_address
        .split_whitespace()
        .take(GEO_TOKEN_COUNT)
        .collect()
}

pub fn shares_geo_token(query: &str, candidate: &str) -> bool {
    let candidate_tokens = geo_tokens(candidate);
    geo_tokens(query)
        .iter()
        .any(|token| candidate_tokens.contains(token))
}

fn key_component(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Identity key for a business.
///
/// Both the loader and every overlay writer must call this function; a
/// drifting copy makes overlay entries silently stop matching.
pub fn identity_key(business_name: &str, address: &str) -> String {
    let name = business_name.trim();
    let name = if name.eq_ignore_ascii_case("nan") { "" } else { name };
    let addr = address.trim();
    let addr = if addr.eq_ignore_ascii_case("nan") { "" } else { addr };

    let name_nfc: String = name.nfc().collect();
    let addr_canonical = canonicalize_admin_division(addr);
    format!("{}_{}", key_component(&name_nfc), key_component(&addr_canonical))
}
