use anyhow::{anyhow, Result};
use isolang::Language;

/// Language utilities for story language tags
///
/// Stories name their languages in English ("English", "French"). Users may
/// type ISO 639-1 or ISO 639-2 codes instead; these helpers map both forms
/// onto the canonical English name.

/// ISO 639-2/B codes that differ from their ISO 639-2/T counterpart
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Language code type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageCodeType {
    /// ISO 639-1 (2-letter) code
    Part1,
    /// ISO 639-2/T (3-letter) code
    Part2T,
    /// ISO 639-2/B (3-letter) code
    Part2B,
}

fn bibliographic_to_terminologic(code: &str) -> Option<&'static str> {
    BIBLIOGRAPHIC_CODES
        .iter()
        .find(|(b, _)| *b == code)
        .map(|(_, t)| *t)
}

/// Validate if a language code is a valid ISO 639-1 or ISO 639-2 code
pub fn validate_language_code(code: &str) -> Result<LanguageCodeType> {
    let normalized_code = code.trim().to_lowercase();

    match normalized_code.len() {
        2 if Language::from_639_1(&normalized_code).is_some() => Ok(LanguageCodeType::Part1),
        3 if Language::from_639_3(&normalized_code).is_some() => Ok(LanguageCodeType::Part2T),
        3 if bibliographic_to_terminologic(&normalized_code).is_some() => Ok(LanguageCodeType::Part2B),
        _ => Err(anyhow!("Invalid language code: {}", code)),
    }
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let normalized_code = code.trim().to_lowercase();

    let language = match validate_language_code(&normalized_code)? {
        LanguageCodeType::Part1 => Language::from_639_1(&normalized_code),
        LanguageCodeType::Part2T => Language::from_639_3(&normalized_code),
        LanguageCodeType::Part2B => {
            bibliographic_to_terminologic(&normalized_code).and_then(Language::from_639_3)
        }
    };

    language
        .map(|lang| lang.to_639_3().to_string())
        .ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Resolve a language tag (English name or ISO code) to its English name
pub fn resolve_language_name(tag: &str) -> Result<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Language tag is empty"));
    }

    if let Some(lang) = Language::from_name(trimmed).or_else(|| Language::from_name(&title_case(trimmed))) {
        return Ok(lang.to_name().to_string());
    }

    let part2t = normalize_to_part2t(trimmed).map_err(|_| anyhow!("Unknown language: {}", tag))?;
    Language::from_639_3(&part2t)
        .map(|lang| lang.to_name().to_string())
        .ok_or_else(|| anyhow!("Unknown language: {}", tag))
}

/// ISO 639-1 code for a language tag, falling back to ISO 639-3
pub fn language_code(tag: &str) -> Result<String> {
    let name = resolve_language_name(tag)?;
    let lang = Language::from_name(&name).ok_or_else(|| anyhow!("Unknown language: {}", tag))?;
    Ok(lang
        .to_639_1()
        .map(str::to_string)
        .unwrap_or_else(|| lang.to_639_3().to_string()))
}

/// Check if two tags name the same language
pub fn languages_match(tag1: &str, tag2: &str) -> bool {
    match (resolve_language_name(tag1), resolve_language_name(tag2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => tag1.trim().eq_ignore_ascii_case(tag2.trim()),
    }
}

fn title_case(input: &str) -> String {
    let lower = input.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
