/*!
 * Tests for language utility functions
 */

use storyforge::language_utils::{
    language_code, languages_match, normalize_to_part2t, resolve_language_name, validate_language_code,
    LanguageCodeType,
};

#[test]
fn test_validateLanguageCode_withValidCodes_shouldReturnCorrectType() {
    assert_eq!(validate_language_code("en").unwrap(), LanguageCodeType::Part1);
    assert_eq!(validate_language_code("deu").unwrap(), LanguageCodeType::Part2T);
    assert_eq!(validate_language_code("fre").unwrap(), LanguageCodeType::Part2B);
    assert_eq!(validate_language_code(" EN ").unwrap(), LanguageCodeType::Part1);

    assert!(validate_language_code("xyz").is_err());
    assert!(validate_language_code("e").is_err());
}

#[test]
fn test_normalizeToPart2t_shouldMapEveryForm() {
    assert_eq!(normalize_to_part2t("fr").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("FRA").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("ger").unwrap(), "deu");
}

#[test]
fn test_resolveLanguageName_shouldAcceptNamesAndCodes() {
    assert_eq!(resolve_language_name("French").unwrap(), "French");
    assert_eq!(resolve_language_name("spanish").unwrap(), "Spanish");
    assert_eq!(resolve_language_name("es").unwrap(), "Spanish");
    assert_eq!(resolve_language_name("nld").unwrap(), "Dutch");
    assert!(resolve_language_name("").is_err());
    assert!(resolve_language_name("Klingonese").is_err());
}

#[test]
fn test_languageCode_shouldReturnShortestCode() {
    assert_eq!(language_code("English").unwrap(), "en");
    assert_eq!(language_code("ger").unwrap(), "de");
}

#[test]
fn test_languagesMatch_withDifferentForms_shouldMatch() {
    assert!(languages_match("French", "fr"));
    assert!(languages_match("fre", "fra"));
    assert!(!languages_match("French", "German"));
    assert!(languages_match("Made Up", "made up"));
}
