//! Dictionary consistency checks.
//!
//! Nothing stops a language tree from drifting away from the canonical one;
//! a missing key just renders as the raw key for that language. This module
//! diffs every language against the canonical tree so the drift can be
//! caught at startup or in CI.

use crate::i18n::{Dictionary, LanguageRegistry, TranslationValue};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Validation report containing errors and warnings about a dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Structural problems: missing keys, shape mismatches, missing languages
    pub errors: Vec<String>,

    /// Non-structural issues: extra keys, placeholder drift
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Create a new empty validation report
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Check if the report has any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Check if the report is clean (no errors or warnings)
    pub fn is_clean(&self) -> bool {
        !self.has_errors() && !self.has_warnings()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Validator for dictionary consistency.
pub struct TranslationValidator;

// Matches {name} and {{name}}
static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

impl TranslationValidator {
    /// Diff every language in `dictionary` against the canonical language.
    ///
    /// Reports as errors:
    /// - registry languages with no tree in the dictionary
    /// - keys present in the canonical tree but missing in a translation
    /// - nodes whose shape (text/list/map) differs from the canonical one
    ///
    /// Reports as warnings:
    /// - keys only present in a translation
    /// - placeholder sets that differ from the canonical string
    /// - lists whose length differs from the canonical list
    pub fn check(dictionary: &Dictionary) -> ValidationReport {
        let mut report = ValidationReport::new();
        let canonical_code = LanguageRegistry::get().canonical().code;

        let Some(canonical) = dictionary.root(canonical_code) else {
            report.errors.push(format!(
                "Canonical language '{}' has no translations",
                canonical_code
            ));
            return report;
        };

        for config in LanguageRegistry::get().list_enabled() {
            if dictionary.root(config.code).is_none() {
                report.errors.push(format!(
                    "Language '{}' has no translations",
                    config.code
                ));
            }
        }

        for language in dictionary.languages() {
            if language == canonical_code {
                continue;
            }
            if let Some(root) = dictionary.root(language) {
                compare_nodes(language, "", canonical, root, &mut report);
            }
        }

        report
    }

    /// Extract the placeholder names used in a string.
    fn extract_placeholders(text: &str) -> BTreeSet<String> {
        let regex = PLACEHOLDER_REGEX
            .get_or_init(|| Regex::new(r"\{\{?\s*([A-Za-z0-9_]+)\s*\}?\}").unwrap());

        regex
            .captures_iter(text)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn compare_nodes(
    language: &str,
    path: &str,
    canonical: &TranslationValue,
    translated: &TranslationValue,
    report: &mut ValidationReport,
) {
    match (canonical, translated) {
        (TranslationValue::Map(expected), TranslationValue::Map(actual)) => {
            compare_maps(language, path, expected, actual, report);
        }
        (TranslationValue::Text(expected), TranslationValue::Text(actual)) => {
            let expected_placeholders = TranslationValidator::extract_placeholders(expected);
            let actual_placeholders = TranslationValidator::extract_placeholders(actual);
            if expected_placeholders != actual_placeholders {
                report.warnings.push(format!(
                    "[{}] {}: placeholder mismatch, expected {:?}, found {:?}",
                    language, path, expected_placeholders, actual_placeholders
                ));
            }
        }
        (TranslationValue::List(expected), TranslationValue::List(actual)) => {
            if expected.len() != actual.len() {
                report.warnings.push(format!(
                    "[{}] {}: list has {} items, expected {}",
                    language,
                    path,
                    actual.len(),
                    expected.len()
                ));
            }
        }
        (TranslationValue::Absent, TranslationValue::Absent) => {}
        (expected, actual) => {
            report.errors.push(format!(
                "[{}] {}: expected {}, found {}",
                language,
                path,
                expected.kind(),
                actual.kind()
            ));
        }
    }
}

fn compare_maps(
    language: &str,
    path: &str,
    expected: &BTreeMap<String, TranslationValue>,
    actual: &BTreeMap<String, TranslationValue>,
    report: &mut ValidationReport,
) {
    for (key, expected_child) in expected {
        let child_path = join_path(path, key);
        match actual.get(key) {
            Some(actual_child) => {
                compare_nodes(language, &child_path, expected_child, actual_child, report)
            }
            None => report
                .errors
                .push(format!("[{}] {}: missing key", language, child_path)),
        }
    }

    for key in actual.keys().filter(|key| !expected.contains_key(*key)) {
        report.warnings.push(format!(
            "[{}] {}: key not present in canonical language",
            language,
            join_path(path, key)
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary(sources: &[(&str, &str)]) -> Dictionary {
        Dictionary::from_json_sources(sources.iter().copied()).expect("Should parse")
    }

    // ==================== Placeholder Extraction Tests ====================

    #[test]
    fn test_extract_placeholders_single_braces() {
        let placeholders = TranslationValidator::extract_placeholders("{count} avis");
        assert_eq!(placeholders.into_iter().collect::<Vec<_>>(), vec!["count"]);
    }

    #[test]
    fn test_extract_placeholders_double_braces() {
        let placeholders =
            TranslationValidator::extract_placeholders("Bonjour {{ name }}, commande {orderId}");
        assert_eq!(
            placeholders.into_iter().collect::<Vec<_>>(),
            vec!["name", "orderId"]
        );
    }

    #[test]
    fn test_extract_placeholders_none() {
        assert!(TranslationValidator::extract_placeholders("Panier").is_empty());
    }

    // ==================== Check Tests ====================

    #[test]
    fn test_builtin_dictionary_is_clean() {
        let report = TranslationValidator::check(Dictionary::builtin());
        assert!(report.is_clean(), "{:?}", report);
    }

    #[test]
    fn test_missing_key_is_error() {
        let dict = dictionary(&[
            ("fr", r#"{"navigation": {"home": "Accueil", "shop": "Boutique"}}"#),
            ("en", r#"{"navigation": {"home": "Home"}}"#),
            ("ko", r#"{"navigation": {"home": "홈", "shop": "쇼핑"}}"#),
        ]);

        let report = TranslationValidator::check(&dict);
        assert_eq!(report.errors, vec!["[en] navigation.shop: missing key"]);
    }

    #[test]
    fn test_extra_key_is_warning() {
        let dict = dictionary(&[
            ("fr", r#"{"home": "Accueil"}"#),
            ("en", r#"{"home": "Home", "sale": "Sale"}"#),
            ("ko", r#"{"home": "홈"}"#),
        ]);

        let report = TranslationValidator::check(&dict);
        assert!(!report.has_errors());
        assert!(report.warnings[0].contains("sale"));
    }

    #[test]
    fn test_shape_mismatch_is_error() {
        let dict = dictionary(&[
            ("fr", r#"{"steps": ["Livraison", "Paiement"]}"#),
            ("en", r#"{"steps": "Shipping, Payment"}"#),
            ("ko", r#"{"steps": ["배송", "결제"]}"#),
        ]);

        let report = TranslationValidator::check(&dict);
        assert_eq!(report.errors, vec!["[en] steps: expected list, found text"]);
    }

    #[test]
    fn test_placeholder_mismatch_is_warning() {
        let dict = dictionary(&[
            ("fr", r#"{"welcome": "Bonjour {name}"}"#),
            ("en", r#"{"welcome": "Hello"}"#),
            ("ko", r#"{"welcome": "{name}님"}"#),
        ]);

        let report = TranslationValidator::check(&dict);
        assert!(!report.has_errors());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("placeholder mismatch"));
    }

    #[test]
    fn test_list_length_mismatch_is_warning() {
        let dict = dictionary(&[
            ("fr", r#"{"sizes": ["S", "M", "L"]}"#),
            ("en", r#"{"sizes": ["S", "M"]}"#),
            ("ko", r#"{"sizes": ["S", "M", "L"]}"#),
        ]);

        let report = TranslationValidator::check(&dict);
        assert!(report.warnings[0].contains("list has 2 items, expected 3"));
    }

    #[test]
    fn test_missing_language_is_error() {
        let dict = dictionary(&[("fr", r#"{"home": "Accueil"}"#), ("en", r#"{"home": "Home"}"#)]);

        let report = TranslationValidator::check(&dict);
        assert_eq!(report.errors, vec!["Language 'ko' has no translations"]);
    }

    #[test]
    fn test_missing_canonical_language() {
        let dict = dictionary(&[("en", r#"{"home": "Home"}"#)]);

        let report = TranslationValidator::check(&dict);
        assert!(report.errors[0].contains("Canonical language 'fr'"));
    }

    // ==================== Report Tests ====================

    #[test]
    fn test_validation_report_new() {
        let report = ValidationReport::new();
        assert!(report.is_clean());
        assert!(!report.has_errors());
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_validation_report_with_error() {
        let mut report = ValidationReport::new();
        report.errors.push("Test error".to_string());

        assert!(!report.is_clean());
        assert!(report.has_errors());
    }
}
