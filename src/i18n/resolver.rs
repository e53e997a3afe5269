//! Dot-path lookup into the translation dictionary.
//!
//! Lookups never fail: a key that cannot be resolved comes back unchanged,
//! so the storefront renders the raw key instead of breaking.

use crate::i18n::{Dictionary, Language, TranslationMetrics, TranslationValue};
use tracing::debug;

/// Outcome of a lookup.
///
/// Either a value from the dictionary or, on a miss, the original key path
/// exactly as it was passed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'a> {
    key: &'a str,
    value: Option<&'a TranslationValue>,
}

impl<'a> Resolved<'a> {
    fn fallback(key: &'a str) -> Self {
        Self { key, value: None }
    }

    /// The resolved value, or `None` when the key fell back.
    pub fn value(&self) -> Option<&'a TranslationValue> {
        self.value
    }

    /// Whether the lookup missed and the key is being returned.
    pub fn is_fallback(&self) -> bool {
        self.value.is_none()
    }

    /// The key path that was looked up.
    pub fn key(&self) -> &'a str {
        self.key
    }

    /// Text to render: the translated string, or the key for misses and
    /// non-text values.
    pub fn as_str(&self) -> &'a str {
        match self.value {
            Some(TranslationValue::Text(text)) => text,
            _ => self.key,
        }
    }

    /// The resolved list, if the key points at one.
    pub fn as_list(&self) -> Option<&'a [String]> {
        self.value.and_then(TranslationValue::as_list)
    }
}

impl PartialEq<&str> for Resolved<'_> {
    fn eq(&self, other: &&str) -> bool {
        match self.value {
            Some(TranslationValue::Text(text)) => text.as_str() == *other,
            Some(_) => false,
            None => self.key == *other,
        }
    }
}

impl std::fmt::Display for Resolved<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Walk `key_path` through the tree for `language`.
///
/// Segments are separated by `.`. Empty segments (leading, trailing or
/// doubled dots, or an empty key) never match. The walk stops at the first
/// missing step and the whole original key is returned.
pub fn resolve<'a>(dictionary: &'a Dictionary, language: &str, key_path: &'a str) -> Resolved<'a> {
    let mut current = dictionary.root(language);

    for segment in key_path.split('.') {
        current = current.and_then(|node| node.child(segment));
        if current.is_none() {
            break;
        }
    }

    match current {
        None | Some(TranslationValue::Absent) => Resolved::fallback(key_path),
        Some(value) => Resolved {
            key: key_path,
            value: Some(value),
        },
    }
}

/// Lookup used by page components.
///
/// Same walk as [`resolve`], but an empty translated string also falls back
/// to the key. Lists and groups are never treated as empty.
pub fn get_translation<'a>(
    dictionary: &'a Dictionary,
    language: &str,
    key_path: &'a str,
) -> Resolved<'a> {
    reject_empty(resolve(dictionary, language, key_path))
}

/// Empty text counts as untranslated.
fn reject_empty<'a>(resolved: Resolved<'a>) -> Resolved<'a> {
    match resolved.value {
        Some(TranslationValue::Text(text)) if text.is_empty() => {
            Resolved::fallback(resolved.key)
        }
        _ => resolved,
    }
}

/// Language-bound lookup handle with metrics.
#[derive(Debug, Clone, Copy)]
pub struct Translator<'d> {
    dictionary: &'d Dictionary,
    language: Language,
}

impl Translator<'static> {
    /// Translator over the built-in dictionary.
    pub fn builtin(language: Language) -> Self {
        Self::new(Dictionary::builtin(), language)
    }
}

impl<'d> Translator<'d> {
    pub fn new(dictionary: &'d Dictionary, language: Language) -> Self {
        Self {
            dictionary,
            language,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Look up a key, recording the outcome.
    pub fn lookup<'a>(&'a self, key_path: &'a str) -> Resolved<'a> {
        let metrics = TranslationMetrics::global();
        let strict = resolve(self.dictionary, self.language.code(), key_path);
        let resolved = reject_empty(strict);

        if resolved.is_fallback() {
            if strict.is_fallback() {
                metrics.record_miss();
                debug!(
                    "Missing translation key '{}' for {}",
                    key_path, self.language
                );
            } else {
                metrics.record_empty_fallback();
                debug!(
                    "Empty translation for '{}' in {}, rendering the key",
                    key_path, self.language
                );
            }
        } else {
            metrics.record_hit();
        }

        resolved
    }

    /// Translated text for `key_path`, or the key itself.
    pub fn t(&self, key_path: &str) -> String {
        self.lookup(key_path).as_str().to_string()
    }

    /// Translated list for `key_path`; empty when the key is missing or not
    /// a list.
    pub fn list(&self, key_path: &str) -> Vec<String> {
        self.lookup(key_path)
            .as_list()
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    /// Translated text with `{name}` placeholders replaced.
    ///
    /// Unknown placeholders are left as they are.
    pub fn format(&self, key_path: &str, args: &[(&str, &str)]) -> String {
        let mut text = self.t(key_path);
        for (name, value) in args {
            text = text.replace(&format!("{{{}}}", name), value);
        }
        text
    }
}
