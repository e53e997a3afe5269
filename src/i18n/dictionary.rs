//! Nested translation dictionary.
//!
//! Each language maps to a tree of [`TranslationValue`]s. The built-in
//! dictionary is embedded from `locales/*.json` and parsed once.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, error};

/// A node in a language tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TranslationValue {
    /// A translated string.
    Text(String),
    /// An ordered list of strings (size charts, checkout steps, ...).
    List(Vec<String>),
    /// A nested group of keys.
    Map(BTreeMap<String, TranslationValue>),
    /// An explicit `null` in the source data. Never resolves.
    Absent,
}

impl TranslationValue {
    /// Step into the child named by `segment`.
    ///
    /// Only maps have children. Lists are leaves like text, so a path that
    /// continues past a list, text or `Absent` node resolves to nothing.
    pub fn child(&self, segment: &str) -> Option<&TranslationValue> {
        match self {
            TranslationValue::Map(map) => map.get(segment),
            TranslationValue::List(_) | TranslationValue::Text(_) | TranslationValue::Absent => {
                None
            }
        }
    }

    /// Text content, if this is a text node.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TranslationValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// List content, if this is a list node.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            TranslationValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the node's shape, used in validation messages.
    pub fn kind(&self) -> &'static str {
        match self {
            TranslationValue::Text(_) => "text",
            TranslationValue::List(_) => "list",
            TranslationValue::Map(_) => "map",
            TranslationValue::Absent => "null",
        }
    }
}

/// Errors raised while loading dictionary data.
#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("failed to parse translations for '{language}': {source}")]
    Parse {
        language: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Translations for every language, keyed by language code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    languages: BTreeMap<String, TranslationValue>,
}

const BUILTIN_SOURCES: [(&str, &str); 3] = [
    ("fr", include_str!("../../locales/fr.json")),
    ("en", include_str!("../../locales/en.json")),
    ("ko", include_str!("../../locales/ko.json")),
];

static BUILTIN: OnceLock<Dictionary> = OnceLock::new();

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one JSON document per language.
    pub fn from_json_sources<'a, I>(sources: I) -> Result<Self, DictionaryError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut dictionary = Self::new();
        for (language, json) in sources {
            let root: TranslationValue =
                serde_json::from_str(json).map_err(|source| DictionaryError::Parse {
                    language: language.to_string(),
                    source,
                })?;
            dictionary.insert(language, root);
        }
        Ok(dictionary)
    }

    /// The dictionary compiled into the binary.
    ///
    /// Parsed on first access. Broken embedded data is logged and yields an
    /// empty dictionary, so every lookup falls back to its key.
    pub fn builtin() -> &'static Dictionary {
        BUILTIN.get_or_init(|| match Self::from_json_sources(BUILTIN_SOURCES) {
            Ok(dictionary) => {
                debug!(
                    "Loaded built-in translations for {:?}",
                    dictionary.languages().collect::<Vec<_>>()
                );
                dictionary
            }
            Err(e) => {
                error!("Built-in translations are unusable: {}", e);
                Dictionary::new()
            }
        })
    }

    /// Add or replace the tree for a language.
    pub fn insert(&mut self, language: impl Into<String>, root: TranslationValue) {
        self.languages.insert(language.into(), root);
    }

    /// Root node for a language.
    pub fn root(&self, language: &str) -> Option<&TranslationValue> {
        self.languages.get(language)
    }

    /// Language codes present in the dictionary, in sorted order.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_all_shapes() {
        let json = r#"{"a": "text", "b": ["x", "y"], "c": {"d": "deep"}, "e": null}"#;
        let value: TranslationValue = serde_json::from_str(json).expect("Should deserialize");

        assert_eq!(value.child("a"), Some(&TranslationValue::Text("text".into())));
        assert_eq!(
            value.child("b").and_then(TranslationValue::as_list),
            Some(&["x".to_string(), "y".to_string()][..])
        );
        assert_eq!(
            value.child("c").and_then(|c| c.child("d")).and_then(TranslationValue::as_text),
            Some("deep")
        );
        assert_eq!(value.child("e"), Some(&TranslationValue::Absent));
    }

    #[test]
    fn test_text_and_list_are_not_steppable() {
        assert!(TranslationValue::Text("Accueil".into()).child("0").is_none());
        assert!(TranslationValue::List(vec!["S".into()]).child("0").is_none());
        assert!(TranslationValue::Absent.child("x").is_none());
    }

    #[test]
    fn test_from_json_sources_reports_language_on_error() {
        let err = Dictionary::from_json_sources([("fr", "{}"), ("en", "{not json")])
            .expect_err("Should fail");
        assert!(err.to_string().contains("'en'"));
    }

    #[test]
    fn test_builtin_has_three_languages() {
        let languages: Vec<_> = Dictionary::builtin().languages().collect();
        assert_eq!(languages, vec!["en", "fr", "ko"]);
    }

    #[test]
    fn test_builtin_is_singleton() {
        assert!(std::ptr::eq(Dictionary::builtin(), Dictionary::builtin()));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(TranslationValue::Text(String::new()).kind(), "text");
        assert_eq!(TranslationValue::List(Vec::new()).kind(), "list");
        assert_eq!(TranslationValue::Map(BTreeMap::new()).kind(), "map");
        assert_eq!(TranslationValue::Absent.kind(), "null");
    }
}
