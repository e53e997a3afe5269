//! The closed set of storefront languages.
//!
//! Built on first access and immutable afterwards. Besides lookups by code,
//! the registry negotiates a language from an `Accept-Language` style list
//! of preferences.

use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageConfig {
    /// ISO 639-1 code, also the key of the language's dictionary tree
    pub code: &'static str,
    /// BCP 47 tag used for number and date formatting on the storefront
    pub locale: &'static str,
    pub name: &'static str,
    pub native_name: &'static str,
    /// The catalogue is written in this language; the others are checked
    /// against it
    pub is_canonical: bool,
    pub enabled: bool,
}

static LANGUAGES: [LanguageConfig; 3] = [
    LanguageConfig {
        code: "fr",
        locale: "fr-FR",
        name: "French",
        native_name: "Français",
        is_canonical: true,
        enabled: true,
    },
    LanguageConfig {
        code: "en",
        locale: "en-US",
        name: "English",
        native_name: "English",
        is_canonical: false,
        enabled: true,
    },
    LanguageConfig {
        code: "ko",
        locale: "ko-KR",
        name: "Korean",
        native_name: "한국어",
        is_canonical: false,
        enabled: true,
    },
];

pub struct LanguageRegistry {
    languages: &'static [LanguageConfig],
    canonical: &'static LanguageConfig,
}

static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: &LANGUAGES,
            canonical: LANGUAGES
                .iter()
                .find(|lang| lang.is_canonical)
                .unwrap_or(&LANGUAGES[0]),
        })
    }

    /// Exact, case-sensitive lookup.
    pub fn get_by_code(&self, code: &str) -> Option<&'static LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    pub fn list_enabled(&self) -> Vec<&'static LanguageConfig> {
        self.languages.iter().filter(|lang| lang.enabled).collect()
    }

    pub fn list_all(&self) -> Vec<&'static LanguageConfig> {
        self.languages.iter().collect()
    }

    pub fn canonical(&self) -> &'static LanguageConfig {
        self.canonical
    }

    pub fn is_enabled(&self, code: &str) -> bool {
        self.get_by_code(code).is_some_and(|lang| lang.enabled)
    }

    /// Pick the enabled language a shopper prefers most.
    ///
    /// `preferences` is an `Accept-Language` value such as
    /// `"ko-KR, en;q=0.8, *;q=0.1"`. Region and encoding suffixes are ignored
    /// (`fr_CA.UTF-8` counts as `fr`). Ties keep header order. Falls back to
    /// the canonical language when nothing matches.
    pub fn negotiate(&self, preferences: &str) -> &'static LanguageConfig {
        let mut best: Option<(&'static LanguageConfig, f32)> = None;

        for (tag, quality) in preferences.split(',').filter_map(parse_preference) {
            if quality <= 0.0 {
                continue;
            }
            let Some(lang) = self
                .get_by_code(&tag)
                .filter(|lang| lang.enabled)
            else {
                continue;
            };
            if best.map_or(true, |(_, q)| quality > q) {
                best = Some((lang, quality));
            }
        }

        best.map(|(lang, _)| lang).unwrap_or(self.canonical)
    }
}

/// `"en-US;q=0.7"` -> `("en", 0.7)`. A missing or malformed weight is 1.0.
fn parse_preference(entry: &str) -> Option<(String, f32)> {
    let mut parts = entry.split(';');
    let tag = parts.next()?.trim();
    if tag.is_empty() || tag == "*" {
        return None;
    }

    let primary = tag
        .split(['-', '_', '.'])
        .next()
        .filter(|p| !p.is_empty())?
        .to_ascii_lowercase();

    let quality = parts
        .filter_map(|param| param.trim().strip_prefix("q="))
        .find_map(|q| q.trim().parse::<f32>().ok())
        .unwrap_or(1.0);

    Some((primary, quality))
}
