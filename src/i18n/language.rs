//! `Language`: a language code that is known to the registry.

use crate::i18n::{LanguageConfig, LanguageRegistry};
use anyhow::{bail, Result};
use std::str::FromStr;

/// Copyable handle to an enabled registry language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Language {
    code: &'static str,
}

impl Language {
    pub const FRENCH: Language = Language { code: "fr" };
    pub const ENGLISH: Language = Language { code: "en" };
    pub const KOREAN: Language = Language { code: "ko" };

    /// Parse a language code.
    ///
    /// Case and surrounding whitespace are ignored, as is a region or
    /// encoding suffix, so `"FR"`, `"fr-CA"` and `"fr_FR.UTF-8"` all give
    /// French. Unknown and disabled languages are errors.
    pub fn from_code(code: &str) -> Result<Language> {
        let primary = code
            .trim()
            .split(['-', '_', '.'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match LanguageRegistry::get().get_by_code(&primary) {
            Some(config) if config.enabled => Ok(Language { code: config.code }),
            Some(config) => bail!("Language '{}' is disabled", config.code),
            None => bail!("Unknown language code: '{}'", code),
        }
    }

    /// Best enabled match for an `Accept-Language` header, or the canonical
    /// language.
    pub fn negotiate(accept_language: &str) -> Language {
        Language {
            code: LanguageRegistry::get().negotiate(accept_language).code,
        }
    }

    pub fn canonical() -> Language {
        Language {
            code: LanguageRegistry::get().canonical().code,
        }
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Registry entry for this language.
    pub fn config(&self) -> &'static LanguageConfig {
        let registry = LanguageRegistry::get();
        registry
            .get_by_code(self.code)
            .unwrap_or_else(|| registry.canonical())
    }

    pub fn locale(&self) -> &'static str {
        self.config().locale
    }

    pub fn name(&self) -> &'static str {
        self.config().name
    }

    pub fn native_name(&self) -> &'static str {
        self.config().native_name
    }

    pub fn is_canonical(&self) -> bool {
        self.config().is_canonical
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::canonical()
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Language::from_code(s)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code)
    }
}
