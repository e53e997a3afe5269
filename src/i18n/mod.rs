//! Internationalization (i18n) for the storefront.
//!
//! Page components ask for strings by dot-delimited key path
//! (`"footer.newsletter.title"`) and always get something renderable back:
//! the translation, or the key itself when the lookup misses.
//!
//! # Architecture
//!
//! - `registry`: the closed set of storefront languages (fr, en, ko)
//! - `language`: validated `Language` handle
//! - `dictionary`: nested translation trees, built-in data from `locales/`
//! - `resolver`: key-path resolution and the `Translator` helper
//! - `validator`: cross-language consistency checks
//! - `metrics`: lookup hit/miss counters
//!
//! # Example
//!
//! ```rust
//! use storefront_core::i18n::{get_translation, Dictionary, Language, Translator};
//!
//! let home = get_translation(Dictionary::builtin(), "fr", "navigation.home");
//! assert_eq!(home, "Accueil");
//!
//! let t = Translator::builtin(Language::ENGLISH);
//! assert_eq!(t.t("footer.newsletter.title"), "Subscribe to the newsletter");
//! ```

mod dictionary;
mod language;
mod metrics;
mod registry;
mod resolver;
mod validator;

pub use dictionary::{Dictionary, DictionaryError, TranslationValue};
pub use language::Language;
pub use metrics::{MetricsReport, TranslationMetrics};
pub use registry::{LanguageConfig, LanguageRegistry};
pub use resolver::{get_translation, resolve, Resolved, Translator};
pub use validator::{TranslationValidator, ValidationReport};
