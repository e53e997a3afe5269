//! Check translation dictionaries for structural drift.
//!
//! Usage:
//!   cargo run --bin check-translations              # built-in dictionary
//!   cargo run --bin check-translations -- locales   # <code>.json files in a directory
//!
//! Exits non-zero when the report has errors. Warnings are printed only.

use anyhow::{bail, Context, Result};
use std::path::Path;
use storefront_core::i18n::{Dictionary, LanguageRegistry, TranslationValidator};

fn load_dir(dir: &Path) -> Result<Dictionary> {
    let mut sources = Vec::new();
    for language in LanguageRegistry::get().list_all() {
        let path = dir.join(format!("{}.json", language.code));
        if !path.exists() {
            // Reported as a missing language by the validator
            continue;
        }
        let json = std::fs::read_to_string(&path)
            .context(format!("Failed to read {}", path.display()))?;
        sources.push((language.code, json));
    }

    Dictionary::from_json_sources(sources.iter().map(|(code, json)| (*code, json.as_str())))
        .context(format!("Invalid translations in {}", dir.display()))
}

fn main() -> Result<()> {
    let dictionary = match std::env::args().nth(1) {
        Some(dir) => load_dir(Path::new(&dir))?,
        None => Dictionary::builtin().clone(),
    };

    let languages: Vec<_> = dictionary.languages().collect();
    println!("Checking translations for: {}", languages.join(", "));

    let report = TranslationValidator::check(&dictionary);

    for warning in &report.warnings {
        println!("⚠️  {}", warning);
    }
    for problem in &report.errors {
        println!("❌ {}", problem);
    }

    if report.has_errors() {
        bail!(
            "{} translation errors ({} warnings)",
            report.errors.len(),
            report.warnings.len()
        );
    }

    println!("✓ Translations consistent ({} warnings)", report.warnings.len());
    Ok(())
}
