//! Citation key generation
//!
//! Keys follow the `author-year` pattern (`smith-2023`), falling back to a
//! title slug when author or year is unavailable. Collisions against an
//! existing key set are resolved with a bijective base-26 letter suffix.

use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

use crate::suffix::letter_suffix;

/// Maximum length of the fallback title slug, in characters.
const TITLE_SLUG_MAX: usize = 32;

/// Generate a citation key from author, year, and title metadata.
///
/// The author is the first author's family name (or literal name for
/// institutional authors), normalized to lowercase ASCII with internal
/// whitespace and punctuation collapsed to single underscores. Missing
/// parts fall back to `anon` and `nd` ("no date"). The title contributes
/// only when author or year is missing: a lowercase slug truncated to 32
/// characters. A record with no usable metadata at all becomes
/// `anon-nd-untitled`.
pub fn generate_key(author: Option<&str>, year: Option<&str>, title: Option<&str>) -> String {
    let author_part = author.map(normalize_name_part).filter(|s| !s.is_empty());
    let year_part = year
        .map(|y| y.trim().to_string())
        .filter(|y| !y.is_empty());

    let has_author = author_part.is_some();
    let has_year = year_part.is_some();

    let mut key = format!(
        "{}-{}",
        author_part.as_deref().unwrap_or("anon"),
        year_part.as_deref().unwrap_or("nd")
    );

    // Author and year together are assumed disambiguating; the title is
    // only pulled in when one of them is missing.
    if !has_author || !has_year {
        let slug = title.map(title_slug).filter(|s| !s.is_empty());
        match slug {
            Some(slug) => {
                key.push('-');
                key.push_str(&slug);
            }
            None if !has_author && !has_year => key.push_str("-untitled"),
            None => {}
        }
    }

    key
}

/// Generate a key and uniquify it against `existing_keys`.
///
/// Comparison is case-insensitive: `Smith-2023` blocks `smith-2023`.
pub fn generate_unique_key(
    author: Option<&str>,
    year: Option<&str>,
    title: Option<&str>,
    existing_keys: &[String],
) -> String {
    let base = generate_key(author, year, title);
    make_key_unique(&base, existing_keys)
}

/// Append a bijective base-26 letter suffix to `base` until it no longer
/// collides (case-insensitively) with any key in `existing_keys`.
pub fn make_key_unique(base: &str, existing_keys: &[String]) -> String {
    let existing: HashSet<String> = existing_keys.iter().map(|k| k.to_lowercase()).collect();

    if !existing.contains(&base.to_lowercase()) {
        return base.to_string();
    }

    let mut n = 1u32;
    loop {
        let candidate = format!("{}{}", base, letter_suffix(n));
        if !existing.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

/// Strip characters that are not safe in a citation key.
///
/// Keeps ASCII alphanumerics, `_`, `-`, and `:`.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || *c == ':')
        .collect()
}

/// Normalize a name for use in a citation key.
///
/// NFKD-folds diacritics to ASCII, lowercases, and joins the remaining
/// word fragments with single underscores. Non-ASCII characters with no
/// ASCII decomposition are dropped entirely.
fn normalize_name_part(s: &str) -> String {
    let folded: String = s.nfkd().filter(char::is_ascii).collect();
    folded
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Normalize a title into a slug, truncated to [`TITLE_SLUG_MAX`] characters.
fn title_slug(s: &str) -> String {
    normalize_name_part(s).chars().take(TITLE_SLUG_MAX).collect()
}
