//! Title → URL slug conversion.

use regex::Regex;

lazy_static::lazy_static! {
    /// Runs of anything outside `[a-z0-9]`
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]+").unwrap();

    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

/// Lowercase the title, collapse every non-alphanumeric run to one hyphen and
/// strip hyphens at both ends. May return an empty string for titles without
/// ASCII letters or digits.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    NON_ALNUM
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// Append a millisecond timestamp so an update never collides with another row.
pub fn with_timestamp_suffix(base: &str, millis: i64) -> String {
    format!("{base}-{millis}")
}
