//! Identifier validation

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // UUID v4: version nibble is 4, variant nibble is 8/9/a/b
    static ref UUID_V4_PATTERN: Regex = Regex::new(
        r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$"
    )
    .unwrap();
}

/// Check whether a string is a well-formed UUID v4.
pub fn is_valid_uuid_v4(value: &str) -> bool {
    UUID_V4_PATTERN.is_match(value)
}
