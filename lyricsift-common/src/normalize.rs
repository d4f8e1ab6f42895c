//! Text normalization for extracted lyrics
//!
//! Normalization is deterministic: page bytes are decoded as UTF-8 (invalid
//! sequences replaced), transliterated to ASCII, every run of whitespace
//! (line breaks and tabs included) collapses to a single space, the ends are
//! trimmed and the result is lower-cased. The output never contains a tab or
//! newline, so it fits in a single TSV field.

use std::borrow::Cow;

/// Decode page bytes, replacing invalid UTF-8 sequences
pub fn decode_lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Transliterate to plain ASCII ("Beyoncé" → "Beyonce")
pub fn transliterate(text: &str) -> String {
    deunicode::deunicode(text)
}

/// Collapse whitespace runs to single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Full normalization applied before a lyrics row is written
pub fn normalize_text(text: &str) -> String {
    collapse_whitespace(&transliterate(text)).to_lowercase()
}
