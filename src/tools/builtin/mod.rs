//! Built-in tools.

pub mod datetime;
pub mod pattern;
#[cfg(feature = "web-tools")]
pub mod web;

/// Cut `s` to at most `max_bytes` without splitting a character.
#[cfg_attr(not(feature = "web-tools"), allow(dead_code))]
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut cutoff = max_bytes;
    while cutoff > 0 && !s.is_char_boundary(cutoff) {
        cutoff -= 1;
    }
    &s[..cutoff]
}
