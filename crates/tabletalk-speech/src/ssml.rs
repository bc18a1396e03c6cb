// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSML handling shared by the speech providers.
//!
//! Some providers accept SSML, some do not; the display text sent to the
//! client is always plain. `strip_ssml_tags` is idempotent: applied twice
//! equals applied once.

/// Remove SSML/XML tags (`<speak>`, `<prosody>`, `<break/>`, ...) while
/// preserving plain-text characters, punctuation, and whitespace.
///
/// A `<` with no closing `>` is not a tag and passes through untouched,
/// which keeps the function idempotent on its own output.
pub fn strip_ssml_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => {
                rest = &rest[open + close + 1..];
            }
            None => {
                // Unterminated angle bracket; keep the literal text.
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Whether the input looks like an SSML document.
pub fn is_ssml(text: &str) -> bool {
    text.trim_start().starts_with("<speak")
}

/// Duration estimate at 150 words per minute, floored at one second.
pub fn estimate_duration_ms(text: &str) -> u64 {
    let words = text.split_whitespace().count() as u64;
    (words * 60_000 / 150).max(1000)
}
