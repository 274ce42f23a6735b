//! Deterministic, human-friendly note identifiers.
//!
//! A title is transliterated to ASCII (Chinese through the `pinyin` crate, other
//! scripts through `slug`'s transliteration tables), reduced to `[a-z0-9-]`
//! and suffixed with a short code derived from `sha256(title + secret)`.
//! The same title and secret always yield the same identifier, across calls
//! and process restarts, while titles that collapse to the same slug still
//! receive distinct suffixes.

use pinyin::{Pinyin, ToPinyin};
use sha2::{Digest, Sha256};
use slug::slugify as transliterate_fragment;

/// Number of hex characters kept from the digest.
pub const SHORT_CODE_LEN: usize = 6;

/// Slug used when a title has no representable characters.
pub const PLACEHOLDER_SLUG: &str = "untitled";

/// Derive the full identifier for a title: `<slug>-<short code>`.
pub fn generate_identifier(title: &str, secret: &str) -> String {
    format!("{}-{}", derive_slug(title), short_code(title, secret))
}

/// Six lowercase hex characters of `sha256(title + secret)`.
pub fn short_code(title: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(secret.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..SHORT_CODE_LEN].to_string()
}

/// Derive the readable slug portion of an identifier.
///
/// Never fails: empty or unrepresentable titles produce [`PLACEHOLDER_SLUG`].
pub fn derive_slug(input: &str) -> String {
    let transliterated = transliterate_to_ascii(input);

    let mut output = String::with_capacity(transliterated.len());
    let mut pending_separator = false;
    for ch in transliterated.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !output.is_empty() {
                output.push('-');
            }
            pending_separator = false;
            output.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' {
            pending_separator = true;
        }
    }

    if output.is_empty() {
        PLACEHOLDER_SLUG.to_string()
    } else {
        output
    }
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            None => {
                let mut buffer = [0u8; 4];
                let fragment = transliterate_fragment(ch.encode_utf8(&mut buffer));
                output.push_str(&fragment);
            }
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
    buffer.push(' ');
}
