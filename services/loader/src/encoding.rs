//! Text decoding and double-encoding repair.
//!
//! Exports often carry strings whose UTF-8 bytes were read as Latin-1 and
//! encoded again ("SÃ£o Paulo" for "São Paulo"). Such strings are mapped
//! back to their Latin-1 bytes and decoded as UTF-8; a string that does not
//! round-trip is left exactly as it was.

use encoding_rs::{UTF_8, WINDOWS_1252};
use serde_json::Value;
use std::borrow::Cow;

/// Lead characters produced when a two-byte UTF-8 sequence for Latin
/// letters and punctuation is read as Latin-1.
const MOJIBAKE_MARKERS: &[char] = &['\u{00c3}', '\u{00c2}'];

/// Decode raw file bytes. UTF-8 (with or without BOM) is expected; bytes that
/// are not valid UTF-8 are read as Windows-1252. The flag reports the fallback.
pub fn decode_bytes(bytes: &[u8]) -> (Cow<'_, str>, bool) {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return (text, false);
    }
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    (text, true)
}

/// Repair one string, or return it unchanged when it is not double-encoded.
pub fn fix_utf8_encoding(text: &str) -> Cow<'_, str> {
    if !text.contains(MOJIBAKE_MARKERS) {
        return Cow::Borrowed(text);
    }
    let latin1: Option<Vec<u8>> = text
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect();
    match latin1.and_then(|bytes| String::from_utf8(bytes).ok()) {
        Some(fixed) => Cow::Owned(fixed),
        None => Cow::Borrowed(text),
    }
}

/// Repair every string value inside a JSON document, in place.
/// Object keys are left alone.
pub fn fix_encoding_in_value(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Cow::Owned(fixed) = fix_utf8_encoding(s) {
                *s = fixed;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(fix_encoding_in_value),
        Value::Object(map) => map.values_mut().for_each(fix_encoding_in_value),
        _ => {}
    }
}
