// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Extractors: pure, stateless mappings from a record's value bytes to an
//! optional index-key.
//!
//! A `None` result means "no index-key for this record" — the record is
//! skipped by whichever [`crate::index::SecondaryIndex`] applies the
//! extractor, rather than being indexed under an empty key.

/// How a [`crate::index::SecondaryIndex`] derives its key from a primary
/// record's value.
#[derive(Debug, Clone)]
pub enum Extractor {
    /// Looks for `"field_name":` in a JSON-object value and returns the
    /// bytes of the string literal, or numeric/boolean token, that follows.
    JsonField(String),
    /// The first `n` bytes of the value (the whole value if shorter).
    Prefix(usize),
    /// `n` bytes starting at byte offset `o`; `None` if the value is
    /// shorter than `o + n`.
    Offset(usize, usize),
    /// Concatenation of `(len:u32 | bytes)` segments, one per
    /// sub-extractor. `None` if any sub-extractor returns `None`.
    Composite(Vec<Extractor>),
}

impl Extractor {
    /// Apply the extractor to a record's value, producing an index-key or
    /// `None` if the record has no key under this extractor.
    pub fn extract(&self, value: &[u8]) -> Option<Vec<u8>> {
        match self {
            Extractor::JsonField(field) => extract_json_field(value, field),
            Extractor::Prefix(n) => Some(extract_prefix(value, *n)),
            Extractor::Offset(offset, n) => extract_offset(value, *offset, *n),
            Extractor::Composite(parts) => extract_composite(value, parts),
        }
    }
}

fn extract_prefix(value: &[u8], n: usize) -> Vec<u8> {
    value[..n.min(value.len())].to_vec()
}

fn extract_offset(value: &[u8], offset: usize, n: usize) -> Option<Vec<u8>> {
    let end = offset.checked_add(n)?;
    if end > value.len() {
        return None;
    }
    Some(value[offset..end].to_vec())
}

fn extract_composite(value: &[u8], parts: &[Extractor]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    for part in parts {
        let segment = part.extract(value)?;
        out.extend_from_slice(&(segment.len() as u32).to_le_bytes());
        out.extend_from_slice(&segment);
    }
    Some(out)
}

/// Find `"field":` inside a JSON-object-shaped value and return the bytes
/// of whatever token follows: a quoted string's contents, or a bare
/// numeric/boolean/null token up to the next comma, closing brace, or
/// whitespace.
///
/// This is a minimal scanner, not a JSON parser: it trusts that `value`
/// is a well-formed JSON object and only looks for the literal substring
/// `"field":`, which is adequate for index extraction but would be fooled
/// by that sequence appearing inside an unrelated string value.
fn extract_json_field(value: &[u8], field: &str) -> Option<Vec<u8>> {
    let needle = format!("\"{field}\":");
    let pos = find_subslice(value, needle.as_bytes())?;
    let mut i = pos + needle.len();

    while i < value.len() && value[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= value.len() {
        return None;
    }

    if value[i] == b'"' {
        let start = i + 1;
        let mut j = start;
        while j < value.len() && value[j] != b'"' {
            j += 1;
        }
        if j >= value.len() {
            return None;
        }
        if j == start {
            return None;
        }
        return Some(value[start..j].to_vec());
    }

    let start = i;
    let mut j = start;
    while j < value.len() && value[j] != b',' && value[j] != b'}' && !value[j].is_ascii_whitespace() {
        j += 1;
    }
    if j == start {
        return None;
    }
    Some(value[start..j].to_vec())
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
