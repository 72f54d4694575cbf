use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single requested package, kept verbatim as the user wrote it.
///
/// Only the bare name is ever interpreted here; version constraints, extras
/// and markers are passed through to the resolver untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageRequest {
    raw: String,
}

impl PackageRequest {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            raw: raw.trim().to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lower-cased distribution name with extras, operators and markers removed.
    pub fn bare_name(&self) -> String {
        let trimmed = strip_wrapping_quotes(&self.raw);
        let mut end = trimmed.len();
        for (idx, ch) in trimmed.char_indices() {
            if ch.is_ascii_whitespace()
                || matches!(ch, '<' | '>' | '=' | '!' | '~' | ';' | '@' | ',')
            {
                end = idx;
                break;
            }
        }
        let head = &trimmed[..end];
        let base = head.split('[').next().unwrap_or(head);
        normalize_name(base)
    }

    /// Blank entries and `#` comments carry no package.
    pub fn is_blank_or_comment(&self) -> bool {
        self.raw.is_empty() || self.raw.starts_with('#')
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for PackageRequest {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PackageRequest {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Names compare case-insensitively; nothing beyond lower-casing is applied.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Trim every entry and drop blanks and comment lines.
pub fn filter_requests<I, S>(entries: I) -> Vec<PackageRequest>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .map(|entry| PackageRequest::new(entry.as_ref()))
        .filter(|request| !request.is_blank_or_comment())
        .collect()
}

/// Bare names of the packages the caller asked for directly.
pub fn direct_names(requests: &[PackageRequest]) -> HashSet<String> {
    requests
        .iter()
        .filter(|request| !request.is_blank_or_comment())
        .map(PackageRequest::bare_name)
        .filter(|name| !name.is_empty())
        .collect()
}

pub(crate) fn strip_wrapping_quotes(input: &str) -> &str {
    if input.len() >= 2 {
        let bytes = input.as_bytes();
        let first = bytes[0];
        let last = bytes[input.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &input[1..input.len() - 1];
        }
    }
    input
}
