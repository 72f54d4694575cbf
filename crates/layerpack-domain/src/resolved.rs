use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::request::normalize_name;

/// A `name==version` pin produced by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PinnedPackage {
    pub name: String,
    pub version: String,
}

impl PinnedPackage {
    pub fn spec(&self) -> String {
        format!("{}=={}", self.name, self.version)
    }
}

/// Pinned versions keyed by the name the resolver reported, in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedDependencySet {
    pins: IndexMap<String, String>,
}

impl ResolvedDependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every `name==version` line of resolver output.
    ///
    /// Headers, comments, annotations and anything that is not an exact pin are
    /// skipped. Trailing markers (`; python_version < "3.10"`) and line
    /// continuations are dropped.
    pub fn parse_pinned_output(stdout: &str) -> Self {
        let mut resolved = Self::new();
        for line in stdout.lines() {
            if let Some((name, version)) = parse_pin_line(line) {
                resolved.insert(name, version);
            }
        }
        resolved
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Option<String> {
        self.pins.insert(name.into(), version.into())
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pins.get(name).map(String::as_str)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        let wanted = normalize_name(name);
        self.pins.keys().any(|key| normalize_name(key) == wanted)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pins
            .iter()
            .map(|(name, version)| (name.as_str(), version.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pins.keys().map(String::as_str)
    }

    /// Keep only the entries for which `keep(name)` holds.
    #[must_use]
    pub fn retain_names(&self, mut keep: impl FnMut(&str) -> bool) -> Self {
        self.pins
            .iter()
            .filter(|(name, _)| keep(name))
            .map(|(name, version)| (name.clone(), version.clone()))
            .collect()
    }

    /// Split into (direct, transitive) by case-insensitive name, each sorted.
    pub fn partition_direct(
        &self,
        direct: &HashSet<String>,
    ) -> (Vec<PinnedPackage>, Vec<PinnedPackage>) {
        let (mut top, mut rest): (Vec<_>, Vec<_>) = self
            .pins
            .iter()
            .map(|(name, version)| PinnedPackage {
                name: name.clone(),
                version: version.clone(),
            })
            .partition(|pin| direct.contains(&normalize_name(&pin.name)));
        top.sort();
        rest.sort();
        (top, rest)
    }
}

impl FromIterator<(String, String)> for ResolvedDependencySet {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            pins: iter.into_iter().collect(),
        }
    }
}

fn parse_pin_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('-') {
        return None;
    }
    let spec = trimmed
        .split(';')
        .next()
        .unwrap_or(trimmed)
        .trim_end_matches('\\')
        .trim();
    let spec = match spec.find(" #") {
        Some(idx) => spec[..idx].trim(),
        None => spec,
    };
    let (name, version) = spec.split_once("==")?;
    let name = name.trim();
    let version = version.trim();
    if name.is_empty()
        || version.is_empty()
        || version.contains("==")
        || name.contains(|ch: char| ch.is_whitespace() || matches!(ch, '<' | '>' | '!' | '~' | '@'))
        || version.contains(char::is_whitespace)
    {
        return None;
    }
    Some((name, version))
}
