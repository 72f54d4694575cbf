use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::request::PackageRequest;

/// Read every requirement entry from `path`, following `-r` includes.
///
/// # Errors
///
/// Returns an error when the file, or a file it includes, cannot be read.
pub fn read_requirements_file(path: &Path) -> Result<Vec<PackageRequest>> {
    let mut visited = HashSet::new();
    read_requirements_file_inner(path, &mut visited)
}

fn read_requirements_file_inner(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
) -> Result<Vec<PackageRequest>> {
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical.clone()) {
        tracing::debug!(path = %canonical.display(), "skipping already included requirements file");
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(&canonical)
        .with_context(|| format!("reading requirements file {}", path.display()))?;
    let base_dir = canonical.parent().unwrap_or_else(|| Path::new("."));

    let mut requests = Vec::new();
    for entry in parse_requirements(&contents) {
        match include_target(&entry) {
            Some(target) => {
                let include = if Path::new(target).is_absolute() {
                    PathBuf::from(target)
                } else {
                    base_dir.join(target)
                };
                requests.extend(read_requirements_file_inner(&include, visited)?);
            }
            None if entry.starts_with('-') => {
                tracing::debug!(option = %entry, "ignoring requirements option");
            }
            None => requests.push(PackageRequest::new(entry)),
        }
    }
    Ok(requests)
}

/// Split requirements text into entries, dropping blanks, comment lines and
/// trailing ` # ...` comments. Include and option lines are returned as-is.
pub fn parse_requirements(contents: &str) -> Vec<String> {
    let mut entries = Vec::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let spec = trimmed
            .match_indices('#')
            .map(|(idx, _)| &trimmed[..idx])
            .find(|before| before.ends_with(char::is_whitespace))
            .map_or(trimmed, str::trim);
        if !spec.is_empty() {
            entries.push(spec.to_string());
        }
    }
    entries
}

fn include_target(entry: &str) -> Option<&str> {
    let rest = entry
        .strip_prefix("--requirement")
        .or_else(|| entry.strip_prefix("-r"))?;
    let target = rest.trim_start_matches([' ', '=']).trim();
    (!target.is_empty()).then_some(target)
}
