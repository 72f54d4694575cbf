use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use layerpack_domain::{filter_requests, LayerError, PackageRequest, ResolvedDependencySet};

use crate::backend::ResolverBackend;
use crate::effects::SharedRunner;
use crate::observer::SharedObserver;

pub const SPEC_FILE_NAME: &str = "requirements.in";

const NOT_FOUND_MARKERS: [&str; 3] = [
    "not found",
    "could not find a version",
    "no matching distribution found",
];

/// Turns package requests into exact pins by delegating to the backend.
pub struct Resolver {
    backend: ResolverBackend,
    runner: SharedRunner,
    observer: SharedObserver,
}

impl Resolver {
    pub fn new(backend: ResolverBackend, runner: SharedRunner, observer: SharedObserver) -> Self {
        Self {
            backend,
            runner,
            observer,
        }
    }

    /// Resolve `requests` to pinned versions.
    ///
    /// The filtered request list is written to [`SPEC_FILE_NAME`] inside
    /// `scratch`; the file is left for the scratch directory's owner to remove.
    ///
    /// # Errors
    ///
    /// [`LayerError::NoInput`] when nothing remains after dropping blanks and
    /// comments, [`LayerError::PackageNotFound`] or
    /// [`LayerError::DependencyConflict`] when the backend fails, and I/O
    /// errors for the spec file or a tool that cannot be started.
    pub fn resolve(
        &self,
        requests: &[PackageRequest],
        scratch: &Path,
    ) -> Result<ResolvedDependencySet> {
        tracing::info!("Resolving dependencies for {} packages", requests.len());
        let specs = filter_requests(requests.iter().map(PackageRequest::as_str));
        if specs.is_empty() {
            return Err(LayerError::NoInput.into());
        }
        let names: Vec<_> = specs.iter().map(PackageRequest::as_str).collect();
        tracing::debug!(specs = ?names, "adding dependencies");

        let spec_file = scratch.join(SPEC_FILE_NAME);
        let mut body = String::new();
        for spec in &specs {
            body.push_str(spec.as_str());
            body.push('\n');
        }
        fs::write(&spec_file, body)
            .with_context(|| format!("writing {}", spec_file.display()))?;

        if matches!(self.backend, ResolverBackend::Pip { .. }) {
            self.observer.warning(
                "uv is not available; pinning from `pip freeze` of the current environment",
            );
        }

        let args = self.backend.compile_args(&spec_file);
        let output = self.runner.run(self.backend.program(), &args, scratch)?;
        if !output.success() {
            return Err(classify_resolver_failure(&output.stderr).into());
        }

        let resolved = ResolvedDependencySet::parse_pinned_output(&output.stdout);
        tracing::info!("Successfully resolved {} dependencies", resolved.len());
        for (name, version) in resolved.iter() {
            tracing::debug!("Resolved: {name}=={version}");
        }
        Ok(resolved)
    }
}

/// Map resolver error text onto a not-found or conflict error.
///
/// Resolver diagnostics are prose, so this is a best-effort match against the
/// phrases uv and pip print for unknown packages.
pub fn classify_resolver_failure(stderr: &str) -> LayerError {
    let detail = stderr.trim().to_string();
    let lowered = detail.to_lowercase();
    if NOT_FOUND_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        LayerError::PackageNotFound { detail }
    } else {
        LayerError::DependencyConflict { detail }
    }
}
