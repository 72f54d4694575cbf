use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use layerpack_domain::{LayerError, ResolvedDependencySet};

use crate::backend::ResolverBackend;
use crate::effects::SharedRunner;
use crate::observer::SharedObserver;

pub const PACKAGES_DIR: &str = "packages";

/// Installs pinned packages, one backend invocation per package.
pub struct Fetcher {
    backend: ResolverBackend,
    runner: SharedRunner,
    observer: SharedObserver,
}

impl Fetcher {
    pub fn new(backend: ResolverBackend, runner: SharedRunner, observer: SharedObserver) -> Self {
        Self {
            backend,
            runner,
            observer,
        }
    }

    /// Install every pin into `scratch/packages` and return that directory.
    ///
    /// Installs run in resolution order and stop at the first failure; the
    /// partially populated directory is left for the scratch owner to clean up.
    pub fn download(&self, resolved: &ResolvedDependencySet, scratch: &Path) -> Result<PathBuf> {
        let target = scratch.join(PACKAGES_DIR);
        fs::create_dir_all(&target)
            .with_context(|| format!("creating {}", target.display()))?;
        tracing::info!("Downloading {} packages", resolved.len());

        for (name, version) in resolved.iter() {
            let args = self.backend.install_args(name, version, &target);
            let output = self.runner.run(self.backend.program(), &args, scratch)?;
            if !output.success() {
                return Err(LayerError::InstallFailed {
                    package: format!("{name}=={version}"),
                    detail: output.stderr.trim().to_string(),
                }
                .into());
            }
            self.observer.package_installed(name, version);
        }
        Ok(target)
    }
}
