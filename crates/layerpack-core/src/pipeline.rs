use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use layerpack_domain::{
    direct_names, read_requirements_file, LayerConfig, LayerError, PackageRequest, PinnedPackage,
    PythonRuntime, ResolvedDependencySet, SizeMetric,
};
use serde::Serialize;

use crate::archiver::{bytes_to_mb, ArchiveArtifact, Archiver};
use crate::assembler::{measure_tree_size, LayerAssembler, StripReport};
use crate::backend::ResolverBackend;
use crate::effects::{SharedRunner, SystemToolRunner};
use crate::fetcher::Fetcher;
use crate::fs::ScratchDir;
use crate::observer::{SharedObserver, Stage, TracingObserver};
use crate::resolver::Resolver;
use crate::settings::Settings;

const LAYER_DIR: &str = "layer";

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerBuild {
    pub artifact: ArchiveArtifact,
    /// Pins that were installed, sorted by name.
    pub packages: Vec<PinnedPackage>,
    pub uncompressed_bytes: u64,
    pub stripped: StripReport,
    pub backend: &'static str,
}

/// Resolved dependencies split by whether the caller asked for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyAnalysis {
    pub top_level: Vec<PinnedPackage>,
    pub transitive: Vec<PinnedPackage>,
    pub backend: &'static str,
}

impl DependencyAnalysis {
    pub fn total(&self) -> usize {
        self.top_level.len() + self.transitive.len()
    }
}

/// Builds layer archives for one target runtime.
///
/// Each build call allocates its own scratch directory and removes it before
/// returning, whether the build succeeded or not.
pub struct LayerPackager {
    runtime: PythonRuntime,
    output_dir: PathBuf,
    config: LayerConfig,
    settings: Settings,
    backend: ResolverBackend,
    runner: SharedRunner,
    observer: SharedObserver,
}

impl LayerPackager {
    /// Packager using real subprocesses, `LAYERPACK_*` settings and
    /// `tracing` for progress.
    ///
    /// # Errors
    ///
    /// [`LayerError::IncompatibleRuntime`] when `runtime` is not one of the
    /// configuration's compatible runtimes.
    pub fn new(runtime: &str, output_dir: impl Into<PathBuf>, config: LayerConfig) -> Result<Self> {
        Self::with_effects(
            runtime,
            output_dir,
            config,
            Settings::from_env(),
            Arc::new(SystemToolRunner),
            Arc::new(TracingObserver),
        )
    }

    pub fn with_effects(
        runtime: &str,
        output_dir: impl Into<PathBuf>,
        config: LayerConfig,
        settings: Settings,
        runner: SharedRunner,
        observer: SharedObserver,
    ) -> Result<Self> {
        let runtime = config.ensure_runtime(runtime)?;
        let backend = ResolverBackend::probe(runner.as_ref(), &settings);
        tracing::debug!(%runtime, backend = backend.name(), "layer packager ready");
        Ok(Self {
            runtime,
            output_dir: output_dir.into(),
            config,
            settings,
            backend,
            runner,
            observer,
        })
    }

    /// Replace the probed backend.
    #[must_use]
    pub fn with_backend(mut self, backend: ResolverBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn backend(&self) -> &ResolverBackend {
        &self.backend
    }

    pub fn runtime(&self) -> PythonRuntime {
        self.runtime
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Build `<output_dir>/<layer_name>.zip` from package requests.
    ///
    /// # Errors
    ///
    /// Any stage failure is returned unchanged; see [`LayerError`] for the
    /// domain failures. Nothing is retried.
    pub fn create_layer_from_packages<S: AsRef<str>>(
        &self,
        packages: &[S],
        layer_name: &str,
    ) -> Result<LayerBuild> {
        validate_layer_name(layer_name)?;
        let requests: Vec<PackageRequest> = packages
            .iter()
            .map(|raw| PackageRequest::new(raw.as_ref()))
            .collect();
        tracing::info!("Creating layer '{layer_name}' from {} packages", requests.len());

        let scratch = ScratchDir::create(&self.settings)?;
        let result = self.build(&requests, layer_name, scratch.path());
        drop(scratch);
        if let Ok(build) = &result {
            tracing::info!(
                "Layer '{layer_name}' created: {} ({:.2} MB)",
                build.artifact.path.display(),
                build.artifact.size_mb()
            );
        }
        result
    }

    /// Read a requirements file and build from its entries.
    pub fn create_layer_from_requirements(
        &self,
        requirements: &Path,
        layer_name: &str,
    ) -> Result<LayerBuild> {
        tracing::info!("Creating layer '{layer_name}' from {}", requirements.display());
        let requests = read_requirements_file(requirements)?;
        let raw: Vec<&str> = requests.iter().map(PackageRequest::as_str).collect();
        self.create_layer_from_packages(&raw, layer_name)
    }

    /// Resolve and filter like a build, without installing anything.
    pub fn analyze<S: AsRef<str>>(&self, packages: &[S]) -> Result<DependencyAnalysis> {
        let requests: Vec<PackageRequest> = packages
            .iter()
            .map(|raw| PackageRequest::new(raw.as_ref()))
            .collect();
        let scratch = ScratchDir::create(&self.settings)?;
        let resolved = self.resolver().resolve(&requests, scratch.path())?;
        drop(scratch);
        let filtered = self.filter(&resolved, &requests);
        let (top_level, transitive) = filtered.partition_direct(&direct_names(&requests));
        Ok(DependencyAnalysis {
            top_level,
            transitive,
            backend: self.backend.name(),
        })
    }

    fn build(
        &self,
        requests: &[PackageRequest],
        layer: &str,
        scratch: &Path,
    ) -> Result<LayerBuild> {
        let resolved = self.stage(layer, Stage::Resolve, || {
            self.resolver().resolve(requests, scratch)
        })?;
        let filtered = self.stage(layer, Stage::Filter, || Ok(self.filter(&resolved, requests)))?;
        if filtered.is_empty() {
            self.observer
                .warning("No packages left after filtering; the layer will be empty");
        }
        let fetched = self.stage(layer, Stage::Fetch, || {
            Fetcher::new(self.backend.clone(), self.runner.clone(), self.observer.clone())
                .download(&filtered, scratch)
        })?;

        let assembler = LayerAssembler::new(self.runtime, self.observer.clone());
        let tree = self.stage(layer, Stage::Assemble, || {
            assembler.assemble(&fetched, &scratch.join(LAYER_DIR))
        })?;
        self.stage(layer, Stage::EmbedSources, || {
            assembler.embed_sources(&tree, self.config.include_source())
        })?;
        let stripped = self.stage(layer, Stage::StripTests, || {
            if self.config.strip_test_files() {
                assembler.strip_tests(&tree)
            } else {
                Ok(StripReport::default())
            }
        })?;
        let uncompressed_bytes =
            self.stage(layer, Stage::SizeCheck, || self.check_tree_size(&tree.root))?;

        let artifact = self.stage(layer, Stage::Archive, || {
            fs::create_dir_all(&self.output_dir)
                .with_context(|| format!("creating {}", self.output_dir.display()))?;
            Archiver::new(Some(self.config.max_size_mb()))
                .build_archive(&tree.root, &self.output_dir.join(layer))
        })?;

        let mut packages: Vec<PinnedPackage> = filtered
            .iter()
            .map(|(name, version)| PinnedPackage {
                name: name.to_string(),
                version: version.to_string(),
            })
            .collect();
        packages.sort();
        Ok(LayerBuild {
            artifact,
            packages,
            uncompressed_bytes,
            stripped,
            backend: self.backend.name(),
        })
    }

    fn resolver(&self) -> Resolver {
        Resolver::new(self.backend.clone(), self.runner.clone(), self.observer.clone())
    }

    /// Drop excluded packages, then everything indirect unless dependencies
    /// are included.
    fn filter(
        &self,
        resolved: &ResolvedDependencySet,
        requests: &[PackageRequest],
    ) -> ResolvedDependencySet {
        let direct = direct_names(requests);
        let include_dependencies = self.config.include_dependencies();
        let filtered = resolved.retain_names(|name| {
            if self.config.is_excluded(name) {
                tracing::info!("Excluding package: {name}");
                return false;
            }
            include_dependencies || direct.contains(&name.to_lowercase())
        });
        tracing::debug!(
            resolved = resolved.len(),
            kept = filtered.len(),
            "filtered resolved packages"
        );
        filtered
    }

    fn check_tree_size(&self, root: &Path) -> Result<u64> {
        let bytes = measure_tree_size(root)?;
        let actual_mb = bytes_to_mb(bytes);
        let limit_mb = self.config.max_size_mb();
        tracing::info!("Layer size: {actual_mb:.2} MB");
        if actual_mb > limit_mb {
            return Err(LayerError::LayerSizeLimit {
                actual_mb,
                limit_mb,
                metric: SizeMetric::Uncompressed,
            }
            .into());
        }
        Ok(bytes)
    }

    fn stage<T>(&self, layer: &str, stage: Stage, run: impl FnOnce() -> Result<T>) -> Result<T> {
        self.observer.stage_started(layer, stage);
        match run() {
            Ok(value) => {
                self.observer.stage_completed(layer, stage);
                Ok(value)
            }
            Err(err) => {
                self.observer.stage_failed(layer, stage, &err);
                Err(err)
            }
        }
    }
}

fn validate_layer_name(name: &str) -> Result<(), LayerError> {
    if name.trim().is_empty() {
        return Err(LayerError::configuration("layer_name", "must not be empty"));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(LayerError::configuration(
            "layer_name",
            format!("must be a plain file name (got {name})"),
        ));
    }
    Ok(())
}
