use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::error::LayerError;
use crate::request::normalize_name;
use crate::runtime::PythonRuntime;

pub const DEFAULT_MAX_SIZE_MB: f64 = 250.0;
pub const DEFAULT_OPTIMIZATION_LEVEL: u8 = 1;
pub const DEFAULT_RUNTIME: PythonRuntime = PythonRuntime::Python39;

const MAX_OPTIMIZATION_LEVEL: u8 = 2;

/// Validated settings for one layer build.
///
/// Only obtainable through [`LayerConfigBuilder::build`], so every instance has
/// passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerConfig {
    exclude_packages: BTreeSet<String>,
    include_source: Vec<PathBuf>,
    optimization_level: u8,
    max_size_mb: f64,
    compatible_runtimes: BTreeSet<PythonRuntime>,
    strip_test_files: bool,
    include_dependencies: bool,
}

impl LayerConfig {
    pub fn builder() -> LayerConfigBuilder {
        LayerConfigBuilder::default()
    }

    /// Lower-cased names that never make it into a layer.
    pub fn exclude_packages(&self) -> &BTreeSet<String> {
        &self.exclude_packages
    }

    pub fn include_source(&self) -> &[PathBuf] {
        &self.include_source
    }

    pub fn optimization_level(&self) -> u8 {
        self.optimization_level
    }

    pub fn max_size_mb(&self) -> f64 {
        self.max_size_mb
    }

    pub fn compatible_runtimes(&self) -> &BTreeSet<PythonRuntime> {
        &self.compatible_runtimes
    }

    pub fn strip_test_files(&self) -> bool {
        self.strip_test_files
    }

    pub fn include_dependencies(&self) -> bool {
        self.include_dependencies
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude_packages.contains(&normalize_name(name))
    }

    /// Check the target runtime against the compatible set.
    pub fn ensure_runtime(&self, runtime: &str) -> Result<PythonRuntime, LayerError> {
        match PythonRuntime::parse(runtime) {
            Some(parsed) if self.compatible_runtimes.contains(&parsed) => Ok(parsed),
            _ => Err(LayerError::IncompatibleRuntime {
                runtime: runtime.trim().to_string(),
                compatible: self
                    .compatible_runtimes
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            }),
        }
    }

    pub fn summary(&self) -> Value {
        json!({
            "exclude_packages": self.exclude_packages,
            "include_source": self
                .include_source
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>(),
            "optimization_level": self.optimization_level,
            "max_size_mb": self.max_size_mb,
            "compatible_runtimes": self
                .compatible_runtimes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            "strip_test_files": self.strip_test_files,
            "include_dependencies": self.include_dependencies,
        })
    }
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            exclude_packages: BTreeSet::new(),
            include_source: Vec::new(),
            optimization_level: DEFAULT_OPTIMIZATION_LEVEL,
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            compatible_runtimes: BTreeSet::from([DEFAULT_RUNTIME]),
            strip_test_files: true,
            include_dependencies: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayerConfigBuilder {
    exclude_packages: Vec<String>,
    include_source: Vec<PathBuf>,
    optimization_level: u8,
    max_size_mb: f64,
    compatible_runtimes: Vec<String>,
    strip_test_files: bool,
    include_dependencies: bool,
}

impl Default for LayerConfigBuilder {
    fn default() -> Self {
        Self {
            exclude_packages: Vec::new(),
            include_source: Vec::new(),
            optimization_level: DEFAULT_OPTIMIZATION_LEVEL,
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            compatible_runtimes: vec![DEFAULT_RUNTIME.to_string()],
            strip_test_files: true,
            include_dependencies: true,
        }
    }
}

impl LayerConfigBuilder {
    #[must_use]
    pub fn exclude_packages<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_packages = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn include_source<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.include_source = paths
            .into_iter()
            .map(|path| path.as_ref().to_path_buf())
            .collect();
        self
    }

    #[must_use]
    pub fn optimization_level(mut self, level: u8) -> Self {
        self.optimization_level = level;
        self
    }

    #[must_use]
    pub fn max_size_mb(mut self, megabytes: f64) -> Self {
        self.max_size_mb = megabytes;
        self
    }

    #[must_use]
    pub fn compatible_runtimes<I, S>(mut self, runtimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compatible_runtimes = runtimes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn strip_test_files(mut self, enabled: bool) -> Self {
        self.strip_test_files = enabled;
        self
    }

    #[must_use]
    pub fn include_dependencies(mut self, enabled: bool) -> Self {
        self.include_dependencies = enabled;
        self
    }

    /// Validate every field and freeze the configuration.
    pub fn build(self) -> Result<LayerConfig, LayerError> {
        if self.optimization_level > MAX_OPTIMIZATION_LEVEL {
            return Err(LayerError::configuration(
                "optimization_level",
                format!("must be 0, 1, or 2 (got {})", self.optimization_level),
            ));
        }

        if !(self.max_size_mb.is_finite() && self.max_size_mb > 0.0) {
            return Err(LayerError::configuration(
                "max_size_mb",
                format!("must be a positive number (got {})", self.max_size_mb),
            ));
        }

        let mut compatible_runtimes = BTreeSet::new();
        let mut unsupported = Vec::new();
        for raw in &self.compatible_runtimes {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            match PythonRuntime::parse(trimmed) {
                Some(runtime) => {
                    compatible_runtimes.insert(runtime);
                }
                None => unsupported.push(trimmed.to_string()),
            }
        }
        if !unsupported.is_empty() {
            unsupported.sort();
            unsupported.dedup();
            return Err(LayerError::configuration(
                "compatible_runtimes",
                format!(
                    "unsupported runtimes: {} (supported: {})",
                    unsupported.join(", "),
                    PythonRuntime::supported().join(", ")
                ),
            ));
        }
        if compatible_runtimes.is_empty() {
            return Err(LayerError::configuration(
                "compatible_runtimes",
                "at least one runtime is required",
            ));
        }

        let exclude_packages = self
            .exclude_packages
            .iter()
            .map(|name| normalize_name(name))
            .filter(|name| !name.is_empty())
            .collect();

        Ok(LayerConfig {
            exclude_packages,
            include_source: self.include_source,
            optimization_level: self.optimization_level,
            max_size_mb: self.max_size_mb,
            compatible_runtimes,
            strip_test_files: self.strip_test_files,
            include_dependencies: self.include_dependencies,
        })
    }
}
